//! Fixed-capacity list of primitives and its byte layout on the GPU.
//!
//! [`SceneRecord`] is an ABI shared with `shaders/hittable.glsl` (std430
//! `SceneBuffer`). Field order, padding and [`SCENE_CAPACITY`] must change on
//! both sides at once.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Maximum number of primitives the kernel iterates over.
pub const SCENE_CAPACITY: usize = 100;

/// Tag stored in [`HittableRecord::kind`].
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Sphere = 0,
}

impl PrimitiveKind {
    pub fn from_tag(tag: i32) -> Result<Self, UnknownPrimitive> {
        match tag {
            0 => Ok(PrimitiveKind::Sphere),
            other => Err(UnknownPrimitive(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized primitive tag {0}")]
pub struct UnknownPrimitive(pub i32);

/// A hittable primitive as the CPU sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Sphere {
        center: Vec3,
        radius: f32,
        color: Vec3,
    },
}

/// Builds a sphere primitive. `radius` is expected to be positive.
pub fn create_sphere(center: Vec3, radius: f32, color: Vec3) -> Primitive {
    Primitive::Sphere {
        center,
        radius,
        color,
    }
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Sphere { .. } => PrimitiveKind::Sphere,
        }
    }

    /// Packs the primitive into its tagged GPU record.
    pub fn to_record(&self) -> HittableRecord {
        match *self {
            Primitive::Sphere {
                center,
                radius,
                color,
            } => HittableRecord {
                kind: PrimitiveKind::Sphere as i32,
                _padding: [0.0; 3],
                data1: center.extend(radius).to_array(),
                data2: color.extend(0.0).to_array(),
                data3: [0.0; 4],
            },
        }
    }
}

/// Tagged primitive record, 64 bytes, vec4 fields on 16-byte boundaries.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HittableRecord {
    pub kind: i32,
    pub _padding: [f32; 3],
    /// Sphere: `(center.xyz, radius)`.
    pub data1: [f32; 4],
    /// Sphere: `(color.rgb, reserved)`.
    pub data2: [f32; 4],
    /// Reserved for material parameters.
    pub data3: [f32; 4],
}

impl HittableRecord {
    pub fn kind(&self) -> Result<PrimitiveKind, UnknownPrimitive> {
        PrimitiveKind::from_tag(self.kind)
    }

    /// Decodes the record back into a primitive, rejecting unknown tags.
    pub fn to_primitive(&self) -> Result<Primitive, UnknownPrimitive> {
        match self.kind()? {
            PrimitiveKind::Sphere => {
                let [x, y, z, radius] = self.data1;
                let [r, g, b, _] = self.data2;
                Ok(Primitive::Sphere {
                    center: Vec3::new(x, y, z),
                    radius,
                    color: Vec3::new(r, g, b),
                })
            }
        }
    }
}

/// The structured buffer contents: every slot, then the live count.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SceneRecord {
    pub objects: [HittableRecord; SCENE_CAPACITY],
    pub object_count: i32,
    pub _padding: [f32; 3],
}

impl SceneRecord {
    /// Live records, in insertion order.
    pub fn live(&self) -> &[HittableRecord] {
        let count = (self.object_count.max(0) as usize).min(SCENE_CAPACITY);
        &self.objects[..count]
    }
}

impl Default for SceneRecord {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for SceneRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRecord")
            .field("object_count", &self.object_count)
            .field("objects", &self.live())
            .finish()
    }
}

impl PartialEq for SceneRecord {
    fn eq(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}

/// Returned when [`Scene::add_object`] would exceed [`SCENE_CAPACITY`].
///
/// The scene is left untouched; the rejected primitive is handed back.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("scene is full ({capacity} objects); increase SCENE_CAPACITY on both CPU and GPU")]
pub struct SceneFullError {
    pub capacity: usize,
    pub rejected: Primitive,
}

/// Append-only primitive list bounded by [`SCENE_CAPACITY`].
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    objects: Vec<Primitive>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Vec::with_capacity(SCENE_CAPACITY),
        }
    }

    /// Appends `primitive` after every existing object.
    pub fn add_object(&mut self, primitive: Primitive) -> Result<(), SceneFullError> {
        if self.objects.len() >= SCENE_CAPACITY {
            return Err(SceneFullError {
                capacity: SCENE_CAPACITY,
                rejected: primitive,
            });
        }
        self.objects.push(primitive);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.objects.len() >= SCENE_CAPACITY
    }

    pub fn objects(&self) -> &[Primitive] {
        &self.objects
    }

    /// Serialises the scene into the buffer layout; unused slots stay zeroed.
    pub fn to_record(&self) -> SceneRecord {
        let mut record = SceneRecord::zeroed();
        for (slot, primitive) in record.objects.iter_mut().zip(&self.objects) {
            *slot = primitive.to_record();
        }
        record.object_count = self.objects.len() as i32;
        record
    }

    /// The two-sphere scene the tracer starts with when nothing is configured.
    pub fn demo() -> Self {
        Self {
            objects: vec![
                create_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, Vec3::new(1.0, 0.2, 0.2)),
                create_sphere(Vec3::new(0.0, -100.5, -1.0), 100.0, Vec3::new(1.0, 1.0, 0.2)),
            ],
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    fn sphere_at(index: usize) -> Primitive {
        create_sphere(Vec3::new(index as f32, 0.0, -1.0), 0.5, Vec3::ONE)
    }

    #[test]
    fn sphere_record_matches_kernel_packing() {
        let record =
            create_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, Vec3::new(1.0, 0.2, 0.2)).to_record();

        assert_eq!(record.kind, PrimitiveKind::Sphere as i32);
        assert_eq!(record.data1, [0.0, 0.0, -1.0, 0.5]);
        assert_eq!(record.data2, [1.0, 0.2, 0.2, 0.0]);
        assert_eq!(record.data3, [0.0; 4]);
        assert_eq!(record.kind(), Ok(PrimitiveKind::Sphere));
    }

    /// Mirrors the std430 layout declared in `hittable.glsl`.
    #[test]
    fn records_follow_std430_layout() {
        assert_eq!(size_of::<HittableRecord>(), 64);
        assert_eq!(offset_of!(HittableRecord, data1), 16);
        assert_eq!(offset_of!(HittableRecord, data2), 32);
        assert_eq!(offset_of!(HittableRecord, data3), 48);
        assert_eq!(align_of::<SceneRecord>(), 4);
        assert_eq!(offset_of!(SceneRecord, object_count), 64 * SCENE_CAPACITY);
        assert_eq!(size_of::<SceneRecord>(), 64 * SCENE_CAPACITY + 16);
    }

    #[test]
    fn adding_below_capacity_appends_in_order() {
        let mut scene = Scene::new();
        for index in 0..5 {
            let before = scene.len();
            scene.add_object(sphere_at(index)).expect("room left");
            assert_eq!(scene.len(), before + 1);
        }
        let expected: Vec<_> = (0..5).map(sphere_at).collect();
        assert_eq!(scene.objects(), expected.as_slice());
    }

    #[test]
    fn adding_at_capacity_is_rejected_without_side_effects() {
        let mut scene = Scene::new();
        for index in 0..SCENE_CAPACITY {
            scene.add_object(sphere_at(index)).expect("room left");
        }
        assert!(scene.is_full());
        let snapshot = scene.clone();

        let extra = sphere_at(SCENE_CAPACITY);
        let err = scene.add_object(extra).expect_err("scene is full");

        assert_eq!(err.capacity, SCENE_CAPACITY);
        assert_eq!(err.rejected, extra);
        assert_eq!(scene, snapshot);
        assert_eq!(scene.to_record().object_count, SCENE_CAPACITY as i32);
    }

    #[test]
    fn demo_scene_is_sphere_over_ground() {
        let scene = Scene::demo();
        let mut rebuilt = Scene::new();
        rebuilt
            .add_object(create_sphere(Vec3::new(0.0, 0.0, -1.0), 0.5, Vec3::new(1.0, 0.2, 0.2)))
            .unwrap();
        rebuilt
            .add_object(create_sphere(Vec3::new(0.0, -100.5, -1.0), 100.0, Vec3::new(1.0, 1.0, 0.2)))
            .unwrap();
        assert_eq!(scene, rebuilt);
        assert!(!scene.is_full());
    }

    #[test]
    fn record_zeroes_unused_slots() {
        let scene = Scene::demo();
        let record = scene.to_record();

        assert_eq!(record.object_count, 2);
        assert_eq!(record.live().len(), 2);
        assert!(record.objects[2..]
            .iter()
            .all(|slot| *slot == HittableRecord::zeroed()));
        let decoded: Vec<_> = record
            .live()
            .iter()
            .map(|slot| slot.to_primitive().expect("known tag"))
            .collect();
        assert_eq!(decoded.as_slice(), scene.objects());
    }

    #[test]
    fn unknown_tags_fail_to_decode() {
        let mut record = sphere_at(0).to_record();
        record.kind = 7;
        assert_eq!(record.to_primitive(), Err(UnknownPrimitive(7)));
    }
}
