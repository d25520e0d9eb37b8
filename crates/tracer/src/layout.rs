//! Human-readable dump of the CPU/GPU data contract.

use std::fmt;
use std::mem::{offset_of, size_of};

use crate::error::TracerError;
use crate::gpu::{compile_glsl, slots, ProgramInterface, ResourceSlot, UniformMember};
use crate::scene::{HittableRecord, SceneRecord, SCENE_CAPACITY};
use crate::shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};

/// Record layouts on the host plus the reflected kernel interface.
#[derive(Debug, Clone)]
pub struct AbiReport {
    pub hittable_size: usize,
    pub hittable_fields: Vec<(&'static str, usize)>,
    pub scene_size: usize,
    pub scene_capacity: usize,
    pub object_count_offset: usize,
    pub workgroup_size: [u32; 3],
    pub uniform_block_size: u32,
    pub uniforms: Vec<UniformMember>,
    pub slots: Vec<ResourceSlot>,
}

impl AbiReport {
    /// Reflects the embedded kernel.
    pub fn embedded() -> Result<Self, TracerError> {
        let source = ShaderLoader::embedded().load(KERNEL_ENTRY)?;
        Self::for_kernel(&source)
    }

    /// Reflects an already flattened kernel.
    pub fn for_kernel(source: &str) -> Result<Self, TracerError> {
        let module = compile_glsl(source)?;
        let interface = ProgramInterface::from_module(&module)?;
        let mut slots = interface.slots;
        slots.sort_by_key(|slot| (slot.group, slot.binding));
        Ok(Self {
            hittable_size: size_of::<HittableRecord>(),
            hittable_fields: vec![
                ("kind", offset_of!(HittableRecord, kind)),
                ("data1", offset_of!(HittableRecord, data1)),
                ("data2", offset_of!(HittableRecord, data2)),
                ("data3", offset_of!(HittableRecord, data3)),
            ],
            scene_size: size_of::<SceneRecord>(),
            scene_capacity: SCENE_CAPACITY,
            object_count_offset: offset_of!(SceneRecord, object_count),
            workgroup_size: interface.workgroup_size,
            uniform_block_size: interface.uniform_block_size,
            uniforms: interface.uniforms,
            slots,
        })
    }
}

impl fmt::Display for AbiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HittableRecord: {} bytes", self.hittable_size)?;
        for (name, offset) in &self.hittable_fields {
            writeln!(f, "  {name:<20} @ {offset}")?;
        }
        writeln!(
            f,
            "SceneRecord: {} bytes ({} slots, object_count @ {})",
            self.scene_size, self.scene_capacity, self.object_count_offset
        )?;
        let [x, y, z] = self.workgroup_size;
        writeln!(f, "workgroup: {x}x{y}x{z}")?;
        writeln!(
            f,
            "uniform block (set {}, binding {}): {} bytes",
            slots::UNIFORM_GROUP,
            slots::UNIFORM_BINDING,
            self.uniform_block_size
        )?;
        for member in &self.uniforms {
            let kind = member
                .kind
                .map(|kind| format!("{kind:?}"))
                .unwrap_or_else(|| "unsupported".to_string());
            writeln!(f, "  {:<20} @ {:<4} {kind}", member.name, member.offset)?;
        }
        writeln!(f, "resources:")?;
        for slot in &self.slots {
            writeln!(f, "  set {} binding {}: {:?}", slot.group, slot.binding, slot.kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_kernel_layout() {
        let report = AbiReport::embedded().unwrap();
        assert_eq!(report.hittable_size, 64);
        assert_eq!(report.scene_size, 6416);
        assert_eq!(report.object_count_offset, 6400);
        assert_eq!(report.workgroup_size, [8, 8, 1]);
        assert_eq!(report.uniforms.len(), 10);
        assert_eq!(report.slots.len(), 5);
        assert_eq!(report.slots[0].group, slots::BUFFER_GROUP);
    }

    #[test]
    fn rendering_lists_every_uniform() {
        let text = AbiReport::embedded().unwrap().to_string();
        assert!(text.contains("HittableRecord: 64 bytes"));
        assert!(text.contains("object_count @ 6400"));
        for name in crate::gpu::UniformName::ALL {
            assert!(text.contains(name.as_str()), "missing {}", name.as_str());
        }
    }
}
