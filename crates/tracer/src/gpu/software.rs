//! CPU implementation of [`ComputeDevice`].
//!
//! Kernels are still compiled and reflected through naga, but dispatches run
//! a Rust port of `shaders/tracer.comp` instead of the GLSL. The device also
//! keeps a ledger of live resources and enforces the dispatch/barrier
//! ordering, which makes it the backend the orchestration tests run against.

use std::collections::{HashMap, HashSet};
use std::mem::size_of;

use glam::Vec3;

use crate::error::TracerError;
use crate::scene::{Primitive, SceneRecord};
use crate::types::Resolution;

use super::device::{
    BufferId, ComputeDevice, GpuResource, ImageAccess, ImageData, ImageFormat, ImageId, ProgramId,
    ShaderId, UniformLocation, UniformValue,
};
use super::reflect::{compile_glsl, ProgramInterface};
use super::uniforms::UniformName;
use super::{slots, WORKGROUP_SIZE};

const T_MIN: f32 = 0.001;
const T_MAX: f32 = 1.0e30;
/// Largest image edge, matching the smallest texture limit wgpu guarantees
/// on desktop adapters.
const MAX_IMAGE_DIMENSION: u32 = 16_384;

/// Counters exposed for assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftwareStats {
    pub live_resources: usize,
    pub double_releases: usize,
    /// Every successful release, in call order.
    pub release_log: Vec<GpuResource>,
    pub dispatches: u64,
    pub barriers: u64,
}

#[derive(Debug, Clone)]
struct SoftwareImage {
    resolution: Resolution,
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl SoftwareImage {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.resolution.width() && y < self.resolution.height())
            .then(|| (y * self.resolution.width() + x) as usize)
    }

    fn texel_range(&self, index: usize) -> std::ops::Range<usize> {
        let stride = self.format.bytes_per_pixel() as usize;
        index * stride..(index + 1) * stride
    }

    fn load_color(&self, index: usize) -> [f32; 4] {
        bytemuck::pod_read_unaligned(&self.bytes[self.texel_range(index)])
    }

    fn load_count(&self, index: usize) -> u32 {
        bytemuck::pod_read_unaligned(&self.bytes[self.texel_range(index)])
    }

    fn store<T: bytemuck::Pod>(&mut self, index: usize, value: &T) {
        let range = self.texel_range(index);
        self.bytes[range].copy_from_slice(bytemuck::bytes_of(value));
    }
}

/// Reference device executing the tracer kernel on the CPU.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    next_id: u32,
    shaders: HashMap<ShaderId, Result<ProgramInterface, String>>,
    programs: HashMap<ProgramId, ProgramInterface>,
    buffers: HashMap<BufferId, Vec<u8>>,
    images: HashMap<ImageId, SoftwareImage>,
    current_program: Option<ProgramId>,
    buffer_slots: HashMap<u32, BufferId>,
    image_slots: HashMap<u32, ImageId>,
    uniforms: HashMap<u32, UniformValue>,
    unsynchronized: HashSet<ImageId>,
    allocation_budget: Option<usize>,
    stats: SoftwareStats,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every buffer or image allocation after the first `allocations`.
    pub fn with_allocation_limit(allocations: usize) -> Self {
        Self {
            allocation_budget: Some(allocations),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> SoftwareStats {
        SoftwareStats {
            live_resources: self.shaders.len()
                + self.programs.len()
                + self.buffers.len()
                + self.images.len(),
            ..self.stats.clone()
        }
    }

    /// Last value written to the named uniform of `program`.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let offset = self.programs.get(&program)?.uniform(name)?.offset;
        self.uniforms.get(&offset).copied()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn charge_allocation(&mut self, resource: &'static str) -> Result<(), TracerError> {
        match self.allocation_budget.as_mut() {
            Some(0) => Err(TracerError::allocation(
                resource,
                "software allocation limit reached",
            )),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn image_at(&self, slot: u32) -> Result<ImageId, TracerError> {
        let image = *self
            .image_slots
            .get(&slot)
            .ok_or_else(|| TracerError::device(format!("no image bound to slot {slot}")))?;
        let expected = slots::image(slot).map(|(format, _)| format);
        match self.images.get(&image) {
            Some(bound) if Some(bound.format) == expected => Ok(image),
            Some(bound) => Err(TracerError::device(format!(
                "{image} has format {:?}, slot {slot} expects {expected:?}",
                bound.format
            ))),
            None => Err(TracerError::device(format!("{image} bound to slot {slot} was released"))),
        }
    }

    fn bound_scene(&self) -> Result<Vec<Primitive>, TracerError> {
        let buffer = self
            .buffer_slots
            .get(&slots::SCENE_BUFFER)
            .and_then(|id| self.buffers.get(id))
            .ok_or_else(|| TracerError::device("no scene buffer bound"))?;
        let bytes = buffer
            .get(..size_of::<SceneRecord>())
            .ok_or_else(|| TracerError::device("scene buffer is smaller than the scene layout"))?;
        let record: SceneRecord = bytemuck::pod_read_unaligned(bytes);
        record
            .live()
            .iter()
            .map(|slot| {
                slot.to_primitive()
                    .map_err(|err| TracerError::device(format!("scene buffer holds {err}")))
            })
            .collect()
    }

    fn kernel_inputs(&self, interface: &ProgramInterface) -> KernelInputs {
        let value = |name: UniformName| {
            interface
                .uniform(name.as_str())
                .and_then(|member| self.uniforms.get(&member.offset))
                .copied()
        };
        let vec3 = |name| match value(name) {
            Some(UniformValue::Vec3(v)) => v,
            _ => Vec3::ZERO,
        };
        let int = |name| match value(name) {
            Some(UniformValue::Int(v)) => v,
            _ => 0,
        };
        KernelInputs {
            camera_center: vec3(UniformName::CameraCenter),
            pixel00_loc: vec3(UniformName::Pixel00Loc),
            pixel_delta_u: vec3(UniformName::PixelDeltaU),
            pixel_delta_v: vec3(UniformName::PixelDeltaV),
            time: match value(UniformName::Time) {
                Some(UniformValue::Float(v)) => v,
                _ => 0.0,
            },
            screen_width: int(UniformName::ScreenWidth),
            screen_height: int(UniformName::ScreenHeight),
            reset_accumulation: int(UniformName::ResetAccumulation) != 0,
        }
    }
}

impl ComputeDevice for SoftwareDevice {
    fn name(&self) -> &str {
        "software"
    }

    fn compile_shader(&mut self, source: &str) -> Result<ShaderId, TracerError> {
        let module = compile_glsl(source)?;
        // Contract violations surface when the shader is linked.
        let interface = match ProgramInterface::from_module(&module) {
            Ok(interface) => Ok(interface),
            Err(TracerError::Link(reason)) => Err(reason),
            Err(other) => return Err(other),
        };
        let id = ShaderId(self.next_id());
        self.shaders.insert(id, interface);
        Ok(id)
    }

    fn link_program(&mut self, shader: ShaderId) -> Result<ProgramId, TracerError> {
        let interface = match self.shaders.get(&shader) {
            Some(Ok(interface)) => interface.clone(),
            Some(Err(reason)) => return Err(TracerError::Link(reason.clone())),
            None => return Err(TracerError::Link(format!("{shader} does not exist"))),
        };
        let id = ProgramId(self.next_id());
        self.programs.insert(id, interface);
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let member = self.programs.get(&program)?.uniform(name)?;
        Some(UniformLocation(member.offset))
    }

    fn create_storage_buffer(&mut self, size: u64) -> Result<BufferId, TracerError> {
        self.charge_allocation("storage buffer")?;
        let id = BufferId(self.next_id());
        self.buffers.insert(id, vec![0; size as usize]);
        tracing::debug!(buffer = %id, size, "allocated software buffer");
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), TracerError> {
        let storage = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| TracerError::device(format!("{buffer} does not exist")))?;
        let start = offset as usize;
        let target = storage
            .get_mut(start..start + data.len())
            .ok_or_else(|| TracerError::device(format!("write past the end of {buffer}")))?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId) -> Result<Vec<u8>, TracerError> {
        self.buffers
            .get(&buffer)
            .cloned()
            .ok_or_else(|| TracerError::device(format!("{buffer} does not exist")))
    }

    fn create_image(
        &mut self,
        resolution: Resolution,
        format: ImageFormat,
    ) -> Result<ImageId, TracerError> {
        if resolution.width() > MAX_IMAGE_DIMENSION || resolution.height() > MAX_IMAGE_DIMENSION {
            return Err(TracerError::allocation(
                "image",
                format!("{resolution} exceeds the maximum image dimension {MAX_IMAGE_DIMENSION}"),
            ));
        }
        let len = resolution
            .pixel_count()
            .checked_mul(format.bytes_per_pixel() as usize)
            .ok_or_else(|| TracerError::allocation("image", format!("{resolution} is too large")))?;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|err| TracerError::allocation("image", err.to_string()))?;
        bytes.resize(len, 0);
        self.charge_allocation("image")?;
        let id = ImageId(self.next_id());
        self.images.insert(
            id,
            SoftwareImage {
                resolution,
                format,
                bytes,
            },
        );
        tracing::debug!(image = %id, %resolution, ?format, "allocated software image");
        Ok(id)
    }

    fn read_image(&mut self, image: ImageId) -> Result<ImageData, TracerError> {
        if self.unsynchronized.contains(&image) {
            return Err(TracerError::device(format!(
                "{image} read before a memory barrier followed the dispatch that wrote it"
            )));
        }
        let stored = self
            .images
            .get(&image)
            .ok_or_else(|| TracerError::device(format!("{image} does not exist")))?;
        Ok(ImageData {
            resolution: stored.resolution,
            format: stored.format,
            bytes: stored.bytes.clone(),
        })
    }

    fn use_program(&mut self, program: ProgramId) -> Result<(), TracerError> {
        if !self.programs.contains_key(&program) {
            return Err(TracerError::device(format!("{program} does not exist")));
        }
        self.current_program = Some(program);
        Ok(())
    }

    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId) -> Result<(), TracerError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(TracerError::device(format!("{buffer} does not exist")));
        }
        self.buffer_slots.insert(slot, buffer);
        Ok(())
    }

    fn bind_image(
        &mut self,
        slot: u32,
        image: ImageId,
        _access: ImageAccess,
    ) -> Result<(), TracerError> {
        if !self.images.contains_key(&image) {
            return Err(TracerError::device(format!("{image} does not exist")));
        }
        self.image_slots.insert(slot, image);
        Ok(())
    }

    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), TracerError> {
        self.uniforms.insert(location.offset(), value);
        Ok(())
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), TracerError> {
        let program = self
            .current_program
            .ok_or_else(|| TracerError::device("dispatch without a current program"))?;
        let interface = self
            .programs
            .get(&program)
            .ok_or_else(|| TracerError::device(format!("{program} was released")))?;
        let inputs = self.kernel_inputs(interface);
        let scene = self.bound_scene()?;

        let output_id = self.image_at(slots::OUTPUT_IMAGE)?;
        let color_id = self.image_at(slots::ACCUMULATED_COLOR_IMAGE)?;
        let count_id = self.image_at(slots::SAMPLE_COUNT_IMAGE)?;

        if output_id == color_id || output_id == count_id || color_id == count_id {
            return Err(TracerError::device("the same image is bound to several slots"));
        }
        let (Some(mut output), Some(mut color), Some(mut count)) = (
            self.images.remove(&output_id),
            self.images.remove(&color_id),
            self.images.remove(&count_id),
        ) else {
            return Err(TracerError::device("bound image disappeared during dispatch"));
        };
        run_kernel(&inputs, &scene, groups, &mut output, &mut color, &mut count);
        self.images.insert(output_id, output);
        self.images.insert(color_id, color);
        self.images.insert(count_id, count);

        self.unsynchronized.extend([output_id, color_id, count_id]);
        self.stats.dispatches += 1;
        Ok(())
    }

    fn memory_barrier(&mut self) -> Result<(), TracerError> {
        self.unsynchronized.clear();
        self.stats.barriers += 1;
        Ok(())
    }

    fn release(&mut self, resource: GpuResource) {
        let released = match resource {
            GpuResource::Shader(id) => self.shaders.remove(&id).is_some(),
            GpuResource::Program(id) => {
                if self.current_program == Some(id) {
                    self.current_program = None;
                }
                self.programs.remove(&id).is_some()
            }
            GpuResource::Buffer(id) => {
                self.buffer_slots.retain(|_, bound| *bound != id);
                self.buffers.remove(&id).is_some()
            }
            GpuResource::Image(id) => {
                self.image_slots.retain(|_, bound| *bound != id);
                self.unsynchronized.remove(&id);
                self.images.remove(&id).is_some()
            }
        };
        if released {
            self.stats.release_log.push(resource);
        } else {
            self.stats.double_releases += 1;
            tracing::warn!(%resource, "release of a resource that is not live");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct KernelInputs {
    camera_center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    time: f32,
    screen_width: i32,
    screen_height: i32,
    reset_accumulation: bool,
}

fn run_kernel(
    inputs: &KernelInputs,
    scene: &[Primitive],
    groups: [u32; 3],
    output: &mut SoftwareImage,
    color: &mut SoftwareImage,
    count: &mut SoftwareImage,
) {
    let width = (groups[0] * WORKGROUP_SIZE).min(inputs.screen_width.max(0) as u32);
    let height = (groups[1] * WORKGROUP_SIZE).min(inputs.screen_height.max(0) as u32);

    for y in 0..height {
        for x in 0..width {
            let (Some(out_index), Some(color_index), Some(count_index)) =
                (output.index(x, y), color.index(x, y), count.index(x, y))
            else {
                continue;
            };

            let (mut accumulated, mut samples) = if inputs.reset_accumulation {
                ([0.0; 4], 0)
            } else {
                (color.load_color(color_index), count.load_count(count_index))
            };

            let mut seed = hash_seed(x, y, samples, inputs.time);
            let jitter_x = random_float(&mut seed) - 0.5;
            let jitter_y = random_float(&mut seed) - 0.5;
            let sample_point = inputs.pixel00_loc
                + (x as f32 + jitter_x) * inputs.pixel_delta_u
                + (y as f32 + jitter_y) * inputs.pixel_delta_v;
            let sample = ray_color(
                scene,
                inputs.camera_center,
                sample_point - inputs.camera_center,
            );

            accumulated[0] += sample.x;
            accumulated[1] += sample.y;
            accumulated[2] += sample.z;
            accumulated[3] += 1.0;
            samples = samples.wrapping_add(1);

            color.store(color_index, &accumulated);
            count.store(count_index, &samples);
            let average = Vec3::new(accumulated[0], accumulated[1], accumulated[2]) / samples as f32;
            output.store(out_index, &unorm8(average.extend(1.0).to_array()));
        }
    }
}

fn unorm8(values: [f32; 4]) -> [u8; 4] {
    values.map(|value| (value.clamp(0.0, 1.0) * 255.0).round() as u8)
}

struct Hit {
    t: f32,
    normal: Vec3,
    color: Vec3,
}

fn hit_sphere(
    center: Vec3,
    radius: f32,
    color: Vec3,
    origin: Vec3,
    direction: Vec3,
    t_max: f32,
) -> Option<Hit> {
    let oc = center - origin;
    let a = direction.dot(direction);
    let h = direction.dot(oc);
    let c = oc.dot(oc) - radius * radius;
    let discriminant = h * h - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrtd = discriminant.sqrt();
    let mut root = (h - sqrtd) / a;
    if root <= T_MIN || root >= t_max {
        root = (h + sqrtd) / a;
        if root <= T_MIN || root >= t_max {
            return None;
        }
    }
    Some(Hit {
        t: root,
        normal: (origin + direction * root - center) / radius,
        color,
    })
}

fn ray_color(scene: &[Primitive], origin: Vec3, direction: Vec3) -> Vec3 {
    let mut closest: Option<Hit> = None;
    for primitive in scene {
        let t_max = closest.as_ref().map_or(T_MAX, |hit| hit.t);
        let candidate = match *primitive {
            Primitive::Sphere {
                center,
                radius,
                color,
            } => hit_sphere(center, radius, color, origin, direction, t_max),
        };
        if candidate.is_some() {
            closest = candidate;
        }
    }

    if let Some(hit) = closest {
        return hit.color * (0.5 + 0.5 * hit.normal.y);
    }
    let unit_direction = direction.normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    Vec3::ONE.lerp(Vec3::new(0.5, 0.7, 1.0), a)
}

fn pcg_hash(value: u32) -> u32 {
    let state = value.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn hash_seed(x: u32, y: u32, samples: u32, seconds: f32) -> u32 {
    let seed = x
        .wrapping_mul(1973)
        .wrapping_add(y.wrapping_mul(9277))
        .wrapping_add(samples.wrapping_mul(26_699));
    pcg_hash(seed ^ seconds.to_bits())
}

fn random_float(seed: &mut u32) -> f32 {
    *seed = pcg_hash(*seed);
    *seed as f32 / 4_294_967_295.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{build_camera, Projection};
    use crate::gpu::{FrameUniforms, UniformTable};
    use crate::scene::Scene;
    use crate::shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};

    struct Rig {
        device: SoftwareDevice,
        program: ProgramId,
        output: ImageId,
        color: ImageId,
        count: ImageId,
        resolution: Resolution,
    }

    fn rig(width: u32, height: u32, scene: &Scene) -> Rig {
        let mut device = SoftwareDevice::new();
        let source = ShaderLoader::embedded().load(KERNEL_ENTRY).unwrap();
        let shader = device.compile_shader(&source).unwrap();
        let program = device.link_program(shader).unwrap();
        let resolution = Resolution::new(width, height).unwrap();

        let buffer = device
            .create_storage_buffer(size_of::<SceneRecord>() as u64)
            .unwrap();
        device
            .write_buffer(buffer, 0, bytemuck::bytes_of(&scene.to_record()))
            .unwrap();
        let output = device.create_image(resolution, ImageFormat::Rgba8Unorm).unwrap();
        let color = device.create_image(resolution, ImageFormat::Rgba32Float).unwrap();
        let count = device.create_image(resolution, ImageFormat::R32Uint).unwrap();

        device.use_program(program).unwrap();
        device.bind_storage_buffer(slots::SCENE_BUFFER, buffer).unwrap();
        device
            .bind_image(slots::OUTPUT_IMAGE, output, ImageAccess::WriteOnly)
            .unwrap();
        device
            .bind_image(slots::ACCUMULATED_COLOR_IMAGE, color, ImageAccess::ReadWrite)
            .unwrap();
        device
            .bind_image(slots::SAMPLE_COUNT_IMAGE, count, ImageAccess::ReadWrite)
            .unwrap();

        Rig {
            device,
            program,
            output,
            color,
            count,
            resolution,
        }
    }

    impl Rig {
        fn frame(&mut self, reset: bool) {
            let uniforms = FrameUniforms {
                camera: build_camera(
                    self.resolution.width(),
                    self.resolution.height(),
                    Projection::default(),
                ),
                resolution: self.resolution,
                time: 0.25,
                reset_accumulation: reset,
            };
            let table = UniformTable::resolve(&self.device, self.program);
            for (name, value) in uniforms.values() {
                let location = table.location(name).unwrap();
                self.device.set_uniform(location, value).unwrap();
            }
            let groups = [
                self.resolution.width().div_ceil(WORKGROUP_SIZE),
                self.resolution.height().div_ceil(WORKGROUP_SIZE),
                1,
            ];
            self.device.dispatch(groups).unwrap();
            self.device.memory_barrier().unwrap();
        }
    }

    #[test]
    fn samples_accumulate_and_reset_to_one() {
        let mut rig = rig(9, 7, &Scene::demo());

        rig.frame(true);
        rig.frame(false);
        rig.frame(false);
        let counts = rig.device.read_image(rig.count).unwrap();
        assert_eq!(counts.sample_count(0, 0), Some(3));
        assert_eq!(counts.sample_count(8, 6), Some(3));

        rig.frame(true);
        let counts = rig.device.read_image(rig.count).unwrap();
        assert!((0..7).all(|y| (0..9).all(|x| counts.sample_count(x, y) == Some(1))));
        let sums = rig.device.read_image(rig.color).unwrap();
        assert_eq!(sums.color_sum(4, 3).unwrap()[3], 1.0);
    }

    #[test]
    fn sphere_and_sky_shade_as_expected() {
        let mut rig = rig(16, 16, &Scene::demo());
        rig.frame(true);
        let output = rig.device.read_image(rig.output).unwrap().to_rgba8().unwrap();

        // Center ray hits the red sphere head-on: normal.y ~ 0, shade 0.5.
        let center = output.get_pixel(8, 8).0;
        assert!(center[0] > center[1] && center[0] > center[2], "{center:?}");
        // Top row sees sky, which is blue-leaning.
        let sky = output.get_pixel(0, 0).0;
        assert!(sky[2] >= sky[0], "{sky:?}");
        assert_eq!(sky[3], 255);
    }

    #[test]
    fn empty_scene_renders_only_sky() {
        let mut rig = rig(8, 8, &Scene::new());
        rig.frame(true);
        let output = rig.device.read_image(rig.output).unwrap().to_rgba8().unwrap();
        assert!(output.pixels().all(|pixel| pixel.0[2] == 255));
    }

    #[test]
    fn reading_before_the_barrier_is_rejected() {
        let mut rig = rig(8, 8, &Scene::demo());
        rig.frame(true);
        let groups = [1, 1, 1];
        rig.device.dispatch(groups).unwrap();

        let err = rig.device.read_image(rig.output).unwrap_err();
        assert!(matches!(err, TracerError::Device(message) if message.contains("barrier")));
        rig.device.memory_barrier().unwrap();
        assert!(rig.device.read_image(rig.output).is_ok());
    }

    #[test]
    fn unknown_primitive_tags_fault_the_dispatch() {
        let mut rig = rig(8, 8, &Scene::demo());
        let buffer = rig.device.buffer_slots[&slots::SCENE_BUFFER];
        let mut record = Scene::demo().to_record();
        record.objects[1].kind = 42;
        rig.device
            .write_buffer(buffer, 0, bytemuck::bytes_of(&record))
            .unwrap();

        let err = rig.device.dispatch([1, 1, 1]).unwrap_err();
        assert!(matches!(err, TracerError::Device(message) if message.contains("42")));
    }

    #[test]
    fn allocation_limit_is_enforced() {
        let mut device = SoftwareDevice::with_allocation_limit(1);
        assert!(device.create_storage_buffer(4).is_ok());
        let err = device
            .create_image(Resolution::new(1, 1).unwrap(), ImageFormat::R32Uint)
            .unwrap_err();
        assert!(matches!(err, TracerError::ResourceAllocation { resource: "image", .. }));
    }

    #[test]
    fn oversized_images_fail_to_allocate() {
        let mut device = SoftwareDevice::new();
        let err = device
            .create_image(Resolution::new(u32::MAX, u32::MAX).unwrap(), ImageFormat::Rgba32Float)
            .unwrap_err();
        assert!(matches!(err, TracerError::ResourceAllocation { resource: "image", .. }));
        let err = device
            .create_image(Resolution::new(MAX_IMAGE_DIMENSION + 1, 1).unwrap(), ImageFormat::R32Uint)
            .unwrap_err();
        assert!(matches!(err, TracerError::ResourceAllocation { resource: "image", .. }));
        assert_eq!(device.stats().live_resources, 0);
    }

    #[test]
    fn double_release_is_counted_not_applied() {
        let mut device = SoftwareDevice::new();
        let buffer = device.create_storage_buffer(4).unwrap();
        device.release(GpuResource::Buffer(buffer));
        device.release(GpuResource::Buffer(buffer));
        let stats = device.stats();
        assert_eq!(stats.live_resources, 0);
        assert_eq!(stats.double_releases, 1);
        assert_eq!(stats.release_log, vec![GpuResource::Buffer(buffer)]);
    }

    #[test]
    fn pcg_hash_matches_reference_values() {
        assert_eq!(pcg_hash(0), 129_708_002);
        let mut seed = 1;
        let value = random_float(&mut seed);
        assert!((0.0..=1.0).contains(&value));
    }
}
