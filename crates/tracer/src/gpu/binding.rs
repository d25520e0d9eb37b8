use std::fmt;
use std::mem::size_of;

use crate::error::TracerError;
use crate::scene::SceneRecord;
use crate::types::Resolution;

use super::device::{
    BufferId, ComputeDevice, GpuResource, ImageAccess, ImageFormat, ImageId, ProgramId,
};
use super::lifecycle::ReleaseStack;
use super::uniforms::{FrameUniforms, UniformTable};
use super::{slots, WORKGROUP_SIZE};

/// Lifecycle of a [`ProgramBinding`].
///
/// ```text
///   Uninitialized ─▶ Compiling ─▶ Linked ─▶ Ready ─▶ Released
///                        │           │
///                        └───────────┴─▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingStatus {
    Uninitialized,
    Compiling,
    Linked,
    Ready,
    Failed,
    Released,
}

impl fmt::Display for BindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BindingStatus::Uninitialized => "uninitialized",
            BindingStatus::Compiling => "compiling",
            BindingStatus::Linked => "linked",
            BindingStatus::Ready => "ready",
            BindingStatus::Failed => "failed",
            BindingStatus::Released => "released",
        };
        f.write_str(label)
    }
}

/// The three images the kernel reads and writes every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeImages {
    pub output: ImageId,
    pub accumulated_color: ImageId,
    pub sample_count: ImageId,
}

impl ComputeImages {
    fn allocate<D: ComputeDevice + ?Sized>(
        device: &mut D,
        resources: &mut ReleaseStack,
        resolution: Resolution,
    ) -> Result<Self, TracerError> {
        let mut create = |format| {
            let image = device.create_image(resolution, format)?;
            resources.push(GpuResource::Image(image));
            Ok::<_, TracerError>(image)
        };
        Ok(Self {
            output: create(ImageFormat::Rgba8Unorm)?,
            accumulated_color: create(ImageFormat::Rgba32Float)?,
            sample_count: create(ImageFormat::R32Uint)?,
        })
    }

    fn slots(&self) -> [(u32, ImageId, ImageAccess); 3] {
        [
            (slots::OUTPUT_IMAGE, self.output, ImageAccess::WriteOnly),
            (
                slots::ACCUMULATED_COLOR_IMAGE,
                self.accumulated_color,
                ImageAccess::ReadWrite,
            ),
            (slots::SAMPLE_COUNT_IMAGE, self.sample_count, ImageAccess::ReadWrite),
        ]
    }
}

/// Rejects live records whose primitive tag the kernel does not know.
fn check_primitive_tags(scene: &SceneRecord) -> Result<(), TracerError> {
    match scene
        .live()
        .iter()
        .enumerate()
        .find_map(|(index, record)| record.kind().err().map(|err| (index, err)))
    {
        Some((index, err)) => Err(TracerError::device(format!("scene record {index} has an {err}"))),
        None => Ok(()),
    }
}

/// Number of workgroups covering `resolution` with the kernel's 8x8 tiles.
pub fn dispatch_size(resolution: Resolution) -> [u32; 3] {
    [
        resolution.width().div_ceil(WORKGROUP_SIZE),
        resolution.height().div_ceil(WORKGROUP_SIZE),
        1,
    ]
}

/// Owns the compute program and every resource it needs, on one device.
///
/// All per-frame operations require [`BindingStatus::Ready`]. Resources are
/// recorded in a [`ReleaseStack`] as they are acquired; a failed
/// initialisation, [`ProgramBinding::shutdown`] and `Drop` all drain it, so
/// each resource is released exactly once.
pub struct ProgramBinding<D: ComputeDevice> {
    device: D,
    status: BindingStatus,
    resources: ReleaseStack,
    program: Option<ProgramId>,
    uniforms: UniformTable,
    scene_buffer: Option<BufferId>,
    images: Option<ComputeImages>,
    resolution: Option<Resolution>,
}

impl<D: ComputeDevice> ProgramBinding<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            status: BindingStatus::Uninitialized,
            resources: ReleaseStack::new(),
            program: None,
            uniforms: UniformTable::default(),
            scene_buffer: None,
            images: None,
            resolution: None,
        }
    }

    pub fn status(&self) -> BindingStatus {
        self.status
    }

    /// True once initialisation has completed and until shutdown.
    pub fn is_loaded(&self) -> bool {
        self.status == BindingStatus::Ready
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn images(&self) -> Option<ComputeImages> {
        self.images
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// Compiles and links `source`, resolves uniforms, allocates the images
    /// at `resolution` and uploads `scene`.
    ///
    /// On failure every resource acquired so far is released and the binding
    /// is left in [`BindingStatus::Failed`].
    pub fn initialize(
        &mut self,
        source: &str,
        scene: &SceneRecord,
        resolution: Resolution,
    ) -> Result<(), TracerError> {
        if !matches!(
            self.status,
            BindingStatus::Uninitialized | BindingStatus::Failed
        ) {
            return Err(self.invalid("initialize"));
        }

        match self.acquire(source, scene, resolution) {
            Ok(()) => {
                self.status = BindingStatus::Ready;
                tracing::info!(
                    device = self.device.name(),
                    %resolution,
                    uniforms = self.uniforms.resolved(),
                    resources = self.resources.len(),
                    "compute program ready"
                );
                Ok(())
            }
            Err(err) => {
                let released = self.resources.release_all(&mut self.device);
                self.clear_handles();
                self.status = BindingStatus::Failed;
                tracing::warn!(error = %err, released, "compute program initialisation failed");
                Err(err)
            }
        }
    }

    fn acquire(
        &mut self,
        source: &str,
        scene: &SceneRecord,
        resolution: Resolution,
    ) -> Result<(), TracerError> {
        check_primitive_tags(scene)?;
        self.status = BindingStatus::Compiling;
        let shader = self.device.compile_shader(source)?;
        self.resources.push(GpuResource::Shader(shader));
        let program = self.device.link_program(shader)?;
        self.resources.push(GpuResource::Program(program));
        self.program = Some(program);
        self.status = BindingStatus::Linked;
        tracing::debug!(%shader, %program, "linked compute program");

        self.uniforms = UniformTable::resolve(&self.device, program);

        self.images = Some(ComputeImages::allocate(
            &mut self.device,
            &mut self.resources,
            resolution,
        )?);
        self.resolution = Some(resolution);

        let buffer = self
            .device
            .create_storage_buffer(size_of::<SceneRecord>() as u64)?;
        self.resources.push(GpuResource::Buffer(buffer));
        self.scene_buffer = Some(buffer);
        self.device
            .write_buffer(buffer, 0, bytemuck::bytes_of(scene))?;
        Ok(())
    }

    fn clear_handles(&mut self) {
        self.program = None;
        self.uniforms = UniformTable::default();
        self.scene_buffer = None;
        self.images = None;
        self.resolution = None;
    }

    fn invalid(&self, operation: &'static str) -> TracerError {
        TracerError::InvalidState {
            operation,
            status: self.status,
        }
    }

    fn ready(&self, operation: &'static str) -> Result<ReadyHandles, TracerError> {
        match (self.status, self.program, self.scene_buffer, self.images) {
            (BindingStatus::Ready, Some(program), Some(scene_buffer), Some(images)) => {
                Ok(ReadyHandles {
                    program,
                    scene_buffer,
                    images,
                })
            }
            _ => Err(self.invalid(operation)),
        }
    }

    /// Writes every resolved uniform; unresolved ones are skipped.
    pub fn upload_uniforms(&mut self, frame: &FrameUniforms) -> Result<(), TracerError> {
        let handles = self.ready("upload_uniforms")?;
        self.device.use_program(handles.program)?;
        for (name, value) in frame.values() {
            match self.uniforms.location(name) {
                Some(location) => self.device.set_uniform(location, value)?,
                None => tracing::trace!(uniform = name.as_str(), "skipping unresolved uniform"),
            }
        }
        Ok(())
    }

    /// Overwrites the scene buffer from offset 0.
    ///
    /// Live records with an unknown primitive tag are rejected before
    /// anything is written.
    pub fn upload_scene(&mut self, scene: &SceneRecord) -> Result<(), TracerError> {
        let handles = self.ready("upload_scene")?;
        check_primitive_tags(scene)?;
        self.device
            .write_buffer(handles.scene_buffer, 0, bytemuck::bytes_of(scene))?;
        tracing::debug!(objects = scene.object_count, "uploaded scene");
        Ok(())
    }

    /// Reads the scene buffer back from the device.
    pub fn read_scene(&mut self) -> Result<SceneRecord, TracerError> {
        let handles = self.ready("read_scene")?;
        let bytes = self.device.read_buffer(handles.scene_buffer)?;
        let bytes = bytes
            .get(..size_of::<SceneRecord>())
            .ok_or_else(|| TracerError::device("scene buffer readback is truncated"))?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Makes the program current and binds the scene buffer and images to
    /// their fixed slots.
    pub fn bind_resources(&mut self) -> Result<(), TracerError> {
        let handles = self.ready("bind_resources")?;
        self.device.use_program(handles.program)?;
        self.device
            .bind_storage_buffer(slots::SCENE_BUFFER, handles.scene_buffer)?;
        for (slot, image, access) in handles.images.slots() {
            self.device.bind_image(slot, image, access)?;
        }
        Ok(())
    }

    /// Dispatches enough 8x8 workgroups to cover `resolution` and returns the
    /// grid. `resolution` must be the size the images were allocated with.
    pub fn dispatch(&mut self, resolution: Resolution) -> Result<[u32; 3], TracerError> {
        self.ready("dispatch")?;
        if self.resolution != Some(resolution) {
            return Err(TracerError::device(format!(
                "dispatch at {resolution} does not match images allocated at {}",
                self.resolution
                    .map(|allocated| allocated.to_string())
                    .unwrap_or_default()
            )));
        }
        let groups = dispatch_size(resolution);
        self.device.dispatch(groups)?;
        Ok(groups)
    }

    /// Orders kernel image writes before any later read or presentation.
    pub fn memory_barrier(&mut self) -> Result<(), TracerError> {
        self.ready("memory_barrier")?;
        self.device.memory_barrier()
    }

    /// Reallocates the three images at `resolution`; their contents start
    /// zeroed, so callers must reset accumulation.
    pub fn resize(&mut self, resolution: Resolution) -> Result<(), TracerError> {
        let handles = self.ready("resize")?;
        if self.resolution == Some(resolution) {
            return Ok(());
        }
        for (_, image, _) in handles.images.slots() {
            self.resources
                .release_one(&mut self.device, GpuResource::Image(image));
        }
        self.images = None;

        match ComputeImages::allocate(&mut self.device, &mut self.resources, resolution) {
            Ok(images) => {
                self.images = Some(images);
                self.resolution = Some(resolution);
                tracing::debug!(%resolution, "reallocated compute images");
                Ok(())
            }
            Err(err) => {
                self.resources.release_all(&mut self.device);
                self.clear_handles();
                self.status = BindingStatus::Failed;
                Err(err)
            }
        }
    }

    /// Handle of the displayable image.
    pub fn output_image(&self) -> Result<ImageId, TracerError> {
        Ok(self.ready("output_image")?.images.output)
    }

    /// Releases every resource in reverse acquisition order. Safe to call
    /// more than once.
    pub fn shutdown(&mut self) {
        let released = self.resources.release_all(&mut self.device);
        if released > 0 {
            tracing::info!(released, device = self.device.name(), "released compute resources");
        }
        self.clear_handles();
        self.status = BindingStatus::Released;
    }
}

impl<D: ComputeDevice> Drop for ProgramBinding<D> {
    fn drop(&mut self) {
        self.resources.release_all(&mut self.device);
    }
}

#[derive(Clone, Copy)]
struct ReadyHandles {
    program: ProgramId,
    scene_buffer: BufferId,
    images: ComputeImages,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{build_camera, Projection};
    use crate::gpu::{SoftwareDevice, UniformValue};
    use crate::scene::{create_sphere, Scene};
    use crate::shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};
    use glam::Vec3;

    fn kernel() -> String {
        ShaderLoader::embedded().load(KERNEL_ENTRY).unwrap()
    }

    fn resolution(width: u32, height: u32) -> Resolution {
        Resolution::new(width, height).unwrap()
    }

    fn ready_binding(width: u32, height: u32) -> ProgramBinding<SoftwareDevice> {
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        binding
            .initialize(&kernel(), &Scene::demo().to_record(), resolution(width, height))
            .unwrap();
        binding
    }

    #[test]
    fn dispatch_grid_rounds_up() {
        assert_eq!(dispatch_size(resolution(800, 600)), [100, 75, 1]);
        assert_eq!(dispatch_size(resolution(801, 600)), [101, 75, 1]);
        assert_eq!(dispatch_size(resolution(1, 1)), [1, 1, 1]);
    }

    #[test]
    fn initialize_reaches_ready() {
        let binding = ready_binding(16, 8);
        assert_eq!(binding.status(), BindingStatus::Ready);
        assert!(binding.is_loaded());
        assert_eq!(binding.uniforms().resolved(), 10);
        // shader, program, three images, scene buffer
        assert_eq!(binding.device().stats().live_resources, 6);
    }

    #[test]
    fn operations_before_initialize_are_rejected() {
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        let err = binding.bind_resources().unwrap_err();
        assert!(matches!(
            err,
            TracerError::InvalidState {
                operation: "bind_resources",
                status: BindingStatus::Uninitialized
            }
        ));
        assert!(binding.output_image().is_err());
        assert!(binding.dispatch(resolution(8, 8)).is_err());
    }

    #[test]
    fn compile_failure_leaves_nothing_behind() {
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        let err = binding
            .initialize("#version 450\nvoid main( {", &SceneRecord::default(), resolution(8, 8))
            .unwrap_err();

        assert!(matches!(err, TracerError::Compile(_)));
        assert_eq!(binding.status(), BindingStatus::Failed);
        assert!(!binding.is_loaded());
        assert_eq!(binding.device().stats().live_resources, 0);
    }

    #[test]
    fn link_failure_releases_the_compiled_shader() {
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        let source = kernel().replace("local_size_y = 8", "local_size_y = 4");
        let err = binding
            .initialize(&source, &SceneRecord::default(), resolution(8, 8))
            .unwrap_err();

        assert!(matches!(err, TracerError::Link(_)));
        assert_eq!(binding.status(), BindingStatus::Failed);
        let stats = binding.device().stats();
        assert_eq!(stats.live_resources, 0);
        assert_eq!(stats.release_log.len(), 1);
    }

    #[test]
    fn allocation_failure_unwinds_in_reverse_order() {
        // Budget covers two images; the third allocation fails.
        let mut binding = ProgramBinding::new(SoftwareDevice::with_allocation_limit(2));
        let err = binding
            .initialize(&kernel(), &SceneRecord::default(), resolution(8, 8))
            .unwrap_err();

        assert!(matches!(err, TracerError::ResourceAllocation { .. }));
        assert_eq!(binding.status(), BindingStatus::Failed);
        let stats = binding.device().stats();
        assert_eq!(stats.live_resources, 0);
        let kinds: Vec<_> = stats
            .release_log
            .iter()
            .map(|resource| match resource {
                GpuResource::Image(_) => "image",
                GpuResource::Program(_) => "program",
                GpuResource::Shader(_) => "shader",
                GpuResource::Buffer(_) => "buffer",
            })
            .collect();
        assert_eq!(kinds, ["image", "image", "program", "shader"]);
    }

    #[test]
    fn failed_binding_can_be_initialised_again() {
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        assert!(binding
            .initialize("not glsl", &SceneRecord::default(), resolution(8, 8))
            .is_err());
        binding
            .initialize(&kernel(), &SceneRecord::default(), resolution(8, 8))
            .unwrap();
        assert!(binding.is_loaded());
    }

    #[test]
    fn unknown_tags_fail_initialisation_without_leaks() {
        let mut record = Scene::demo().to_record();
        record.objects[1].kind = 9;
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        let err = binding
            .initialize(&kernel(), &record, resolution(8, 8))
            .unwrap_err();
        assert!(matches!(&err, TracerError::Device(message) if message.contains("record 1")), "{err}");
        assert_eq!(binding.status(), BindingStatus::Failed);
        assert_eq!(binding.device().stats().live_resources, 0);
    }

    #[test]
    fn scene_upload_round_trips_byte_for_byte() {
        let mut binding = ready_binding(8, 8);
        let mut scene = Scene::demo();
        scene
            .add_object(create_sphere(Vec3::new(1.0, 2.0, -3.0), 0.25, Vec3::X))
            .unwrap();
        let record = scene.to_record();

        binding.upload_scene(&record).unwrap();
        assert_eq!(binding.read_scene().unwrap(), record);
    }

    #[test]
    fn uniforms_land_at_their_locations() {
        let mut binding = ready_binding(8, 8);
        let camera = build_camera(8, 8, Projection::default());
        binding
            .upload_uniforms(&FrameUniforms {
                camera,
                resolution: resolution(8, 8),
                time: 2.0,
                reset_accumulation: true,
            })
            .unwrap();

        let program = binding.program().unwrap();
        let device = binding.device();
        assert_eq!(
            device.uniform_value(program, "pixel00_loc"),
            Some(UniformValue::Vec3(camera.pixel00_loc))
        );
        assert_eq!(device.uniform_value(program, "time"), Some(UniformValue::Float(2.0)));
        assert_eq!(
            device.uniform_value(program, "reset_accumulation"),
            Some(UniformValue::Int(1))
        );
    }

    #[test]
    fn kernels_without_some_uniforms_still_run() {
        let source = kernel()
            .replace("    float time;\n", "")
            .replace("samples, time)", "samples, 0.0)");
        let mut binding = ProgramBinding::new(SoftwareDevice::new());
        binding
            .initialize(&source, &Scene::demo().to_record(), resolution(8, 8))
            .unwrap();
        assert_eq!(binding.uniforms().resolved(), 9);

        binding
            .upload_uniforms(&FrameUniforms {
                camera: build_camera(8, 8, Projection::default()),
                resolution: resolution(8, 8),
                time: 1.0,
                reset_accumulation: true,
            })
            .unwrap();
    }

    #[test]
    fn resize_reallocates_images() {
        let mut binding = ready_binding(8, 8);
        let before = binding.images().unwrap();
        binding.resize(resolution(20, 10)).unwrap();
        let after = binding.images().unwrap();

        assert_ne!(before.output, after.output);
        assert_eq!(binding.resolution(), Some(resolution(20, 10)));
        assert_eq!(binding.device().stats().live_resources, 6);
        assert!(binding.dispatch(resolution(8, 8)).is_err());
        binding.bind_resources().unwrap();
        assert_eq!(binding.dispatch(resolution(20, 10)).unwrap(), [3, 2, 1]);
    }

    #[test]
    fn shutdown_releases_once_and_drop_is_quiet() {
        let mut binding = ready_binding(8, 8);
        binding.shutdown();
        assert_eq!(binding.status(), BindingStatus::Released);
        assert_eq!(binding.device().stats().live_resources, 0);
        binding.shutdown();
        assert!(binding.bind_resources().is_err());

        let stats = binding.device().stats();
        assert_eq!(stats.release_log.len(), 6);
        assert_eq!(stats.double_releases, 0);
        drop(binding);
    }
}
