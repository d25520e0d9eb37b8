//! Per-frame orchestration: accumulation resets, the fixed compute sequence
//! and handing the finished image to a presenter.

use crate::camera::{CameraState, Projection};
use crate::error::TracerError;
use crate::gpu::{
    BindingStatus, ComputeDevice, FrameUniforms, ImageData, ImageId, ProgramBinding,
};
use crate::scene::{Primitive, Scene};
use crate::types::{PresentRect, Resolution};

/// Receives the output image once the kernel's writes are visible.
pub trait Presenter<D: ComputeDevice> {
    fn present(
        &mut self,
        device: &mut D,
        image: ImageId,
        target: PresentRect,
    ) -> Result<(), TracerError>;
}

/// Reads the output image back to host memory instead of drawing it.
#[derive(Debug, Default)]
pub struct ReadbackPresenter {
    skip_capture: bool,
    presented: u64,
    last_target: Option<PresentRect>,
    last_frame: Option<ImageData>,
}

impl ReadbackPresenter {
    /// Captures every presented frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns readback on or off; frames presented while off are only counted.
    pub fn set_capture(&mut self, capture: bool) {
        self.skip_capture = !capture;
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn last_target(&self) -> Option<PresentRect> {
        self.last_target
    }

    pub fn last_frame(&self) -> Option<&ImageData> {
        self.last_frame.as_ref()
    }

    pub fn take_frame(&mut self) -> Option<ImageData> {
        self.last_frame.take()
    }
}

impl<D: ComputeDevice> Presenter<D> for ReadbackPresenter {
    fn present(
        &mut self,
        device: &mut D,
        image: ImageId,
        target: PresentRect,
    ) -> Result<(), TracerError> {
        if !self.skip_capture {
            self.last_frame = Some(device.read_image(image)?);
        }
        self.presented += 1;
        self.last_target = Some(target);
        Ok(())
    }
}

/// Decides which frames restart accumulation.
///
/// The first frame always resets. Any number of mutations between two frames
/// collapse into a single reset on the next completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulationController {
    reset_pending: bool,
    frames_since_reset: u32,
    frames_completed: u64,
}

impl Default for AccumulationController {
    fn default() -> Self {
        Self {
            reset_pending: true,
            frames_since_reset: 0,
            frames_completed: 0,
        }
    }
}

impl AccumulationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Value of the kernel's reset flag for the next frame.
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Records a frame that reached the device; returns whether it reset.
    pub fn complete_frame(&mut self) -> bool {
        let reset = std::mem::take(&mut self.reset_pending);
        self.frames_since_reset = if reset {
            1
        } else {
            self.frames_since_reset.saturating_add(1)
        };
        self.frames_completed += 1;
        reset
    }

    /// Samples each pixel has accumulated, matching the kernel's count image.
    pub fn frames_since_reset(&self) -> u32 {
        self.frames_since_reset
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }
}

/// Outcome of one [`FrameLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Zero-based index of the frame across the whole session.
    pub frame_index: u64,
    pub reset: bool,
    pub samples_per_pixel: u32,
    pub grid: [u32; 3],
    pub time: f32,
}

/// Owns the scene, camera and program binding and drives them frame by frame.
pub struct FrameLoop<D: ComputeDevice> {
    binding: ProgramBinding<D>,
    scene: Scene,
    projection: Projection,
    camera: CameraState,
    resolution: Resolution,
    accumulation: AccumulationController,
}

impl<D: ComputeDevice> FrameLoop<D> {
    /// Initialises the program on `device` and uploads `scene`.
    pub fn start(
        device: D,
        source: &str,
        scene: Scene,
        projection: Projection,
        resolution: Resolution,
    ) -> Result<Self, TracerError> {
        let mut binding = ProgramBinding::new(device);
        binding.initialize(source, &scene.to_record(), resolution)?;
        Ok(Self {
            binding,
            camera: CameraState::for_resolution(resolution, projection),
            scene,
            projection,
            resolution,
            accumulation: AccumulationController::new(),
        })
    }

    /// Runs one frame: bind, upload uniforms, dispatch, barrier, present.
    ///
    /// `time` is the session clock in seconds and seeds the kernel's jitter.
    /// A pending reset stays pending if the frame fails before completing.
    pub fn step<P>(&mut self, time: f32, presenter: &mut P) -> Result<FrameReport, TracerError>
    where
        P: Presenter<D> + ?Sized,
    {
        let reset_accumulation = self.accumulation.reset_pending();
        let uniforms = FrameUniforms {
            camera: self.camera,
            resolution: self.resolution,
            time,
            reset_accumulation,
        };

        self.binding.bind_resources()?;
        self.binding.upload_uniforms(&uniforms)?;
        let grid = self.binding.dispatch(self.resolution)?;
        self.binding.memory_barrier()?;
        let output = self.binding.output_image()?;
        presenter.present(
            self.binding.device_mut(),
            output,
            PresentRect::covering(self.resolution),
        )?;

        let frame_index = self.accumulation.frames_completed();
        let reset = self.accumulation.complete_frame();
        if reset {
            tracing::debug!(frame = frame_index, "accumulation restarted");
        }
        tracing::trace!(
            frame = frame_index,
            samples = self.accumulation.frames_since_reset(),
            ?grid,
            "frame complete"
        );
        Ok(FrameReport {
            frame_index,
            reset,
            samples_per_pixel: self.accumulation.frames_since_reset(),
            grid,
            time,
        })
    }

    /// Appends `primitive`, re-uploads the scene and restarts accumulation.
    ///
    /// A full scene is reported as [`TracerError::SceneFull`] and changes
    /// nothing.
    /// A failed upload also leaves the scene as it was.
    pub fn add_object(&mut self, primitive: Primitive) -> Result<(), TracerError> {
        let mut candidate = self.scene.clone();
        candidate.add_object(primitive)?;
        self.binding.upload_scene(&candidate.to_record())?;
        self.scene = candidate;
        self.accumulation.request_reset();
        tracing::debug!(objects = self.scene.len(), "added object to scene");
        Ok(())
    }

    /// Rebuilds the camera. Returns `false` (and keeps accumulating) when
    /// `projection` equals the current one.
    pub fn set_projection(&mut self, projection: Projection) -> bool {
        if projection == self.projection {
            return false;
        }
        self.projection = projection;
        self.camera = CameraState::for_resolution(self.resolution, projection);
        self.accumulation.request_reset();
        true
    }

    /// Reallocates the images and rebuilds the camera for `resolution`.
    /// Returns `false` when the size is unchanged.
    pub fn resize(&mut self, resolution: Resolution) -> Result<bool, TracerError> {
        if resolution == self.resolution {
            return Ok(false);
        }
        self.binding.resize(resolution)?;
        self.resolution = resolution;
        self.camera = CameraState::for_resolution(resolution, self.projection);
        self.accumulation.request_reset();
        tracing::debug!(%resolution, "resized frame loop");
        Ok(true)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn accumulation(&self) -> &AccumulationController {
        &self.accumulation
    }

    pub fn status(&self) -> BindingStatus {
        self.binding.status()
    }

    pub fn binding(&self) -> &ProgramBinding<D> {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut ProgramBinding<D> {
        &mut self.binding
    }

    pub fn shutdown(&mut self) {
        self.binding.shutdown();
    }
}
