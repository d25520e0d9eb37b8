//! Progressive GPU compute ray tracer.
//!
//! A compute kernel shoots one jittered ray per pixel every frame and averages
//! the result into persistent images, so the picture converges while the
//! camera and scene stay still. The host side is split as follows:
//!
//! ```text
//!   TracerConfig
//!        │
//!        ▼
//!   Tracer::run ──▶ shader::ShaderLoader ──▶ flattened GLSL
//!        │
//!        ├─▶ window  (winit + SurfacePresenter) ─┐
//!        └─▶ headless (ReadbackPresenter + PNG) ──┤
//!                                                 ▼
//!                            FrameLoop::step ──▶ ProgramBinding ──▶ ComputeDevice
//!                                                                   (WgpuDevice | SoftwareDevice)
//! ```
//!
//! [`camera`] and [`scene`] own the CPU-side data mirrored into the kernel's
//! uniforms and storage buffer, [`gpu`] owns every device resource, and
//! [`frame`] decides when accumulation restarts.

pub mod camera;
mod error;
pub mod frame;
pub mod gpu;
mod headless;
pub mod layout;
pub mod runtime;
pub mod scene;
pub mod shader;
mod types;
mod window;

use std::path::Path;

use anyhow::{bail, Context, Result};

pub use camera::{build_camera, CameraState, Projection};
pub use error::{ShaderLoadError, TracerError};
pub use frame::{AccumulationController, FrameLoop, FrameReport, Presenter, ReadbackPresenter};
pub use headless::{render_offscreen, write_png, HeadlessRender};
pub use layout::AbiReport;
pub use scene::{create_sphere, Primitive, Scene, SceneFullError, SCENE_CAPACITY};
pub use types::{
    DeviceBackend, GpuPowerPreference, PresentRect, Resolution, RunMode, ShaderSelection,
    TracerConfig,
};

use gpu::{GpuContext, SoftwareDevice, WgpuDevice};
use shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};

/// Entry point that owns the configuration and picks the presentation path.
pub struct Tracer {
    config: TracerConfig,
}

impl Tracer {
    pub fn new(config: TracerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Flattens the configured kernel source.
    pub fn load_kernel(&self) -> Result<String> {
        let source = match &self.config.shader {
            ShaderSelection::Embedded => ShaderLoader::embedded().load(KERNEL_ENTRY),
            ShaderSelection::File { path, include_root } => {
                // The entry path is relative to the working directory, not
                // to the include root.
                let entry = std::path::absolute(path)
                    .with_context(|| format!("invalid kernel path {}", path.display()))?;
                ShaderLoader::from_directory(include_root).load(&entry.to_string_lossy())
            }
        };
        source.context("failed to load compute kernel")
    }

    /// Runs until the window closes, or until the requested frames are written.
    pub fn run(&self) -> Result<()> {
        let kernel = self.load_kernel()?;
        tracing::info!(
            backend = %self.config.backend,
            resolution = %self.config.resolution,
            objects = self.config.scene.len(),
            "starting tracer"
        );
        match &self.config.mode {
            RunMode::Windowed => match self.config.backend {
                DeviceBackend::Wgpu => window::run_windowed(&self.config, &kernel),
                DeviceBackend::Software => {
                    bail!("the software backend renders offscreen only; pass --headless")
                }
            },
            RunMode::Headless { frames, output } => self.run_headless(&kernel, *frames, output),
        }
    }

    fn run_headless(&self, kernel: &str, frames: u32, output: &Path) -> Result<()> {
        let render = match self.config.backend {
            DeviceBackend::Wgpu => {
                let context = GpuContext::headless(self.config.power)?;
                let limit = context.max_texture_dimension();
                let resolution = self.config.resolution;
                if resolution.width() > limit || resolution.height() > limit {
                    bail!("{resolution} exceeds the adapter's {limit}px texture limit");
                }
                render_offscreen(WgpuDevice::new(&context), &self.config, kernel, frames)?
            }
            DeviceBackend::Software => {
                render_offscreen(SoftwareDevice::new(), &self.config, kernel, frames)?
            }
        };
        write_png(&render.image, output)
    }
}
