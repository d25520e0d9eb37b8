use std::fmt;
use std::path::PathBuf;

use crate::camera::Projection;
use crate::error::TracerError;
use crate::scene::Scene;

/// Output resolution in physical pixels. Both dimensions are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Validates and wraps a pair of dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self, TracerError> {
        if width == 0 || height == 0 {
            return Err(TracerError::InvalidResolution { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(self) -> u32 {
        self.width
    }

    pub fn height(self) -> u32 {
        self.height
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    /// The 800x600 canvas the tracer opens with when nothing else is requested.
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Screen-space rectangle handed to the presentation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PresentRect {
    pub fn covering(resolution: Resolution) -> Self {
        Self {
            x: 0,
            y: 0,
            width: resolution.width(),
            height: resolution.height(),
        }
    }
}

/// Which compute device executes the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceBackend {
    /// Hardware adapter through `wgpu`.
    #[default]
    Wgpu,
    /// CPU reference implementation of the kernel contract.
    Software,
}

impl fmt::Display for DeviceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceBackend::Wgpu => f.write_str("wgpu"),
            DeviceBackend::Software => f.write_str("software"),
        }
    }
}

/// Adapter selection hint forwarded to `wgpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Where the compute kernel source comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShaderSelection {
    /// The kernel compiled into the crate.
    #[default]
    Embedded,
    /// A kernel on disk; relative includes resolve against `include_root`.
    File {
        path: PathBuf,
        include_root: PathBuf,
    },
}

/// How the tracer should present frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Interactive window driven by `winit`.
    Windowed,
    /// Render a fixed number of frames offscreen and write the last one to disk.
    Headless { frames: u32, output: PathBuf },
}

/// Immutable configuration passed to the tracer at start-up.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Output resolution of the compute images and window.
    pub resolution: Resolution,
    /// Camera placement and viewport parameters.
    pub projection: Projection,
    /// Primitives uploaded before the first frame.
    pub scene: Scene,
    /// Kernel source location.
    pub shader: ShaderSelection,
    /// Presentation path.
    pub mode: RunMode,
    /// Compute device choice.
    pub backend: DeviceBackend,
    /// Adapter preference for the wgpu backend.
    pub power: GpuPowerPreference,
    /// Optional FPS cap; `None` renders every redraw callback.
    pub target_fps: Option<f32>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            projection: Projection::default(),
            scene: Scene::new(),
            shader: ShaderSelection::default(),
            mode: RunMode::Windowed,
            backend: DeviceBackend::default(),
            power: GpuPowerPreference::default(),
            target_fps: Some(60.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(
            Resolution::new(0, 600),
            Err(TracerError::InvalidResolution {
                width: 0,
                height: 600
            })
        ));
        assert!(Resolution::new(800, 0).is_err());
        let resolution = Resolution::new(801, 600).expect("valid resolution");
        assert_eq!(resolution.pixel_count(), 801 * 600);
        assert_eq!(resolution.to_string(), "801x600");
    }
}
