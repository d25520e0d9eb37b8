use crate::camera::CameraState;
use crate::types::Resolution;

use super::device::{ComputeDevice, ProgramId, UniformKind, UniformLocation, UniformValue};

/// Uniforms the host writes every frame, in block declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformName {
    CameraCenter,
    ViewportU,
    ViewportV,
    Pixel00Loc,
    PixelDeltaU,
    PixelDeltaV,
    Time,
    ScreenWidth,
    ScreenHeight,
    ResetAccumulation,
}

impl UniformName {
    pub const ALL: [UniformName; 10] = [
        UniformName::CameraCenter,
        UniformName::ViewportU,
        UniformName::ViewportV,
        UniformName::Pixel00Loc,
        UniformName::PixelDeltaU,
        UniformName::PixelDeltaV,
        UniformName::Time,
        UniformName::ScreenWidth,
        UniformName::ScreenHeight,
        UniformName::ResetAccumulation,
    ];

    /// Identifier used in the GLSL uniform block.
    pub fn as_str(self) -> &'static str {
        match self {
            UniformName::CameraCenter => "camera_center",
            UniformName::ViewportU => "viewport_u",
            UniformName::ViewportV => "viewport_v",
            UniformName::Pixel00Loc => "pixel00_loc",
            UniformName::PixelDeltaU => "pixel_delta_u",
            UniformName::PixelDeltaV => "pixel_delta_v",
            UniformName::Time => "time",
            UniformName::ScreenWidth => "screen_width",
            UniformName::ScreenHeight => "screen_height",
            UniformName::ResetAccumulation => "reset_accumulation",
        }
    }

    pub fn kind(self) -> UniformKind {
        match self {
            UniformName::Time => UniformKind::Float,
            UniformName::ScreenWidth
            | UniformName::ScreenHeight
            | UniformName::ResetAccumulation => UniformKind::Int,
            _ => UniformKind::Vec3,
        }
    }
}

/// Locations of every [`UniformName`] in one linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformTable {
    locations: [Option<UniformLocation>; 10],
}

impl UniformTable {
    /// Looks every uniform up once. Names the program does not declare stay
    /// unresolved and are skipped on upload.
    pub fn resolve<D: ComputeDevice + ?Sized>(device: &D, program: ProgramId) -> Self {
        let mut table = Self::default();
        for (slot, name) in table.locations.iter_mut().zip(UniformName::ALL) {
            *slot = device.uniform_location(program, name.as_str());
            if slot.is_none() {
                tracing::warn!(uniform = name.as_str(), %program, "kernel does not declare uniform");
            }
        }
        table
    }

    pub fn location(&self, name: UniformName) -> Option<UniformLocation> {
        self.locations[name as usize]
    }

    pub fn resolved(&self) -> usize {
        self.locations.iter().flatten().count()
    }
}

/// Everything the kernel needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub camera: CameraState,
    pub resolution: Resolution,
    /// Seconds since the session started; seeds the per-pixel jitter.
    pub time: f32,
    pub reset_accumulation: bool,
}

impl FrameUniforms {
    pub fn values(&self) -> [(UniformName, UniformValue); 10] {
        let camera = &self.camera;
        [
            (UniformName::CameraCenter, UniformValue::Vec3(camera.center)),
            (UniformName::ViewportU, UniformValue::Vec3(camera.viewport_u)),
            (UniformName::ViewportV, UniformValue::Vec3(camera.viewport_v)),
            (UniformName::Pixel00Loc, UniformValue::Vec3(camera.pixel00_loc)),
            (UniformName::PixelDeltaU, UniformValue::Vec3(camera.pixel_delta_u)),
            (UniformName::PixelDeltaV, UniformValue::Vec3(camera.pixel_delta_v)),
            (UniformName::Time, UniformValue::Float(self.time)),
            (
                UniformName::ScreenWidth,
                UniformValue::Int(self.resolution.width() as i32),
            ),
            (
                UniformName::ScreenHeight,
                UniformValue::Int(self.resolution.height() as i32),
            ),
            (
                UniformName::ResetAccumulation,
                UniformValue::Int(self.reset_accumulation as i32),
            ),
        ]
    }
}
