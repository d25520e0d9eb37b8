//! Compute-side orchestration for the progressive tracer.
//!
//! The kernel is driven through an OpenGL-flavoured device seam so the
//! frame pipeline does not care whether pixels come from a GPU:
//! - `device` defines [`ComputeDevice`] plus the opaque resource ids and
//!   uniform value types that cross it.
//! - `reflect` parses GLSL with naga and checks the kernel against the fixed
//!   binding contract in [`slots`].
//! - `uniforms` names the per-frame uniforms and resolves their locations once
//!   per linked program.
//! - `lifecycle` records acquired resources so they are released in reverse
//!   order exactly once.
//! - `binding` is the [`ProgramBinding`] state machine that owns the program,
//!   scene buffer and the three accumulation images.
//! - `wgpu_device` and `context` implement the seam on real hardware;
//!   `software` is a CPU reference used by tests and the `software` backend.
//! - `blit` presents the output image onto a window surface.

mod binding;
mod blit;
mod context;
mod device;
mod lifecycle;
mod reflect;
mod software;
mod uniforms;
mod wgpu_device;

pub use binding::{dispatch_size, BindingStatus, ComputeImages, ProgramBinding};
pub use blit::SurfacePresenter;
pub use context::GpuContext;
pub use device::{
    BufferId, ComputeDevice, GpuResource, ImageAccess, ImageData, ImageFormat, ImageId, ProgramId,
    ShaderId, UniformKind, UniformLocation, UniformValue,
};
pub use lifecycle::ReleaseStack;
pub use reflect::{compile_glsl, BindingKind, ProgramInterface, ResourceSlot, UniformMember};
pub use software::{SoftwareDevice, SoftwareStats};
pub use uniforms::{FrameUniforms, UniformName, UniformTable};
pub use wgpu_device::WgpuDevice;

/// Edge length of the square compute workgroup the kernel is written for.
pub const WORKGROUP_SIZE: u32 = 8;

/// Binding contract shared with `shaders/common.glsl` and `shaders/hittable.glsl`.
///
/// Slots are per resource class, as in OpenGL; each class lives in its own
/// descriptor set on the wgpu side.
pub mod slots {
    use super::{ImageAccess, ImageFormat};

    /// Descriptor set holding the scene storage buffer.
    pub const BUFFER_GROUP: u32 = 0;
    /// Descriptor set holding the three storage images.
    pub const IMAGE_GROUP: u32 = 1;
    /// Descriptor set holding the std140 uniform block.
    pub const UNIFORM_GROUP: u32 = 2;
    pub const UNIFORM_BINDING: u32 = 0;

    pub const SCENE_BUFFER: u32 = 0;

    pub const OUTPUT_IMAGE: u32 = 0;
    pub const ACCUMULATED_COLOR_IMAGE: u32 = 1;
    pub const SAMPLE_COUNT_IMAGE: u32 = 2;

    /// Storage buffer slots the kernel may declare.
    pub const STORAGE_BUFFERS: &[u32] = &[SCENE_BUFFER];

    /// Image slots with the format and access the kernel must declare them with.
    pub const IMAGES: &[(u32, ImageFormat, ImageAccess)] = &[
        (OUTPUT_IMAGE, ImageFormat::Rgba8Unorm, ImageAccess::WriteOnly),
        (
            ACCUMULATED_COLOR_IMAGE,
            ImageFormat::Rgba32Float,
            ImageAccess::ReadWrite,
        ),
        (SAMPLE_COUNT_IMAGE, ImageFormat::R32Uint, ImageAccess::ReadWrite),
    ];

    /// Format and access expected at an image slot.
    pub fn image(slot: u32) -> Option<(ImageFormat, ImageAccess)> {
        IMAGES
            .iter()
            .find(|(binding, _, _)| *binding == slot)
            .map(|(_, format, access)| (*format, *access))
    }
}
