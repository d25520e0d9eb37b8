use std::fmt;

use glam::Vec3;

use crate::error::TracerError;
use crate::types::Resolution;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

resource_id!(
    /// Compiled (but not yet linked) kernel source.
    ShaderId,
    "shader"
);
resource_id!(
    /// Linked compute program ready to be made current.
    ProgramId,
    "program"
);
resource_id!(BufferId, "buffer");
resource_id!(ImageId, "image");

/// Any resource a device hands out; the unit of release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Shader(ShaderId),
    Program(ProgramId),
    Buffer(BufferId),
    Image(ImageId),
}

impl fmt::Display for GpuResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuResource::Shader(id) => id.fmt(f),
            GpuResource::Program(id) => id.fmt(f),
            GpuResource::Buffer(id) => id.fmt(f),
            GpuResource::Image(id) => id.fmt(f),
        }
    }
}

/// Texel formats used by the accumulation images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Displayable output, one byte per channel.
    Rgba8Unorm,
    /// Running colour sum.
    Rgba32Float,
    /// Per-pixel sample counter.
    R32Uint,
}

impl ImageFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::Rgba8Unorm | ImageFormat::R32Uint => 4,
            ImageFormat::Rgba32Float => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Tightly packed texels read back from an image, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub resolution: Resolution,
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ImageData {
    /// Raw texel bytes for pixel (`x`, `y`).
    pub fn texel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.resolution.width() || y >= self.resolution.height() {
            return None;
        }
        let stride = self.format.bytes_per_pixel() as usize;
        let start = (y as usize * self.resolution.width() as usize + x as usize) * stride;
        self.bytes.get(start..start + stride)
    }

    /// Sample count stored at (`x`, `y`) of an `R32Uint` image.
    pub fn sample_count(&self, x: u32, y: u32) -> Option<u32> {
        if self.format != ImageFormat::R32Uint {
            return None;
        }
        self.texel(x, y).map(bytemuck::pod_read_unaligned::<u32>)
    }

    /// Accumulated colour at (`x`, `y`) of an `Rgba32Float` image.
    pub fn color_sum(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if self.format != ImageFormat::Rgba32Float {
            return None;
        }
        self.texel(x, y).map(bytemuck::pod_read_unaligned::<[f32; 4]>)
    }

    /// Converts an `Rgba8Unorm` readback into an encodable image.
    pub fn to_rgba8(&self) -> Option<image::RgbaImage> {
        if self.format != ImageFormat::Rgba8Unorm {
            return None;
        }
        image::RgbaImage::from_raw(
            self.resolution.width(),
            self.resolution.height(),
            self.bytes.clone(),
        )
    }
}

/// Type of a kernel uniform as far as the host is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec3(Vec3),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }

    /// std140 bytes of the value (vec3 occupies 12 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(value) => value.to_ne_bytes().to_vec(),
            UniformValue::Int(value) => value.to_ne_bytes().to_vec(),
            UniformValue::Vec3(value) => bytemuck::cast_slice(&value.to_array()).to_vec(),
        }
    }
}

/// Where a named uniform lives inside a linked program.
///
/// For the block-based devices this is the member's byte offset in the
/// uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn offset(self) -> u32 {
        self.0
    }
}

/// Compute API the tracer is written against.
///
/// Method names follow the classic OpenGL compute workflow: compile, link,
/// look up uniforms, allocate buffers and images, bind them to numbered slots
/// (see [`super::slots`]), dispatch, and fence with a memory barrier before
/// anything reads what the kernel wrote.
pub trait ComputeDevice {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    fn compile_shader(&mut self, source: &str) -> Result<ShaderId, TracerError>;
    fn link_program(&mut self, shader: ShaderId) -> Result<ProgramId, TracerError>;
    /// `None` when the program does not declare `name`.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn create_storage_buffer(&mut self, size: u64) -> Result<BufferId, TracerError>;
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
        -> Result<(), TracerError>;
    fn read_buffer(&mut self, buffer: BufferId) -> Result<Vec<u8>, TracerError>;

    fn create_image(
        &mut self,
        resolution: Resolution,
        format: ImageFormat,
    ) -> Result<ImageId, TracerError>;
    /// Reads an image back. Only valid once a barrier has followed the last
    /// dispatch that wrote it.
    fn read_image(&mut self, image: ImageId) -> Result<ImageData, TracerError>;

    fn use_program(&mut self, program: ProgramId) -> Result<(), TracerError>;
    fn bind_storage_buffer(&mut self, slot: u32, buffer: BufferId) -> Result<(), TracerError>;
    fn bind_image(
        &mut self,
        slot: u32,
        image: ImageId,
        access: ImageAccess,
    ) -> Result<(), TracerError>;
    fn set_uniform(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Result<(), TracerError>;

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), TracerError>;
    fn memory_barrier(&mut self) -> Result<(), TracerError>;

    /// Frees a resource. Releasing an unknown or already released id is
    /// ignored by the device.
    fn release(&mut self, resource: GpuResource);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_helpers_respect_format() {
        let resolution = Resolution::new(2, 1).unwrap();
        let counts = ImageData {
            resolution,
            format: ImageFormat::R32Uint,
            bytes: bytemuck::cast_slice(&[3u32, 7u32]).to_vec(),
        };
        assert_eq!(counts.sample_count(1, 0), Some(7));
        assert_eq!(counts.sample_count(2, 0), None);
        assert_eq!(counts.color_sum(0, 0), None);
        assert!(counts.to_rgba8().is_none());

        let output = ImageData {
            resolution,
            format: ImageFormat::Rgba8Unorm,
            bytes: vec![255, 0, 0, 255, 0, 255, 0, 255],
        };
        let image = output.to_rgba8().unwrap();
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn vec3_uniforms_pack_twelve_bytes() {
        let value = UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(value.kind(), UniformKind::Vec3);
        assert_eq!(value.to_bytes().len(), 12);
        assert_eq!(UniformValue::Int(-1).to_bytes(), (-1i32).to_ne_bytes());
    }
}
