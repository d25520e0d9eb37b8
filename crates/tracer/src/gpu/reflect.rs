//! GLSL front end and interface reflection.
//!
//! Both devices compile through naga so that a kernel which runs on the
//! software backend is also accepted by wgpu, and uniform "locations" are
//! the std140 member offsets naga computes for the uniform block.

use wgpu::naga;
use wgpu::naga::front::glsl;

use crate::error::TracerError;

use super::device::{ImageAccess, ImageFormat, UniformKind};
use super::{slots, WORKGROUP_SIZE};

/// Parses and validates a GLSL compute kernel.
///
/// Any syntax or semantic error is reported as [`TracerError::Compile`].
pub fn compile_glsl(source: &str) -> Result<naga::Module, TracerError> {
    let mut frontend = glsl::Frontend::default();
    let options = glsl::Options::from(naga::ShaderStage::Compute);
    let module = frontend
        .parse(&options, source)
        .map_err(|err| TracerError::Compile(format!("{err:?}")))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| TracerError::Compile(err.as_inner().to_string()))?;

    Ok(module)
}

/// One member of the kernel's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    /// `None` for member types the host never writes.
    pub kind: Option<UniformKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    StorageBuffer { read_only: bool },
    StorageImage {
        format: Option<ImageFormat>,
        access: ImageAccess,
    },
    UniformBlock,
    /// Samplers, sampled textures and anything else the tracer never binds.
    Other,
}

/// A resource binding declared by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// What the host needs to know about a linked kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInterface {
    pub workgroup_size: [u32; 3],
    /// Byte size of the std140 uniform block, zero when the kernel has none.
    pub uniform_block_size: u32,
    pub uniforms: Vec<UniformMember>,
    pub slots: Vec<ResourceSlot>,
}

impl ProgramInterface {
    /// Reflects `module` and checks it against the binding contract.
    ///
    /// Mismatches are [`TracerError::Link`] failures: a kernel that compiles
    /// but cannot be driven by the host does not link.
    pub fn from_module(module: &naga::Module) -> Result<Self, TracerError> {
        let entry = module
            .entry_points
            .iter()
            .find(|entry| entry.stage == naga::ShaderStage::Compute)
            .ok_or_else(|| TracerError::Link("kernel has no compute entry point".into()))?;

        let mut interface = Self {
            workgroup_size: entry.workgroup_size,
            uniform_block_size: 0,
            uniforms: Vec::new(),
            slots: Vec::new(),
        };

        for (_, global) in module.global_variables.iter() {
            let Some(binding) = global.binding.as_ref() else {
                continue;
            };
            let inner = &module.types[global.ty].inner;
            let kind = match global.space {
                naga::AddressSpace::Uniform => {
                    if let naga::TypeInner::Struct { members, span } = inner {
                        interface.uniform_block_size = *span;
                        interface.uniforms = members
                            .iter()
                            .filter_map(|member| {
                                Some(UniformMember {
                                    name: member.name.clone()?,
                                    offset: member.offset,
                                    kind: uniform_kind(&module.types[member.ty].inner),
                                })
                            })
                            .collect();
                    }
                    BindingKind::UniformBlock
                }
                naga::AddressSpace::Storage { access } => BindingKind::StorageBuffer {
                    read_only: !access.contains(naga::StorageAccess::STORE),
                },
                naga::AddressSpace::Handle => match inner {
                    naga::TypeInner::Image {
                        class: naga::ImageClass::Storage { format, access },
                        ..
                    } => BindingKind::StorageImage {
                        format: image_format(*format),
                        access: image_access(*access),
                    },
                    _ => BindingKind::Other,
                },
                _ => BindingKind::Other,
            };
            interface.slots.push(ResourceSlot {
                group: binding.group,
                binding: binding.binding,
                kind,
            });
        }

        interface.check_contract()?;
        Ok(interface)
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformMember> {
        self.uniforms.iter().find(|member| member.name == name)
    }

    fn check_contract(&self) -> Result<(), TracerError> {
        let expected = [WORKGROUP_SIZE, WORKGROUP_SIZE, 1];
        if self.workgroup_size != expected {
            return Err(TracerError::Link(format!(
                "workgroup size {:?} does not match the dispatch grid {expected:?}",
                self.workgroup_size
            )));
        }

        for slot in &self.slots {
            let accepted = match slot.kind {
                BindingKind::StorageBuffer { .. } => {
                    slot.group == slots::BUFFER_GROUP
                        && slots::STORAGE_BUFFERS.contains(&slot.binding)
                }
                BindingKind::StorageImage { format, access } => {
                    slot.group == slots::IMAGE_GROUP
                        && slots::image(slot.binding)
                            .is_some_and(|expected| (format, access) == (Some(expected.0), expected.1))
                }
                BindingKind::UniformBlock => {
                    slot.group == slots::UNIFORM_GROUP && slot.binding == slots::UNIFORM_BINDING
                }
                BindingKind::Other => false,
            };
            if !accepted {
                return Err(TracerError::Link(format!(
                    "binding (set {}, binding {}) declared as {:?} is outside the tracer binding contract",
                    slot.group, slot.binding, slot.kind
                )));
            }
        }
        Ok(())
    }
}

fn uniform_kind(inner: &naga::TypeInner) -> Option<UniformKind> {
    match *inner {
        naga::TypeInner::Scalar(scalar) if scalar == naga::Scalar::F32 => Some(UniformKind::Float),
        naga::TypeInner::Scalar(scalar) if scalar == naga::Scalar::I32 => Some(UniformKind::Int),
        naga::TypeInner::Vector {
            size: naga::VectorSize::Tri,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Vec3),
        _ => None,
    }
}

fn image_format(format: naga::StorageFormat) -> Option<ImageFormat> {
    match format {
        naga::StorageFormat::Rgba8Unorm => Some(ImageFormat::Rgba8Unorm),
        naga::StorageFormat::Rgba32Float => Some(ImageFormat::Rgba32Float),
        naga::StorageFormat::R32Uint => Some(ImageFormat::R32Uint),
        _ => None,
    }
}

fn image_access(access: naga::StorageAccess) -> ImageAccess {
    let load = access.contains(naga::StorageAccess::LOAD);
    let store = access.contains(naga::StorageAccess::STORE);
    match (load, store) {
        (true, false) => ImageAccess::ReadOnly,
        (false, true) => ImageAccess::WriteOnly,
        _ => ImageAccess::ReadWrite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};

    fn kernel() -> String {
        ShaderLoader::embedded().load(KERNEL_ENTRY).unwrap()
    }

    #[test]
    fn embedded_kernel_satisfies_the_binding_contract() {
        let module = compile_glsl(&kernel()).unwrap();
        let interface = ProgramInterface::from_module(&module).unwrap();

        assert_eq!(interface.workgroup_size, [8, 8, 1]);
        let names: Vec<_> = interface.uniforms.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "camera_center",
                "viewport_u",
                "viewport_v",
                "pixel00_loc",
                "pixel_delta_u",
                "pixel_delta_v",
                "time",
                "screen_width",
                "screen_height",
                "reset_accumulation",
            ]
        );
        assert_eq!(interface.uniform("camera_center").unwrap().offset, 0);
        assert_eq!(interface.uniform("viewport_u").unwrap().offset, 16);
        assert_eq!(
            interface.uniform("pixel_delta_v").unwrap().kind,
            Some(UniformKind::Vec3)
        );
        assert_eq!(interface.uniform("time").unwrap().kind, Some(UniformKind::Float));
        assert_eq!(
            interface.uniform("reset_accumulation").unwrap().kind,
            Some(UniformKind::Int)
        );
        assert!(interface.uniform_block_size >= 108);
        assert_eq!(interface.slots.len(), 5);
    }

    #[test]
    fn syntax_errors_fail_to_compile() {
        let err = compile_glsl("#version 450\nvoid main() { this is not glsl }\n").unwrap_err();
        assert!(matches!(err, TracerError::Compile(_)));
    }

    #[test]
    fn wrong_workgroup_size_fails_to_link() {
        let source = kernel().replace("local_size_x = 8", "local_size_x = 16");
        let module = compile_glsl(&source).unwrap();
        let err = ProgramInterface::from_module(&module).unwrap_err();
        assert!(matches!(err, TracerError::Link(message) if message.contains("workgroup")));
    }

    #[test]
    fn foreign_bindings_fail_to_link() {
        let source = kernel().replace(
            "layout(rgba8, set = 1, binding = 0)",
            "layout(rgba8, set = 3, binding = 0)",
        );
        let module = compile_glsl(&source).unwrap();
        let err = ProgramInterface::from_module(&module).unwrap_err();
        assert!(matches!(err, TracerError::Link(message) if message.contains("set 3")));
    }
}
