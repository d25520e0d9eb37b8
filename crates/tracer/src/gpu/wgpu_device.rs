//! [`ComputeDevice`] on top of wgpu.
//!
//! GL-style slot binding is mapped onto three fixed bind groups (see
//! [`slots`]). Dispatches are recorded into a command encoder that is only
//! submitted at [`ComputeDevice::memory_barrier`], which is therefore the
//! point where kernel writes become visible to readbacks and presentation.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;

use wgpu::naga::ShaderStage;

use crate::error::TracerError;
use crate::types::Resolution;

use super::context::GpuContext;
use super::device::{
    BufferId, ComputeDevice, GpuResource, ImageAccess, ImageData, ImageFormat, ImageId, ProgramId,
    ShaderId, UniformLocation, UniformValue,
};
use super::reflect::{compile_glsl, ProgramInterface};
use super::slots;

/// Minimum uniform buffer size; also the std140 block alignment.
const UNIFORM_ALIGNMENT: u64 = 16;

struct CompiledShader {
    module: wgpu::ShaderModule,
    interface: Result<ProgramInterface, String>,
}

struct LinkedProgram {
    pipeline: wgpu::ComputePipeline,
    interface: ProgramInterface,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_bytes: Vec<u8>,
    uniforms_dirty: bool,
}

struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    resolution: Resolution,
    format: ImageFormat,
}

struct BindingLayouts {
    buffers: wgpu::BindGroupLayout,
    images: wgpu::BindGroupLayout,
    uniforms: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

impl BindingLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let buffer_entries: Vec<_> = slots::STORAGE_BUFFERS
            .iter()
            .map(|&binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let buffers = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene buffer layout"),
            entries: &buffer_entries,
        });

        let image_entries: Vec<_> = slots::IMAGES
            .iter()
            .map(|&(binding, format, access)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: storage_access(access),
                    format: texture_format(format),
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            })
            .collect();
        let images = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("accumulation image layout"),
            entries: &image_entries,
        });

        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tracer uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: slots::UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tracer pipeline layout"),
            bind_group_layouts: &[&buffers, &images, &uniforms],
            push_constant_ranges: &[],
        });

        Self {
            buffers,
            images,
            uniforms,
            pipeline,
        }
    }
}

/// Bind groups built for one particular set of bound resources.
struct CachedBindGroups {
    buffers: Vec<BufferId>,
    images: Vec<ImageId>,
    buffer_group: wgpu::BindGroup,
    image_group: wgpu::BindGroup,
}

/// Hardware compute device.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    max_texture_dimension: u32,
    layouts: BindingLayouts,
    next_id: u32,
    shaders: HashMap<ShaderId, CompiledShader>,
    programs: HashMap<ProgramId, LinkedProgram>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    images: HashMap<ImageId, GpuImage>,
    current_program: Option<ProgramId>,
    buffer_slots: HashMap<u32, BufferId>,
    image_slots: HashMap<u32, ImageId>,
    bind_groups: Option<CachedBindGroups>,
    encoder: Option<wgpu::CommandEncoder>,
    unsynchronized: HashSet<ImageId>,
}

impl WgpuDevice {
    pub fn new(context: &GpuContext) -> Self {
        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            max_texture_dimension: context.max_texture_dimension(),
            layouts: BindingLayouts::new(&context.device),
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            images: HashMap::new(),
            current_program: None,
            buffer_slots: HashMap::new(),
            image_slots: HashMap::new(),
            bind_groups: None,
            encoder: None,
            unsynchronized: HashSet::new(),
        }
    }

    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of an image for sampling by a presentation pass.
    pub fn image_view(&self, image: ImageId) -> Option<&wgpu::TextureView> {
        self.images.get(&image).map(|stored| &stored.view)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn scoped<T>(&self, filter: wgpu::ErrorFilter, create: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(filter);
        let value = create();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    /// Submits recorded but unsubmitted work.
    fn flush(&mut self) -> Result<(), TracerError> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let queue = self.queue.clone();
        self.scoped(wgpu::ErrorFilter::Validation, move || {
            queue.submit(Some(encoder.finish()));
        })
        .map_err(|error| TracerError::device(format!("command submission failed: {error}")))
    }

    fn read_mapped(&self, staging: &wgpu::Buffer) -> Result<Vec<u8>, TracerError> {
        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|error| TracerError::device(format!("device poll failed: {error}")))?;
        receiver
            .recv()
            .map_err(|_| TracerError::device("readback map callback was dropped"))?
            .map_err(|error| TracerError::device(format!("failed to map readback buffer: {error}")))?;
        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn bound_resources(&self) -> Result<(Vec<BufferId>, Vec<ImageId>), TracerError> {
        let buffers = slots::STORAGE_BUFFERS
            .iter()
            .map(|slot| {
                self.buffer_slots
                    .get(slot)
                    .copied()
                    .ok_or_else(|| TracerError::device(format!("no storage buffer bound to slot {slot}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let images = slots::IMAGES
            .iter()
            .map(|(slot, _, _)| {
                self.image_slots
                    .get(slot)
                    .copied()
                    .ok_or_else(|| TracerError::device(format!("no image bound to slot {slot}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((buffers, images))
    }

    fn prepare_bind_groups(&mut self) -> Result<(), TracerError> {
        let (buffers, images) = self.bound_resources()?;
        if let Some(cached) = &self.bind_groups {
            if cached.buffers == buffers && cached.images == images {
                return Ok(());
            }
        }

        let buffer_entries = slots::STORAGE_BUFFERS
            .iter()
            .zip(&buffers)
            .map(|(&binding, id)| {
                let buffer = self
                    .buffers
                    .get(id)
                    .ok_or_else(|| TracerError::device(format!("{id} was released")))?;
                Ok(wgpu::BindGroupEntry {
                    binding,
                    resource: buffer.as_entire_binding(),
                })
            })
            .collect::<Result<Vec<_>, TracerError>>()?;
        let image_entries = slots::IMAGES
            .iter()
            .zip(&images)
            .map(|(&(binding, format, _), id)| {
                let image = self
                    .images
                    .get(id)
                    .ok_or_else(|| TracerError::device(format!("{id} was released")))?;
                if image.format != format {
                    return Err(TracerError::device(format!(
                        "{id} has format {:?}, slot {binding} expects {format:?}",
                        image.format
                    )));
                }
                Ok(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&image.view),
                })
            })
            .collect::<Result<Vec<_>, TracerError>>()?;

        let buffer_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene buffer bind group"),
            layout: &self.layouts.buffers,
            entries: &buffer_entries,
        });
        let image_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("accumulation image bind group"),
            layout: &self.layouts.images,
            entries: &image_entries,
        });
        tracing::debug!(?buffers, ?images, "rebuilt compute bind groups");

        self.bind_groups = Some(CachedBindGroups {
            buffers,
            images,
            buffer_group,
            image_group,
        });
        Ok(())
    }

    fn forget_bindings_of(&mut self, resource: GpuResource) {
        let stale = self.bind_groups.as_ref().is_some_and(|cached| match resource {
            GpuResource::Buffer(id) => cached.buffers.contains(&id),
            GpuResource::Image(id) => cached.images.contains(&id),
            _ => false,
        });
        if stale {
            self.bind_groups = None;
        }
    }
}

impl ComputeDevice for WgpuDevice {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn compile_shader(&mut self, source: &str) -> Result<ShaderId, TracerError> {
        let module = compile_glsl(source)?;
        let interface = match ProgramInterface::from_module(&module) {
            Ok(interface) => Ok(interface),
            Err(TracerError::Link(reason)) => Err(reason),
            Err(other) => return Err(other),
        };

        let shader_module = self
            .scoped(wgpu::ErrorFilter::Validation, || {
                self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("tracer compute kernel"),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Owned(source.to_owned()),
                        stage: ShaderStage::Compute,
                        defines: &[],
                    },
                })
            })
            .map_err(|error| TracerError::Compile(error.to_string()))?;

        let id = ShaderId(self.next_id());
        self.shaders.insert(
            id,
            CompiledShader {
                module: shader_module,
                interface,
            },
        );
        Ok(id)
    }

    fn link_program(&mut self, shader: ShaderId) -> Result<ProgramId, TracerError> {
        let compiled = self
            .shaders
            .get(&shader)
            .ok_or_else(|| TracerError::Link(format!("{shader} does not exist")))?;
        let interface = compiled
            .interface
            .clone()
            .map_err(TracerError::Link)?;

        let pipeline = self
            .scoped(wgpu::ErrorFilter::Validation, || {
                self.device
                    .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some("tracer compute pipeline"),
                        layout: Some(&self.layouts.pipeline),
                        module: &compiled.module,
                        entry_point: Some("main"),
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                        cache: None,
                    })
            })
            .map_err(|error| TracerError::Link(error.to_string()))?;

        let size = u64::from(interface.uniform_block_size)
            .max(UNIFORM_ALIGNMENT)
            .next_multiple_of(UNIFORM_ALIGNMENT);
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tracer uniforms"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tracer uniform bind group"),
            layout: &self.layouts.uniforms,
            entries: &[wgpu::BindGroupEntry {
                binding: slots::UNIFORM_BINDING,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            LinkedProgram {
                pipeline,
                interface,
                uniform_buffer,
                uniform_bind_group,
                uniform_bytes: vec![0; size as usize],
                uniforms_dirty: true,
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let member = self.programs.get(&program)?.interface.uniform(name)?;
        Some(UniformLocation(member.offset))
    }

    fn create_storage_buffer(&mut self, size: u64) -> Result<BufferId, TracerError> {
        let limit = u64::from(self.device.limits().max_storage_buffer_binding_size);
        if size > limit {
            return Err(TracerError::allocation(
                "storage buffer",
                format!("{size} bytes exceeds the device limit of {limit}"),
            ));
        }
        let buffer = self
            .scoped(wgpu::ErrorFilter::OutOfMemory, || {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("scene buffer"),
                    size,
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                })
            })
            .map_err(|error| TracerError::allocation("storage buffer", error.to_string()))?;

        let id = BufferId(self.next_id());
        tracing::debug!(buffer = %id, size, "allocated storage buffer");
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), TracerError> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| TracerError::device(format!("{buffer} does not exist")))?;
        if offset + data.len() as u64 > target.size() {
            return Err(TracerError::device(format!("write past the end of {buffer}")));
        }
        self.queue.write_buffer(target, offset, data);
        Ok(())
    }

    fn read_buffer(&mut self, buffer: BufferId) -> Result<Vec<u8>, TracerError> {
        self.flush()?;
        let source = self
            .buffers
            .get(&buffer)
            .ok_or_else(|| TracerError::device(format!("{buffer} does not exist")))?;
        let size = source.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("buffer readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("buffer readback encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));
        self.read_mapped(&staging)
    }

    fn create_image(
        &mut self,
        resolution: Resolution,
        format: ImageFormat,
    ) -> Result<ImageId, TracerError> {
        let max = self.max_texture_dimension;
        if resolution.width() > max || resolution.height() > max {
            return Err(TracerError::allocation(
                "image",
                format!("{resolution} exceeds the maximum texture dimension {max}"),
            ));
        }
        let texture = self
            .scoped(wgpu::ErrorFilter::OutOfMemory, || {
                self.device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("accumulation image"),
                    size: wgpu::Extent3d {
                        width: resolution.width(),
                        height: resolution.height(),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: texture_format(format),
                    usage: wgpu::TextureUsages::STORAGE_BINDING
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            })
            .map_err(|error| TracerError::allocation("image", error.to_string()))?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = ImageId(self.next_id());
        tracing::debug!(image = %id, %resolution, ?format, "allocated image");
        self.images.insert(
            id,
            GpuImage {
                texture,
                view,
                resolution,
                format,
            },
        );
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

        let width = stored.resolution.width();
        let height = stored.resolution.height();
        let unpadded = width * stored.format.bytes_per_pixel();
        let padded = unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("image readback"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("image readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &stored.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let resolution = stored.resolution;
        let format = stored.format;
        let mapped = self.read_mapped(&staging)?;
        let mut bytes = Vec::with_capacity((unpadded * height) as usize);
        for row in mapped.chunks_exact(padded as usize) {
            bytes.extend_from_slice(&row[..unpadded as usize]);
        }
        Ok(ImageData {
            resolution,
            format,
            bytes,
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
        if !slots::STORAGE_BUFFERS.contains(&slot) {
            return Err(TracerError::device(format!("no storage buffer slot {slot}")));
        }
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
        access: ImageAccess,
    ) -> Result<(), TracerError> {
        match slots::image(slot) {
            Some((_, expected)) if expected == access => {}
            Some((_, expected)) => {
                return Err(TracerError::device(format!(
                    "image slot {slot} is declared {expected:?}, bound as {access:?}"
                )))
            }
            None => return Err(TracerError::device(format!("no image slot {slot}"))),
        }
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
        let program = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
            .ok_or_else(|| TracerError::device("set_uniform without a current program"))?;
        let bytes = value.to_bytes();
        let start = location.offset() as usize;
        let target = program
            .uniform_bytes
            .get_mut(start..start + bytes.len())
            .ok_or_else(|| TracerError::device(format!("uniform offset {start} is outside the block")))?;
        target.copy_from_slice(&bytes);
        program.uniforms_dirty = true;
        Ok(())
    }

    fn dispatch(&mut self, groups: [u32; 3]) -> Result<(), TracerError> {
        let program_id = self
            .current_program
            .ok_or_else(|| TracerError::device("dispatch without a current program"))?;
        self.prepare_bind_groups()?;

        let program = self
            .programs
            .get_mut(&program_id)
            .ok_or_else(|| TracerError::device(format!("{program_id} was released")))?;
        if program.uniforms_dirty {
            self.queue
                .write_buffer(&program.uniform_buffer, 0, &program.uniform_bytes);
            program.uniforms_dirty = false;
        }

        let Some(bind_groups) = self.bind_groups.as_ref() else {
            return Err(TracerError::device("compute bind groups are missing"));
        };
        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("tracer compute encoder"),
                })
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("tracer compute pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(slots::BUFFER_GROUP, &bind_groups.buffer_group, &[]);
            pass.set_bind_group(slots::IMAGE_GROUP, &bind_groups.image_group, &[]);
            pass.set_bind_group(slots::UNIFORM_GROUP, &program.uniform_bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        self.unsynchronized.extend(bind_groups.images.iter().copied());
        Ok(())
    }

    fn memory_barrier(&mut self) -> Result<(), TracerError> {
        self.flush()?;
        self.unsynchronized.clear();
        Ok(())
    }

    fn release(&mut self, resource: GpuResource) {
        self.forget_bindings_of(resource);
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
                self.buffers.remove(&id).map(|buffer| buffer.destroy()).is_some()
            }
            GpuResource::Image(id) => {
                self.image_slots.retain(|_, bound| *bound != id);
                self.unsynchronized.remove(&id);
                self.images
                    .remove(&id)
                    .map(|image| image.texture.destroy())
                    .is_some()
            }
        };
        if !released {
            tracing::warn!(%resource, "release of a resource that is not live");
        }
    }
}

fn texture_format(format: ImageFormat) -> wgpu::TextureFormat {
    match format {
        ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        ImageFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        ImageFormat::R32Uint => wgpu::TextureFormat::R32Uint,
    }
}

fn storage_access(access: ImageAccess) -> wgpu::StorageTextureAccess {
    match access {
        ImageAccess::ReadOnly => wgpu::StorageTextureAccess::ReadOnly,
        ImageAccess::WriteOnly => wgpu::StorageTextureAccess::WriteOnly,
        ImageAccess::ReadWrite => wgpu::StorageTextureAccess::ReadWrite,
    }
}
