use std::borrow::Cow;
use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::naga::ShaderStage;
use winit::window::Window;

use crate::error::TracerError;
use crate::frame::Presenter;
use crate::types::{PresentRect, Resolution};

use super::context::GpuContext;
use super::device::ImageId;
use super::wgpu_device::WgpuDevice;

/// Full-screen triangle; `v_uv` spans [0, 1] with y pointing up.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    vec2 pos = positions[uint(gl_VertexIndex)];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Samples the traced image; row 0 of the image is the top of the screen.
const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform texture2D traced_image;
layout(set = 0, binding = 1) uniform sampler traced_sampler;

void main() {
    vec2 uv = vec2(v_uv.x, 1.0 - v_uv.y);
    out_color = vec4(texture(sampler2D(traced_image, traced_sampler), uv).rgb, 1.0);
}
";

/// Draws the output image onto a window surface.
pub struct SurfacePresenter {
    // Keeps the window alive for as long as the surface created from it.
    _window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bound: Option<(ImageId, wgpu::BindGroup)>,
}

impl SurfacePresenter {
    pub fn new(
        context: &GpuContext,
        window: Arc<Window>,
        surface: wgpu::Surface<'static>,
        resolution: Resolution,
    ) -> Result<Self> {
        let device = context.device.clone();
        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        if format.is_srgb() {
            tracing::warn!(?format, "no linear surface format available; colours will be gamma encoded twice");
        }
        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .or_else(|| caps.present_modes.first().copied())
            .context("surface reports no present modes")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: resolution.width(),
            height: resolution.height(),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?format, ?present_mode, %resolution, "configured window surface");

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("present sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let pipeline = create_pipeline(&device, &layout, format);

        Ok(Self {
            _window: window,
            surface,
            config,
            device,
            pipeline,
            layout,
            sampler,
            bound: None,
        })
    }

    pub fn resize(&mut self, resolution: Resolution) {
        self.config.width = resolution.width();
        self.config.height = resolution.height();
        self.surface.configure(&self.device, &self.config);
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn bind_group(&mut self, device: &WgpuDevice, image: ImageId) -> Result<&wgpu::BindGroup, TracerError> {
        let stale = !matches!(&self.bound, Some((bound, _)) if *bound == image);
        if stale {
            let view = device
                .image_view(image)
                .ok_or_else(|| TracerError::device(format!("{image} cannot be presented")))?;
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("present bind group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.bound = Some((image, group));
        }
        match &self.bound {
            Some((_, group)) => Ok(group),
            None => Err(TracerError::device("present bind group missing")),
        }
    }
}

impl Presenter<WgpuDevice> for SurfacePresenter {
    fn present(
        &mut self,
        device: &mut WgpuDevice,
        image: ImageId,
        target: PresentRect,
    ) -> Result<(), TracerError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(TracerError::device("surface out of memory"));
            }
            Err(other) => {
                tracing::warn!(error = %other, "surface error; skipping frame");
                return Ok(());
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let queue = device.queue().clone();
        let render_device = self.device.clone();
        let pipeline = self.pipeline.clone();
        let bind_group = self.bind_group(device, image)?.clone();

        let mut encoder = render_device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("present encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let width = target.width.min(self.config.width.saturating_sub(target.x));
            let height = target.height.min(self.config.height.saturating_sub(target.y));
            if width > 0 && height > 0 {
                pass.set_viewport(
                    target.x as f32,
                    target.y as f32,
                    width as f32,
                    height as f32,
                    0.0,
                    1.0,
                );
                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("present vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    });
    let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("present fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(FRAGMENT_SHADER_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("present pipeline layout"),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("present pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
