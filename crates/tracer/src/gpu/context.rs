use anyhow::{Context as AnyhowContext, Result};
use wgpu::TextureFormatFeatureFlags;

use crate::types::GpuPowerPreference;

/// Adapter, device and queue shared by the compute device and the presenter.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        })
    }

    /// Context without a presentation surface, for offscreen rendering.
    pub fn headless(power: GpuPowerPreference) -> Result<Self> {
        Self::new(Self::create_instance(), power, None)
    }

    /// Picks an adapter (compatible with `surface` when given) and opens a
    /// device able to run the tracer kernel.
    pub fn new(
        instance: wgpu::Instance,
        power: GpuPowerPreference,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let power_preference = match power {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        };
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference,
            compatible_surface: surface,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        // The colour accumulator is a read-write rgba32float storage image,
        // which core WebGPU does not guarantee.
        let accumulator_features = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba32Float);
        if !accumulator_features
            .flags
            .contains(TextureFormatFeatureFlags::STORAGE_READ_WRITE)
        {
            anyhow::bail!(
                "adapter {} cannot use rgba32float as a read-write storage image",
                info.name
            );
        }
        let mut required_features = wgpu::Features::empty();
        if adapter
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("tracer device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured GPU error");
        }));

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}
