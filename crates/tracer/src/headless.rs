use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::frame::{FrameLoop, FrameReport, ReadbackPresenter};
use crate::gpu::{ComputeDevice, ImageData};
use crate::runtime::{SteppedTimeSource, TimeSource};
use crate::types::TracerConfig;

/// The last frame of an offscreen run.
#[derive(Debug, Clone)]
pub struct HeadlessRender {
    pub image: ImageData,
    pub report: FrameReport,
}

/// Accumulates `frames` frames on `device` and reads back the final one.
///
/// Frame times advance at the configured frame rate so repeated runs produce
/// identical images.
pub fn render_offscreen<D: ComputeDevice>(
    device: D,
    config: &TracerConfig,
    kernel_source: &str,
    frames: u32,
) -> Result<HeadlessRender> {
    if frames == 0 {
        bail!("headless rendering needs at least one frame");
    }
    let device_name = device.name().to_owned();
    let mut frame_loop = FrameLoop::start(
        device,
        kernel_source,
        config.scene.clone(),
        config.projection,
        config.resolution,
    )
    .with_context(|| format!("failed to start the tracer on {device_name}"))?;

    let mut clock = SteppedTimeSource::at_fps(config.target_fps.unwrap_or(60.0));
    let mut presenter = ReadbackPresenter::new();
    presenter.set_capture(false);
    let mut last_report = None;
    for frame in 0..frames {
        presenter.set_capture(frame + 1 == frames);
        let time = clock.sample();
        let report = frame_loop
            .step(time.seconds, &mut presenter)
            .with_context(|| format!("frame {frame} failed"))?;
        last_report = Some(report);
    }
    frame_loop.shutdown();

    let image = presenter
        .take_frame()
        .context("final frame was not read back")?;
    let report = last_report.context("no frame was rendered")?;
    tracing::info!(
        frames,
        samples = report.samples_per_pixel,
        resolution = %image.resolution,
        device = %device_name,
        "offscreen render complete"
    );
    Ok(HeadlessRender { image, report })
}

/// Encodes an `Rgba8Unorm` readback as PNG at `path`.
pub fn write_png(image: &ImageData, path: &Path) -> Result<()> {
    let encoded = image
        .to_rgba8()
        .with_context(|| format!("cannot encode a {:?} image as PNG", image.format))?;
    encoded
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote image");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{ImageFormat, SoftwareDevice};
    use crate::scene::Scene;
    use crate::shader::{ShaderLoader, ShaderSource, KERNEL_ENTRY};
    use crate::types::Resolution;

    fn config(width: u32, height: u32) -> TracerConfig {
        TracerConfig {
            resolution: Resolution::new(width, height).unwrap(),
            scene: Scene::demo(),
            ..TracerConfig::default()
        }
    }

    fn kernel() -> String {
        ShaderLoader::embedded().load(KERNEL_ENTRY).unwrap()
    }

    #[test]
    fn renders_requested_frame_count() {
        let render = render_offscreen(SoftwareDevice::new(), &config(16, 12), &kernel(), 3).unwrap();
        assert_eq!(render.report.frame_index, 2);
        assert_eq!(render.report.samples_per_pixel, 3);
        assert_eq!(render.image.format, ImageFormat::Rgba8Unorm);
        assert_eq!(render.image.bytes.len(), 16 * 12 * 4);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let first = render_offscreen(SoftwareDevice::new(), &config(8, 8), &kernel(), 2).unwrap();
        let second = render_offscreen(SoftwareDevice::new(), &config(8, 8), &kernel(), 2).unwrap();
        assert_eq!(first.image, second.image);
    }

    #[test]
    fn zero_frames_is_an_error() {
        assert!(render_offscreen(SoftwareDevice::new(), &config(8, 8), &kernel(), 0).is_err());
    }

    #[test]
    fn png_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let render = render_offscreen(SoftwareDevice::new(), &config(8, 4), &kernel(), 1).unwrap();
        write_png(&render.image, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.as_raw(), &render.image.bytes);
    }
}
