use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::camera::Projection;
use crate::error::TracerError;
use crate::frame::FrameLoop;
use crate::gpu::{GpuContext, SurfacePresenter, WgpuDevice};
use crate::runtime::{FramePacer, SystemTimeSource, TimeSource};
use crate::scene::create_sphere;
use crate::types::{Resolution, TracerConfig};

/// World units the camera moves per key press.
const MOVE_STEP: f32 = 0.1;
const TITLE: &str = "rtview";

/// Opens a window and renders into it until the user closes it.
///
/// WASD and the arrow keys move the camera in the viewport plane, Q/E move it
/// along the view axis, Space drops a sphere in front of the camera and
/// Escape quits.
pub fn run_windowed(config: &TracerConfig, kernel_source: &str) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_size = PhysicalSize::new(config.resolution.width(), config.resolution.height());
    let window = WindowBuilder::new()
        .with_title(TITLE)
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let instance = GpuContext::create_instance();
    let display_handle = window
        .display_handle()
        .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
    let window_handle = window
        .window_handle()
        .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
    // The presenter keeps the window alive for the surface's whole lifetime.
    let surface = unsafe {
        instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
            raw_display_handle: display_handle.as_raw(),
            raw_window_handle: window_handle.as_raw(),
        })
    }
    .context("failed to create rendering surface")?;

    let context = GpuContext::new(instance, config.power, Some(&surface))?;
    let size = window.inner_size();
    let resolution = Resolution::new(size.width, size.height).unwrap_or(config.resolution);
    let mut presenter = SurfacePresenter::new(&context, window.clone(), surface, resolution)?;
    let mut frames = FrameLoop::start(
        WgpuDevice::new(&context),
        kernel_source,
        config.scene.clone(),
        config.projection,
        resolution,
    )
    .context("failed to start the tracer")?;

    let mut clock = SystemTimeSource::new();
    let mut pacer = FramePacer::new(config.target_fps);
    let mut stats = FrameRate::new(Instant::now());
    let mut failure: Option<anyhow::Error> = None;

    tracing::info!(%resolution, adapter = %context.adapter.get_info().name, "window ready");
    window.request_redraw();

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                match handle_key(&mut frames, &event) {
                    Ok(KeyOutcome::Exit) => elwt.exit(),
                    Ok(KeyOutcome::Handled) => {}
                    Err(err) => {
                        failure = Some(err.into());
                        elwt.exit();
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                // Minimised windows report a zero size; keep the old images.
                let Ok(resolution) = Resolution::new(new_size.width, new_size.height) else {
                    return;
                };
                presenter.resize(resolution);
                if let Err(err) = frames.resize(resolution) {
                    failure = Some(anyhow::Error::new(err).context("failed to resize"));
                    elwt.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                let time = clock.sample();
                match frames.step(time.seconds, &mut presenter) {
                    Ok(report) => {
                        if let Some(fps) = stats.record(Instant::now()) {
                            window.set_title(&format!(
                                "{TITLE} | {fps:.0} fps | {} spp",
                                report.samples_per_pixel
                            ));
                            tracing::debug!(
                                fps,
                                samples = report.samples_per_pixel,
                                frame = report.frame_index,
                                "frame rate"
                            );
                        }
                    }
                    Err(err) => {
                        failure = Some(anyhow::Error::new(err).context("frame failed"));
                        elwt.exit();
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if pacer.should_render(now) {
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = pacer.next_deadline() {
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    frames.shutdown();
    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

enum KeyOutcome {
    Handled,
    Exit,
}

fn handle_key(frames: &mut FrameLoop<WgpuDevice>, event: &KeyEvent) -> Result<KeyOutcome, TracerError> {
    if event.state != ElementState::Pressed {
        return Ok(KeyOutcome::Handled);
    }
    let PhysicalKey::Code(code) = event.physical_key else {
        return Ok(KeyOutcome::Handled);
    };
    if code == KeyCode::Escape {
        return Ok(KeyOutcome::Exit);
    }
    if code == KeyCode::Space && !event.repeat {
        let center = frames.projection().center;
        let sphere = create_sphere(
            center - Vec3::new(0.0, 0.0, 1.5),
            0.25,
            Vec3::new(0.2, 0.6, 1.0),
        );
        return match frames.add_object(sphere) {
            Ok(()) => Ok(KeyOutcome::Handled),
            Err(TracerError::SceneFull(full)) => {
                tracing::warn!(capacity = full.capacity, "scene is full; sphere not added");
                Ok(KeyOutcome::Handled)
            }
            Err(err) => Err(err),
        };
    }
    if let Some(offset) = movement(code) {
        let current = frames.projection();
        frames.set_projection(Projection {
            center: current.center + offset * MOVE_STEP,
            ..current
        });
    }
    Ok(KeyOutcome::Handled)
}

fn movement(code: KeyCode) -> Option<Vec3> {
    let direction = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => Vec3::Y,
        KeyCode::KeyS | KeyCode::ArrowDown => Vec3::NEG_Y,
        KeyCode::KeyA | KeyCode::ArrowLeft => Vec3::NEG_X,
        KeyCode::KeyD | KeyCode::ArrowRight => Vec3::X,
        KeyCode::KeyQ => Vec3::Z,
        KeyCode::KeyE => Vec3::NEG_Z,
        _ => return None,
    };
    Some(direction)
}

/// Frames per second averaged over roughly one-second windows.
struct FrameRate {
    window_start: Instant,
    frames: u32,
}

impl FrameRate {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    fn record(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f32();
        if elapsed < 1.0 {
            return None;
        }
        let fps = self.frames as f32 / elapsed;
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn movement_keys_map_to_axes() {
        assert_eq!(movement(KeyCode::KeyW), Some(Vec3::Y));
        assert_eq!(movement(KeyCode::ArrowLeft), Some(Vec3::NEG_X));
        assert_eq!(movement(KeyCode::KeyE), Some(Vec3::NEG_Z));
        assert_eq!(movement(KeyCode::KeyZ), None);
    }

    #[test]
    fn frame_rate_reports_once_per_second() {
        let start = Instant::now();
        let mut rate = FrameRate::new(start);
        for frame in 1..30 {
            assert!(rate.record(start + Duration::from_millis(frame * 10)).is_none());
        }
        let fps = rate.record(start + Duration::from_secs(1)).unwrap();
        assert!((fps - 30.0).abs() < 0.01);
    }
}
