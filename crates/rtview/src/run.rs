use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Vec3;
use tracer::{
    create_sphere, AbiReport, Projection, Resolution, RunMode, Scene, ShaderSelection, Tracer,
    TracerConfig, TracerError,
};
use tracerconfig::TracerConfigFile;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;

const DEFAULT_HEADLESS_FRAMES: u32 = 64;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: RunArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => TracerConfigFile::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TracerConfigFile::default(),
    };
    let config = build_config(&args, &file)?;
    tracing::debug!(?config.mode, shader = ?config.shader, "resolved rtview configuration");
    Tracer::new(config).run()
}

pub fn print_layout() -> Result<()> {
    let report = AbiReport::embedded().context("failed to reflect the built-in kernel")?;
    print!("{report}");
    Ok(())
}

/// Merges the config file with command-line overrides; flags win.
pub fn build_config(args: &RunArgs, file: &TracerConfigFile) -> Result<TracerConfig> {
    let (width, height) = args
        .size
        .unwrap_or((file.window.width, file.window.height));
    let resolution = Resolution::new(width, height)?;

    let fps = args.fps.unwrap_or(file.window.fps);
    let target_fps = (fps > 0.0).then_some(fps);

    let projection = Projection {
        focal_length: file.camera.focal_length,
        viewport_height: file.camera.viewport_height,
        center: Vec3::from_array(file.camera.center),
    };

    let mut scene = Scene::new();
    for (index, sphere) in file.spheres.iter().enumerate() {
        let primitive = create_sphere(
            Vec3::from_array(sphere.center),
            sphere.radius,
            Vec3::from_array(sphere.color),
        );
        if let Err(full) = scene.add_object(primitive) {
            tracing::warn!(
                capacity = full.capacity,
                dropped = file.spheres.len() - index,
                "{}",
                TracerError::SceneFull(full)
            );
            break;
        }
    }

    let config_dir = args.config.as_deref().and_then(Path::parent);
    let shader = match &args.shader {
        Some(path) => ShaderSelection::File {
            path: path.clone(),
            include_root: args
                .include_root
                .clone()
                .unwrap_or_else(|| parent_or_current(path)),
        },
        None => match file.shader_paths() {
            Some((path, include_root)) => ShaderSelection::File {
                path: relative_to(config_dir, path),
                include_root: relative_to(config_dir, include_root),
            },
            None => ShaderSelection::Embedded,
        },
    };

    let mode = if args.headless {
        RunMode::Headless {
            frames: args.frames.unwrap_or(DEFAULT_HEADLESS_FRAMES),
            output: args
                .output
                .clone()
                .context("--headless needs --output")?,
        }
    } else {
        RunMode::Windowed
    };

    Ok(TracerConfig {
        resolution,
        projection,
        scene,
        shader,
        mode,
        backend: args.backend,
        power: args.power,
        target_fps,
    })
}

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Paths in a config file are relative to the file itself.
fn relative_to(base: Option<&Path>, path: PathBuf) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use tracer::SCENE_CAPACITY;
    use tracerconfig::SphereEntry;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["rtview"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn defaults_reproduce_the_demo_scene() {
        let config = build_config(&args(&[]), &TracerConfigFile::default()).unwrap();
        assert_eq!(config.resolution, Resolution::new(800, 600).unwrap());
        assert_eq!(config.target_fps, Some(60.0));
        assert_eq!(config.scene, Scene::demo());
        assert_eq!(config.shader, ShaderSelection::Embedded);
        assert_eq!(config.mode, RunMode::Windowed);
    }

    #[test]
    fn flags_override_the_file() {
        let file = TracerConfigFile::from_toml_str(
            "version = 1\n[window]\nwidth = 320\nheight = 200\nfps = 30",
        )
        .unwrap();
        let config = build_config(&args(&["--size", "64x48", "--fps", "0"]), &file).unwrap();
        assert_eq!(config.resolution, Resolution::new(64, 48).unwrap());
        assert_eq!(config.target_fps, None);

        let config = build_config(&args(&[]), &file).unwrap();
        assert_eq!(config.resolution, Resolution::new(320, 200).unwrap());
        assert_eq!(config.target_fps, Some(30.0));
    }

    #[test]
    fn oversized_scenes_are_truncated() {
        let mut file = TracerConfigFile::default();
        file.spheres = (0..SCENE_CAPACITY + 5)
            .map(|index| SphereEntry {
                center: [index as f32, 0.0, -3.0],
                radius: 0.1,
                color: [1.0, 1.0, 1.0],
            })
            .collect();
        let config = build_config(&args(&[]), &file).unwrap();
        assert_eq!(config.scene.len(), SCENE_CAPACITY);
    }

    #[test]
    fn shader_flag_defaults_include_root_to_its_directory() {
        let config =
            build_config(&args(&["--shader", "kernels/tracer.comp"]), &TracerConfigFile::default())
                .unwrap();
        assert_eq!(
            config.shader,
            ShaderSelection::File {
                path: PathBuf::from("kernels/tracer.comp"),
                include_root: PathBuf::from("kernels"),
            }
        );

        let config = build_config(&args(&["--shader", "tracer.comp"]), &TracerConfigFile::default())
            .unwrap();
        assert_eq!(
            config.shader,
            ShaderSelection::File {
                path: PathBuf::from("tracer.comp"),
                include_root: PathBuf::from("."),
            }
        );
    }

    #[test]
    fn config_file_shader_paths_are_relative_to_the_file() {
        let file = TracerConfigFile::from_toml_str(
            "version = 1\n[shader]\npath = \"kernels/tracer.comp\"",
        )
        .unwrap();
        let config = build_config(&args(&["--config", "/etc/rtview/scene.toml"]), &file).unwrap();
        assert_eq!(
            config.shader,
            ShaderSelection::File {
                path: PathBuf::from("/etc/rtview/kernels/tracer.comp"),
                include_root: PathBuf::from("/etc/rtview/kernels"),
            }
        );
    }

    #[test]
    fn headless_mode_defaults_frame_count() {
        let config = build_config(
            &args(&["--headless", "--output", "out.png"]),
            &TracerConfigFile::default(),
        )
        .unwrap();
        assert_eq!(
            config.mode,
            RunMode::Headless {
                frames: DEFAULT_HEADLESS_FRAMES,
                output: PathBuf::from("out.png"),
            }
        );
    }
}
