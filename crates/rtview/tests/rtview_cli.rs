use std::fs;
use std::process::Command;

use tempfile::TempDir;

#[test]
fn layout_subcommand_prints_the_abi() {
    let output = Command::new(env!("CARGO_BIN_EXE_rtview"))
        .arg("layout")
        .output()
        .expect("failed to run rtview layout");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("HittableRecord: 64 bytes"));
    assert!(stdout.contains("SceneRecord: 6416 bytes"));
    assert!(stdout.contains("workgroup: 8x8x1"));
    assert!(stdout.contains("reset_accumulation"));
}

#[test]
fn headless_software_render_writes_png() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("frame.png");

    let status = Command::new(env!("CARGO_BIN_EXE_rtview"))
        .args(["--backend", "software", "--size", "24x16", "--headless", "--frames", "2"])
        .arg("--output")
        .arg(&output)
        .status()
        .expect("failed to run rtview headless");

    assert!(status.success());
    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (24, 16));
}

#[test]
fn custom_kernel_with_includes_loads_from_config() {
    let dir = TempDir::new().unwrap();
    let kernels = dir.path().join("kernels");
    fs::create_dir_all(&kernels).unwrap();
    for name in ["tracer.comp", "common.glsl", "hittable.glsl"] {
        let source = tracer::shader::EMBEDDED_SHADERS
            .iter()
            .find(|(file, _)| *file == name)
            .map(|(_, source)| *source)
            .unwrap();
        fs::write(kernels.join(name), source).unwrap();
    }
    let config = dir.path().join("scene.toml");
    fs::write(
        &config,
        r##"
version = 1

[window]
width = 16
height = 16

[shader]
path = "kernels/tracer.comp"

[[spheres]]
center = [0.0, 0.0, -1.0]
radius = 0.5
color = "#3366ff"
"##,
    )
    .unwrap();
    let output = dir.path().join("out.png");

    let status = Command::new(env!("CARGO_BIN_EXE_rtview"))
        .arg("--config")
        .arg(&config)
        .args(["--backend", "software", "--headless", "--frames", "1"])
        .arg("--output")
        .arg(&output)
        .status()
        .expect("failed to run rtview with a config file");

    assert!(status.success());
    assert!(output.exists());
}

#[test]
fn missing_kernel_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_rtview"))
        .args(["--backend", "software", "--headless", "--frames", "1"])
        .arg("--shader")
        .arg(dir.path().join("nope.comp"))
        .arg("--output")
        .arg(dir.path().join("out.png"))
        .status()
        .expect("failed to run rtview");

    assert!(!status.success());
}

#[test]
fn software_backend_refuses_to_open_a_window() {
    let status = Command::new(env!("CARGO_BIN_EXE_rtview"))
        .args(["--backend", "software"])
        .status()
        .expect("failed to run rtview");
    assert!(!status.success());
}
