use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracer::{DeviceBackend, GpuPowerPreference};

#[derive(Parser, Debug)]
#[command(
    name = "rtview",
    author,
    version,
    about = "Progressive GPU compute ray tracer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scene and window configuration (TOML).
    #[arg(long, value_name = "FILE", env = "RTVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the render resolution (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Frame-rate cap for the window (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Compute kernel to load instead of the built-in one.
    #[arg(long, value_name = "PATH")]
    pub shader: Option<PathBuf>,

    /// Directory `#include` directives resolve against (defaults to the kernel's directory).
    #[arg(long, value_name = "DIR", requires = "shader")]
    pub include_root: Option<PathBuf>,

    /// Compute device: `wgpu` (default) or `software`.
    #[arg(
        long,
        value_name = "BACKEND",
        value_parser = parse_backend,
        default_value = "wgpu"
    )]
    pub backend: DeviceBackend,

    /// Adapter preference: `low` or `high` (default).
    #[arg(long, value_name = "POWER", value_parser = parse_power, default_value = "high")]
    pub power: GpuPowerPreference,

    /// Render offscreen and write the final frame instead of opening a window.
    #[arg(long, requires = "output")]
    pub headless: bool,

    /// Frames to accumulate in headless mode (default 64).
    #[arg(long, value_name = "N", requires = "headless")]
    pub frames: Option<u32>,

    /// PNG written by headless mode.
    #[arg(long, value_name = "PATH", requires = "headless")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CPU/GPU data layout and binding slots, then exit.
    Layout,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_backend(value: &str) -> Result<DeviceBackend, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "wgpu" | "gpu" => Ok(DeviceBackend::Wgpu),
        "software" | "cpu" => Ok(DeviceBackend::Software),
        other => Err(format!("unknown backend '{other}' (expected wgpu or software)")),
    }
}

pub fn parse_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown power preference '{other}' (expected low or high)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size(" 640 X 480 "), Ok((640, 480)));
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("1280").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn backends_and_power_parse() {
        assert_eq!(parse_backend("Software"), Ok(DeviceBackend::Software));
        assert_eq!(parse_backend("wgpu"), Ok(DeviceBackend::Wgpu));
        assert!(parse_backend("vulkan").is_err());
        assert_eq!(parse_power("low"), Ok(GpuPowerPreference::Low));
        assert!(parse_power("medium").is_err());
    }

    #[test]
    fn headless_flags_travel_together() {
        let cli = Cli::try_parse_from([
            "rtview",
            "--headless",
            "--frames",
            "8",
            "--output",
            "out.png",
            "--backend",
            "software",
        ])
        .unwrap();
        assert!(cli.run.headless);
        assert_eq!(cli.run.frames, Some(8));
        assert_eq!(cli.run.backend, DeviceBackend::Software);

        assert!(Cli::try_parse_from(["rtview", "--headless"]).is_err());
        assert!(Cli::try_parse_from(["rtview", "--output", "x.png"]).is_err());
    }

    #[test]
    fn layout_subcommand_parses() {
        let cli = Cli::try_parse_from(["rtview", "layout"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Layout)));
    }
}
