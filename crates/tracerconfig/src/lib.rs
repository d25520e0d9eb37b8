use std::fs;
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Largest window edge accepted from a config file.
pub const MAX_DIMENSION: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TracerConfigFile {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub camera: CameraSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shader: Option<ShaderSection>,
    #[serde(default = "default_spheres")]
    pub spheres: Vec<SphereEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WindowSection {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frame-rate cap; `0` renders as fast as the device allows.
    #[serde(default = "default_fps")]
    pub fps: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CameraSection {
    #[serde(default = "default_focal_length")]
    pub focal_length: f32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
    #[serde(default)]
    pub center: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShaderSection {
    /// Kernel entry file; relative paths are resolved by the caller against
    /// the directory holding the config file.
    pub path: PathBuf,
    /// Directory `#include` directives resolve against; defaults to the
    /// directory holding `path`.
    #[serde(default)]
    pub include_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SphereEntry {
    pub center: [f32; 3],
    pub radius: f32,
    #[serde(default = "default_color", deserialize_with = "deserialize_color")]
    pub color: [f32; 3],
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_fps() -> f32 {
    60.0
}

fn default_focal_length() -> f32 {
    1.0
}

fn default_viewport_height() -> f32 {
    2.0
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_spheres() -> Vec<SphereEntry> {
    vec![
        SphereEntry {
            center: [0.0, 0.0, -1.0],
            radius: 0.5,
            color: [1.0, 0.2, 0.2],
        },
        SphereEntry {
            center: [0.0, -100.5, -1.0],
            radius: 100.0,
            color: [1.0, 1.0, 0.2],
        },
    ]
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            focal_length: default_focal_length(),
            viewport_height: default_viewport_height(),
            center: [0.0; 3],
        }
    }
}

impl Default for TracerConfigFile {
    /// The 800x600, 60 FPS two-sphere scene.
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSection::default(),
            camera: CameraSection::default(),
            shader: None,
            spheres: default_spheres(),
        }
    }
}

/// Accepts `[r, g, b]` in 0..=1 or a `"#rrggbb"` string.
fn deserialize_color<'de, D>(deserializer: D) -> Result<[f32; 3], D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Components([f32; 3]),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Components(components) => Ok(components),
        Helper::Str(raw) => parse_hex_color(&raw).map_err(de::Error::custom),
    }
}

fn parse_hex_color(raw: &str) -> Result<[f32; 3], String> {
    let digits = raw.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!("invalid colour '{raw}'; expected \"#rrggbb\""));
    }
    let channel = |index: usize| {
        u8::from_str_radix(&digits[index..index + 2], 16)
            .map(|value| f32::from(value) / 255.0)
            .map_err(|err| format!("invalid colour '{raw}': {err}"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

impl TracerConfigFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: TracerConfigFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// `None` when the file asks for an uncapped frame rate.
    pub fn target_fps(&self) -> Option<f32> {
        (self.window.fps > 0.0).then_some(self.window.fps)
    }

    /// Entry path and include root of a custom kernel, if one is configured.
    pub fn shader_paths(&self) -> Option<(PathBuf, PathBuf)> {
        let shader = self.shader.as_ref()?;
        let include_root = shader.include_root.clone().unwrap_or_else(|| {
            shader
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });
        Some((shader.path.clone(), include_root))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let window = &self.window;
        for (name, value) in [("width", window.width), ("height", window.height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(ConfigError::Invalid(format!(
                    "window.{name} must be between 1 and {MAX_DIMENSION}, got {value}"
                )));
            }
        }
        if !window.fps.is_finite() || window.fps < 0.0 {
            return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
        }

        let camera = &self.camera;
        if !(camera.focal_length.is_finite() && camera.focal_length > 0.0) {
            return Err(ConfigError::Invalid(
                "camera.focal_length must be greater than zero".into(),
            ));
        }
        if !(camera.viewport_height.is_finite() && camera.viewport_height > 0.0) {
            return Err(ConfigError::Invalid(
                "camera.viewport_height must be greater than zero".into(),
            ));
        }
        if camera.center.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::Invalid("camera.center must be finite".into()));
        }

        if let Some(shader) = &self.shader {
            if shader.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("shader.path may not be empty".into()));
            }
        }

        for (index, sphere) in self.spheres.iter().enumerate() {
            if sphere.center.iter().any(|value| !value.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "spheres[{index}].center must be finite"
                )));
            }
            if !(sphere.radius.is_finite() && sphere.radius > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "spheres[{index}].radius must be greater than zero"
                )));
            }
            if sphere
                .color
                .iter()
                .any(|value| !value.is_finite() || *value < 0.0)
            {
                return Err(ConfigError::Invalid(format!(
                    "spheres[{index}].color components must be >= 0"
                )));
            }
        }

        Ok(())
    }
}
