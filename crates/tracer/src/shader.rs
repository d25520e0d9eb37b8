//! Flattens GLSL sources that use `#include` into a single buffer.
//!
//! Neither naga nor wgpu understand include directives, so the kernel is
//! assembled on the CPU before compilation:
//!
//! 1. Read the entry file from the loader root (a directory or the embedded set).
//! 2. Replace every `#include "name"` / `#include <name>` line with the
//!    recursively flattened file, fenced by `// BEGIN INCLUDE` / `// END INCLUDE`
//!    comments so compiler diagnostics can be traced back.
//! 3. Reject nesting deeper than [`MAX_INCLUDE_DEPTH`] and output larger than
//!    [`MAX_SHADER_SIZE`].

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ShaderLoadError;

pub const MAX_INCLUDE_DEPTH: usize = 10;
pub const MAX_SHADER_SIZE: usize = 1024 * 1024;

/// Logical name of the kernel entry file.
pub const KERNEL_ENTRY: &str = "tracer.comp";

/// Shader files compiled into the crate, addressed by file name.
pub const EMBEDDED_SHADERS: &[(&str, &str)] = &[
    (KERNEL_ENTRY, include_str!("../shaders/tracer.comp")),
    ("common.glsl", include_str!("../shaders/common.glsl")),
    ("hittable.glsl", include_str!("../shaders/hittable.glsl")),
];

/// Supplies flattened kernel source for a logical shader name.
pub trait ShaderSource {
    fn load(&self, name: &str) -> Result<String, ShaderLoadError>;
}

#[derive(Debug, Clone)]
enum ShaderRoot {
    Directory(PathBuf),
    Embedded(&'static [(&'static str, &'static str)]),
}

/// Include-aware loader over a directory or a static file table.
#[derive(Debug, Clone)]
pub struct ShaderLoader {
    root: ShaderRoot,
}

impl ShaderLoader {
    /// Resolves relative names (entry and includes) against `root`.
    pub fn from_directory(root: impl Into<PathBuf>) -> Self {
        Self {
            root: ShaderRoot::Directory(root.into()),
        }
    }

    /// Resolves names against the kernel files shipped with the crate.
    pub fn embedded() -> Self {
        Self::from_table(EMBEDDED_SHADERS)
    }

    pub fn from_table(files: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            root: ShaderRoot::Embedded(files),
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        match &self.root {
            ShaderRoot::Directory(root) if !candidate.is_absolute() => root.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    fn read(&self, path: &Path) -> Result<String, ShaderLoadError> {
        let io_error = |source| ShaderLoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        match &self.root {
            ShaderRoot::Directory(_) => std::fs::read_to_string(path).map_err(io_error),
            ShaderRoot::Embedded(files) => files
                .iter()
                .find(|(name, _)| Path::new(name) == path)
                .map(|(_, source)| (*source).to_string())
                .ok_or_else(|| {
                    io_error(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no embedded shader with this name",
                    ))
                }),
        }
    }

    fn process(&self, name: &str, depth: usize, output: &mut String) -> Result<(), ShaderLoadError> {
        let path = self.resolve(name);
        if depth > MAX_INCLUDE_DEPTH {
            return Err(ShaderLoadError::IncludeDepth {
                path,
                depth,
                limit: MAX_INCLUDE_DEPTH,
            });
        }

        let source = self.read(&path)?;
        tracing::trace!(path = %path.display(), depth, bytes = source.len(), "expanding shader file");

        for line in source.lines() {
            match parse_include(line) {
                Some(include) => {
                    output.push_str(&format!("// BEGIN INCLUDE: {include}\n"));
                    self.process(include, depth + 1, output)?;
                    output.push_str(&format!("// END INCLUDE: {include}\n"));
                }
                None => {
                    output.push_str(line);
                    output.push('\n');
                }
            }
            if output.len() > MAX_SHADER_SIZE {
                return Err(ShaderLoadError::TooLarge {
                    path,
                    limit: MAX_SHADER_SIZE,
                });
            }
        }
        Ok(())
    }
}

impl ShaderSource for ShaderLoader {
    fn load(&self, name: &str) -> Result<String, ShaderLoadError> {
        let mut output = String::new();
        self.process(name, 0, &mut output)?;
        tracing::debug!(shader = name, bytes = output.len(), "flattened shader source");
        Ok(output)
    }
}

/// Extracts the target of an `#include` directive.
///
/// Lines without a complete `"..."` or `<...>` delimiter pair are not treated
/// as includes and pass through untouched.
pub fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim_start();
    let (open, close) = match rest.chars().next()? {
        '"' => ('"', '"'),
        '<' => ('<', '>'),
        _ => return None,
    };
    let inner = &rest[open.len_utf8()..];
    let end = inner.find(close)?;
    let target = &inner[..end];
    (!target.is_empty()).then_some(target)
}
