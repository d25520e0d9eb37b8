use std::path::PathBuf;

use crate::gpu::BindingStatus;
use crate::scene::SceneFullError;

/// Failures raised while turning a logical shader name into flattened source.
#[derive(Debug, thiserror::Error)]
pub enum ShaderLoadError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("include depth exceeded ({depth} > {limit}) while loading {path}")]
    IncludeDepth {
        path: PathBuf,
        depth: usize,
        limit: usize,
    },
    #[error("flattened shader exceeds {limit} bytes after loading {path}")]
    TooLarge { path: PathBuf, limit: usize },
}

/// Every error the tracer core can report.
///
/// Initialisation failures leave the program binding in the failed state;
/// `SceneFull` is the only condition expected during normal operation.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    #[error(transparent)]
    ShaderLoad(#[from] ShaderLoadError),
    #[error("compute shader failed to compile: {0}")]
    Compile(String),
    #[error("compute program failed to link: {0}")]
    Link(String),
    #[error(transparent)]
    SceneFull(#[from] SceneFullError),
    #[error("`{operation}` is not allowed while the program binding is {status}")]
    InvalidState {
        operation: &'static str,
        status: BindingStatus,
    },
    #[error("failed to allocate {resource}: {reason}")]
    ResourceAllocation {
        resource: &'static str,
        reason: String,
    },
    #[error("resolution must be positive, got {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
    #[error("compute device fault: {0}")]
    Device(String),
}

impl TracerError {
    pub(crate) fn device(message: impl Into<String>) -> Self {
        TracerError::Device(message.into())
    }

    pub(crate) fn allocation(resource: &'static str, reason: impl Into<String>) -> Self {
        TracerError::ResourceAllocation {
            resource,
            reason: reason.into(),
        }
    }
}
