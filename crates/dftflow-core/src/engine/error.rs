use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use super::profile::ProfileExportError;
use crate::core::io::xyz::XyzError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Snapshot I/O failed: {0}")]
    Snapshot(#[from] XyzError),

    #[error("Profile export failed: {0}")]
    ProfileExport(#[from] ProfileExportError),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend failed during {stage}: {message}")]
    Backend { stage: &'static str, message: String },

    #[error("Invalid {stage} state transition from '{from}' on {event}")]
    InvalidTransition {
        stage: &'static str,
        from: String,
        event: String,
    },
}

impl EngineError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }

    pub fn backend(stage: &'static str, message: impl Into<String>) -> Self {
        EngineError::Backend {
            stage,
            message: message.into(),
        }
    }
}

/// Renders an error and each of its sources, outermost first.
pub fn failure_trace(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut trace = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        trace.push(source.to_string());
        current = source.source();
    }
    trace
}
