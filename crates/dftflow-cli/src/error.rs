use dftflow::engine::config::ConfigError;
use dftflow::engine::error::EngineError;
use dftflow::engine::profile::ProfileExportError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load recording '{path}': {source}", path = path.display())]
    Recording {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    ProfileExport(#[from] ProfileExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_errors_keep_the_parameter_name() {
        let err: CliError = ConfigError::MissingParameter("basis").into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required parameter: basis"
        );
    }

    #[test]
    fn recording_error_exposes_engine_source() {
        let err = CliError::Recording {
            path: PathBuf::from("rec.json"),
            source: EngineError::backend("frequency", "no recorded result"),
        };
        assert!(err.to_string().starts_with("Failed to load recording 'rec.json'"));
        assert!(err.source().is_some());
    }
}
