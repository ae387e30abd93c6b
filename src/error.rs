use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Path not found: '{0}'")]
    PathNotFound(String),

    #[error("Cannot convert '{path}': expected {expected}, found {found}")]
    Conversion {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Remote config path '{0}' not found or not a partial")]
    RemotePathNotFound(String),

    #[error("No decoder accepts the format '{0}'")]
    InvalidDecoderFormat(String),

    #[error("No source strategy accepts the type '{0}'")]
    InvalidSourceType(String),

    #[error("No source strategy accepts the description {0}")]
    InvalidSourcePartial(String),

    #[error("Source not found: '{0}'")]
    SourceNotFound(String),

    #[error("Duplicate source id: '{0}'")]
    DuplicateSource(String),

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Missing argument '{name}' for source type '{kind}'")]
    MissingArgument { kind: String, name: &'static str },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {format} content: {reason}")]
    Decode { format: String, reason: String },

    #[error("Decoder stream already closed")]
    DecoderClosed,

    #[error("Request to {uri} failed: {reason}")]
    Http { uri: String, reason: String },

    #[error("Invalid RFC3339 timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(#[from] confique::Error),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(format: &str, reason: impl ToString) -> Self {
        ConfigError::Decode {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }
}
