use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - edit it if needed and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Document errors
    #[error(transparent)]
    Load(#[from] LoadError),

    // Session storage errors
    #[error("Failed to serialize session: {0}")]
    SessionSerialize(#[from] serde_json::Error),

    // Network errors
    #[error("Network request failed: {0}")]
    NetworkError(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Terminal failure of one import attempt.
///
/// No partial chapter list ever accompanies one of these.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: {extension:?}")]
    UnsupportedFormat { extension: String },

    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Document could not be decoded: {reason}")]
    CorruptContainer { reason: String },

    #[error("No readable chapters found in document")]
    NoChaptersFound,

    #[error("Document took too long to load")]
    TimedOut,

    /// A newer import was started before this one finished
    #[error("Import was superseded by a newer one")]
    Superseded,
}

impl LoadError {
    /// The single message shown to the reader for this failure kind.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => {
                "Unsupported file type. Please choose an .epub, .pdf or .txt file."
            }
            Self::ReadError(_) => "The file could not be read.",
            Self::CorruptContainer { .. } => {
                "The file appears to be damaged or is not a valid document."
            }
            Self::NoChaptersFound => "No readable text was found in this document.",
            Self::TimedOut => "Loading the document took too long and was cancelled.",
            Self::Superseded => "Another document was opened while this one was loading.",
        }
    }
}

/// Failure reported by an external decoder for a container, page or section.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoder rejected the container: {0}")]
    Container(String),

    #[error("section {index} unavailable: {reason}")]
    Section { index: usize, reason: String },

    #[error("decoding was cancelled")]
    Cancelled,
}

/// Failure of a single dictionary request.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("dictionary request failed: {0}")]
    Transport(String),

    #[error("dictionary response could not be parsed: {0}")]
    Parse(String),

    /// Non-success HTTP status other than "not found"
    #[error("dictionary returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_distinct() {
        let errors = [
            LoadError::UnsupportedFormat {
                extension: "docx".into(),
            },
            LoadError::ReadError(std::io::Error::other("boom")),
            LoadError::CorruptContainer {
                reason: "bad zip".into(),
            },
            LoadError::NoChaptersFound,
            LoadError::TimedOut,
            LoadError::Superseded,
        ];

        let mut messages: Vec<_> = errors.iter().map(LoadError::user_message).collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_load_error_converts_into_core_error() {
        let err: CoreError = LoadError::TimedOut.into();
        assert!(matches!(err, CoreError::Load(LoadError::TimedOut)));
        assert_eq!(err.to_string(), "Document took too long to load");
    }
}
