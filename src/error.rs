//! Error types for the transformation engine

use std::path::PathBuf;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised inside the engine.
///
/// None of these escape [`RuleEngine::process`](crate::RuleEngine::process);
/// they are logged and turned into "no change".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse {format} content: {message}")]
    Parse { format: String, message: String },

    #[error("Failed to serialize {format} content: {message}")]
    Serialize { format: String, message: String },

    #[error("Cannot set '{path}': segment '{segment}' is not a map")]
    PathConflict { path: String, segment: String },

    #[error("Empty key path")]
    EmptyPath,

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Pattern '{0}' has no named 'version' group")]
    MissingVersionGroup(String),

    #[error("Failed to read rule source {}: {source}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn parse(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn serialize(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Serialize {
            format: format.into(),
            message: message.to_string(),
        }
    }
}
