//! Error types for stack watching.

use thiserror::Error;

/// Result type alias for reader and monitor operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Failure of the command transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}: {}", .stderr.join(" | "))]
    Exit {
        command: String,
        code: i32,
        /// Captured stderr, one entry per line.
        stderr: Vec<String>,
    },

    #[error("credential staging failed: {0}")]
    Staging(String),
}

/// Errors that abort a watch run.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A line was not valid JSON of the expected shape.
    #[error("failed to decode {context} record `{line}`: {source}")]
    Decode {
        context: &'static str,
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The JSON parsed but a field carried an unusable value.
    #[error("invalid {context} record: {message}")]
    Schema {
        context: &'static str,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WatchError {
    pub fn schema(context: &'static str, message: impl Into<String>) -> Self {
        Self::Schema {
            context,
            message: message.into(),
        }
    }
}
