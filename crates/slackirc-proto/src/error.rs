//! Protocol-level errors.

use thiserror::Error;

/// Errors produced while decoding or encoding IRC lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A line exceeded the codec's length limit.
    #[error("line too long: {actual} bytes (limit {limit})")]
    LineTooLong {
        /// Observed length including the terminator.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A line held no command token at all.
    #[error("empty message")]
    EmptyMessage,

    /// The prefix token could not be understood.
    #[error("malformed prefix: {0:?}")]
    MalformedPrefix(String),

    /// Underlying transport failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
