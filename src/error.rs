//! Unified error handling for slackirc.
//!
//! The taxonomy mirrors how failures propagate: fatal startup errors
//! terminate the process, upstream errors tear the session down or surface
//! as NOTICEs, and everything else stays confined to the client or call
//! that caused it.

use thiserror::Error;

/// Fatal startup errors. Any of these terminates the process with a
/// nonzero exit code.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid value for '{key}': {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Upstream API failures.
///
/// `Refused` is the API saying `ok=false`; everything else is transport.
/// During bootstrap any of these sends the session to cooldown; while live
/// they are per-call and surface as a broadcast NOTICE.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("api refused: {0}")]
    Refused(String),

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event stream: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),
}

impl ApiError {
    /// Short reason string used in NOTICE broadcasts.
    pub fn reason(&self) -> String {
        match self {
            ApiError::Refused(r) => r.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_reason_is_the_bare_api_error() {
        let err = ApiError::Refused("channel_not_found".into());
        assert_eq!(err.reason(), "channel_not_found");
    }
}
