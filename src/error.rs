//! Error types for modqueue
//!
//! The taxonomy mirrors the failure classes of the moderation workflow:
//! configuration problems, transport failures, the two vendor-recognized
//! page conditions (bad password, missing list), and apply-phase failures.

use thiserror::Error;

/// Result type alias for modqueue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modqueue
#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable URL or invalid trust-policy configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection, IO, or TLS-verification failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Vendor page indicates the password was rejected
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Vendor page indicates the list does not exist
    #[error("list not found: {0}")]
    NotFound(String),

    /// Apply-phase failure, including attempts to apply with nothing flagged
    #[error("submission failed: {0}")]
    Submission(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        // reqwest wraps DNS, connect, TLS, and body errors; all of them are
        // transport failures from the caller's point of view.
        Error::Transport(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_taxonomy_prefix() {
        assert_eq!(
            Error::Config("bad url".into()).to_string(),
            "configuration error: bad url"
        );
        assert_eq!(
            Error::Transport("connection refused".into()).to_string(),
            "transport error: connection refused"
        );
        assert_eq!(
            Error::Authentication("invalid password?".into()).to_string(),
            "authentication failed: invalid password?"
        );
        assert_eq!(
            Error::NotFound("list gone".into()).to_string(),
            "list not found: list gone"
        );
        assert_eq!(
            Error::Submission("no messages flagged".into()).to_string(),
            "submission failed: no messages flagged"
        );
    }

    #[test]
    fn url_parse_error_converts_to_config() {
        let err: Error = "not a url".parse::<url::Url>().unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().starts_with("configuration error:"));
    }
}
