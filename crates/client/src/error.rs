//! Metadata source client error types.

use std::sync::Arc;

/// Errors from the Library of Congress, HathiTrust and MusicBrainz clients.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The query could not be built from the given inputs.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Rate limited by the upstream API.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SourceError::Timeout } else { SourceError::Network(Arc::new(err)) }
    }
}

/// Errors from work analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Unsupported country or invalid input.
    #[error(transparent)]
    Core(#[from] copyr_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SourceError::InvalidQuery("No valid search terms provided".to_string());
        assert!(err.to_string().contains("invalid query"));

        let err = SourceError::HttpError { status: 503 };
        assert_eq!(err.to_string(), "HTTP error: 503");
    }

    #[test]
    fn test_analyze_error_is_transparent() {
        let err = AnalyzeError::from(copyr_core::Error::InvalidInput("title or author is required".into()));
        assert_eq!(err.to_string(), "VALIDATION_ERROR: title or author is required");
    }
}
