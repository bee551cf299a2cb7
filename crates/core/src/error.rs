//! Unified error types for copyr.ai.
//!
//! Every variant carries a stable machine code (see [`Error::code`]) that the
//! REST layer surfaces verbatim in its error envelope.

use tokio_rusqlite::rusqlite;

/// Unified error types for the copyr.ai backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty title, year out of range).
    #[error("VALIDATION_ERROR: {0}")]
    InvalidInput(String),

    /// Requested record does not exist.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// No calculator is registered for the requested country.
    #[error("VALIDATION_ERROR: country '{country}' not supported (supported: {supported})")]
    UnsupportedCountry { country: String, supported: String },

    /// Database operation failed.
    #[error("DATABASE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("DATABASE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored JSON column could not be encoded or decoded.
    #[error("DATABASE_ERROR: serialization failed: {0}")]
    Serialization(String),
}

impl Error {
    /// Machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) | Error::UnsupportedCountry { .. } => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Database(_) | Error::MigrationFailed(_) | Error::Serialization(_) => "DATABASE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("work abc123".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_unsupported_country_lists_supported() {
        let err = Error::UnsupportedCountry { country: "FR".into(), supported: "US".into() };
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("FR"));
        assert!(err.to_string().contains("supported: US"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidInput("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(Error::MigrationFailed("x".into()).code(), "DATABASE_ERROR");
        assert_eq!(Error::Serialization("x".into()).code(), "DATABASE_ERROR");
    }
}
