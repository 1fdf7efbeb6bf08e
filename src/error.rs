//! Error types.
//!
//! `MalformedDataset` is fatal at startup. Every other kind fails only the
//! current question; the session keeps accepting new ones.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading data or answering a question.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("answering service unavailable: no API key configured")]
    MissingCredential,

    #[error("answering service unavailable: {0}")]
    AnsweringService(String),

    #[error("cannot forecast from {months} month(s) of data; at least 2 are needed")]
    UnderdeterminedForecast { months: usize },

    #[error("malformed dataset: {0}")]
    MalformedDataset(String),
}

impl InsightError {
    /// Whether the session can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, InsightError::MalformedDataset(_))
    }
}

/// Errors reported by an answering service implementation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("cannot encode dataset: {0}")]
    Encode(String),

    #[error("request failed: {0}")]
    Transport(String),
}

impl From<ServiceError> for InsightError {
    fn from(e: ServiceError) -> Self {
        InsightError::AnsweringService(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(InsightError::MissingCredential.is_recoverable());
        assert!(InsightError::UnderdeterminedForecast { months: 1 }.is_recoverable());
        assert!(!InsightError::MalformedDataset("x".into()).is_recoverable());
    }

    #[test]
    fn test_service_error_maps_to_unavailable() {
        let err: InsightError = ServiceError::Timeout(Duration::from_secs(30)).into();
        assert!(matches!(err, InsightError::AnsweringService(_)));
        assert!(err.to_string().contains("unavailable"));
        assert!(err.to_string().contains("30s"));
    }
}
