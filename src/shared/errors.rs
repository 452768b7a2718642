//! Error handling for the application
//!
//! Layers below the orchestration service communicate absence of data via
//! sentinel values (`None`, empty collections, fallback constants) and never
//! return errors. The only fatal error type is [`EngineError`], returned by
//! the top-level service when the upstream produced no usable response at
//! all.

use thiserror::Error;

/// Transport-level failures reported by an `HttpTransport` implementation.
/// Always classified as transient and retried by the fetcher.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Fatal engine errors, raised only by the top-level orchestration
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Marketplace unavailable: {0}")]
    MarketplaceUnavailable(String),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Market error: {0}")]
    MarketError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::MarketError(err.to_string())
    }
}
