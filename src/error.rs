//! Error types for the recipe registry, runtime and transport.

use crate::transport::Envelope;
use thiserror::Error;

/// Errors raised while building recipes or loading configuration
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Invalid recipe definition: {0}")]
    InvalidDefinition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for RecipeError {
    fn from(err: config::ConfigError) -> Self {
        RecipeError::ConfigError(err.to_string())
    }
}

/// Failure kinds surfaced across the transport boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not found")]
    NotFound,

    #[error("not authorized")]
    NotAuthorized,

    #[error("not appropriate")]
    NotAppropriate,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not implemented")]
    NotImplemented,

    #[error("never implemented")]
    NeverImplemented,

    /// The write carried a timestamp older than the recipe's last execution
    #[error("timestamp conflict")]
    TimestampConflict,
}

/// A failed transport operation together with an echo of the request
#[derive(Debug, Clone, Error)]
#[error("{error} (id: {:?}, band: {:?})", .echo.id, .echo.band)]
pub struct Rejection {
    #[source]
    pub error: TransportError,
    pub echo: Envelope,
}

impl Rejection {
    pub fn new(error: TransportError, echo: Envelope) -> Self {
        Self { error, echo }
    }
}
