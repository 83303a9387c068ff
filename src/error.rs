//! Error types for the Rategate crate.

use thiserror::Error;

/// Main error type for Rategate operations.
///
/// Admission itself never fails; these errors only surface while building
/// limiters or loading configuration.
#[derive(Error, Debug)]
pub enum RategateError {
    /// Limiter parameters that cannot produce a well-defined limiter
    #[error("Invalid limiter configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file parse errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rategate operations.
pub type Result<T> = std::result::Result<T, RategateError>;
