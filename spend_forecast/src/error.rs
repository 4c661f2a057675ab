//! Error types for the spend_forecast crate

use thiserror::Error;

/// Custom error types for the spend_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Caller supplied an empty, undersized or malformed request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error raised while fitting the sequence model
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Error reading or writing model artifacts
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Error in service configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from CSV decoding
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from feature math
    #[error("Math error: {0}")]
    MathError(#[from] spend_math::MathError),
}

impl ForecastError {
    /// HTTP-style status for surfacing this error at a service boundary
    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
