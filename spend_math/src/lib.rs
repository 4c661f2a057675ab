//! # Spend Math
//!
//! Numeric building blocks for spending forecasts.
//! This crate provides descriptive statistics over feature columns and a
//! feature-wise standard scaler with an exact inverse.

use thiserror::Error;

pub mod scaler;
pub mod stats;

pub use scaler::StandardScaler;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
