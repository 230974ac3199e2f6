//! # Sales Math
//!
//! Numerical routines behind the income forecast.
//! This crate provides an additive Holt-Winters model fitted by
//! deterministic least squares, the optimiser it relies on, and
//! forecast accuracy metrics.

use thiserror::Error;

pub mod accuracy;
pub mod holt_winters;
pub mod optimize;

pub use accuracy::ForecastAccuracy;
pub use holt_winters::{AdditiveHoltWinters, SmoothingParams};

/// Errors that can occur in forecasting calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Degenerate series: {0}")]
    DegenerateSeries(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for sales math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
