//! Error types for the sales_analytics crate

use polars::prelude::PolarsError;
use sales_math::MathError;
use std::fmt;
use thiserror::Error;

/// Step of the forecast pipeline a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Load,
    Aggregate,
    Fit,
    Forecast,
    Persist,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Load => "load",
            PipelineStage::Aggregate => "aggregate",
            PipelineStage::Fit => "fit",
            PipelineStage::Forecast => "forecast",
            PipelineStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Custom error types for the sales_analytics crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Source unreachable, or a table or column is missing
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Insufficient or degenerate data for the seasonal model
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// Failure writing an output table
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error loading settings
    #[error("Config error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from SQLite operations
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Any of the above, tagged with the pipeline stage it surfaced in
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<ForecastError>,
    },
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Tag this error with the stage it occurred in
    pub fn at(self, stage: PipelineStage) -> Self {
        match self {
            // keep the innermost stage
            tagged @ ForecastError::Stage { .. } => tagged,
            other => ForecastError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage this error was tagged with, if any
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            ForecastError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage tag removed
    pub fn root(&self) -> &ForecastError {
        match self {
            ForecastError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        ForecastError::ModelFit(err.to_string())
    }
}

impl From<config::ConfigError> for ForecastError {
    fn from(err: config::ConfigError) -> Self {
        ForecastError::Config(err.to_string())
    }
}

/// Attach a pipeline stage to the error side of a result
pub(crate) trait StageContext<T> {
    fn in_stage(self, stage: PipelineStage) -> Result<T>;
}

impl<T, E: Into<ForecastError>> StageContext<T> for std::result::Result<T, E> {
    fn in_stage(self, stage: PipelineStage) -> Result<T> {
        self.map_err(|e| e.into().at(stage))
    }
}
