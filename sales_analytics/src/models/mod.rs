//! Forecasting models for the daily income series

use crate::data::HistoricalSeries;
use crate::error::{ForecastError, Result};
use serde::Serialize;
use std::fmt::Debug;

/// Forecast result containing predicted values
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    /// Forecasted values
    values: Vec<f64>,
    /// Number of periods forecasted
    horizons: usize,
    /// Prediction intervals (optional)
    intervals: Option<Vec<(f64, f64)>>,
    /// Confidence level the intervals were computed at
    confidence_level: Option<f64>,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, horizons: usize) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        Ok(Self {
            values,
            horizons,
            intervals: None,
            confidence_level: None,
        })
    }

    /// Create a new forecast result with prediction intervals
    pub fn new_with_intervals(
        values: Vec<f64>,
        horizons: usize,
        intervals: Vec<(f64, f64)>,
        confidence_level: f64,
    ) -> Result<Self> {
        if values.len() != intervals.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match intervals length ({})",
                values.len(),
                intervals.len()
            )));
        }

        let mut result = Self::new(values, horizons)?;
        result.intervals = Some(intervals);
        result.confidence_level = Some(confidence_level);
        Ok(result)
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Get the prediction intervals, if available
    pub fn intervals(&self) -> Option<&[(f64, f64)]> {
        self.intervals.as_deref()
    }

    pub fn confidence_level(&self) -> Option<f64> {
        self.confidence_level
    }

    /// Serialize the forecast to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ForecastError::InvalidParameter(format!("Cannot serialize forecast: {e}")))
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizons: usize) -> Result<ForecastResult>;

    /// One-step-ahead in-sample predictions, aligned to the end of the training series
    fn fitted_values(&self) -> &[f64];

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on a daily income series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on the historical series
    fn train(&self, series: &HistoricalSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod holt_winters;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_validation() {
        assert!(ForecastResult::new(vec![1.0, 2.0], 3).is_err());
        assert!(ForecastResult::new_with_intervals(vec![1.0], 1, vec![], 0.95).is_err());
    }

    #[test]
    fn test_to_json() {
        let result =
            ForecastResult::new_with_intervals(vec![10.0], 1, vec![(8.0, 12.0)], 0.9).unwrap();
        let json = result.to_json().unwrap();
        assert!(json.contains("\"values\":[10.0]"));
        assert!(json.contains("\"confidence_level\":0.9"));
    }
}
