//! Seasonal Holt-Winters model with additive trend and additive seasonality

use crate::data::HistoricalSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use sales_math::{AdditiveHoltWinters, ForecastAccuracy, SmoothingParams};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Additive Holt-Winters model with weights estimated from the data
#[derive(Debug, Clone)]
pub struct SeasonalHoltWinters {
    /// Name of the model
    name: String,
    /// Observations per seasonal cycle
    period: usize,
    /// Coverage of the prediction intervals
    confidence_level: f64,
}

/// Trained seasonal Holt-Winters model
#[derive(Debug, Clone)]
pub struct TrainedSeasonalHoltWinters {
    name: String,
    model: AdditiveHoltWinters,
    accuracy: Option<ForecastAccuracy>,
    confidence_level: f64,
}

/// Fitted components and in-sample quality of a trained model
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub params: SmoothingParams,
    pub level: f64,
    pub trend: f64,
    /// Seasonal offsets, first entry for the first forecast day
    pub seasonal: Vec<f64>,
    pub sse: f64,
    pub accuracy: Option<ForecastAccuracy>,
    pub observations: usize,
    pub converged: bool,
}

impl SeasonalHoltWinters {
    /// Create a model with the given seasonal period and interval coverage
    pub fn new(period: usize, confidence_level: f64) -> Result<Self> {
        if period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonal period must be at least 2, got {period}"
            )));
        }
        if !(confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Confidence level must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Holt-Winters (additive, period={period})"),
            period,
            confidence_level,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl ForecastModel for SeasonalHoltWinters {
    type Trained = TrainedSeasonalHoltWinters;

    fn train(&self, series: &HistoricalSeries) -> Result<Self::Trained> {
        let model = AdditiveHoltWinters::fit(series.values(), self.period)?;

        let observed = &series.values()[self.period..];
        let accuracy = ForecastAccuracy::between(observed, model.fitted_values()).ok();

        Ok(TrainedSeasonalHoltWinters {
            name: self.name.clone(),
            model,
            accuracy,
            confidence_level: self.confidence_level,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSeasonalHoltWinters {
    /// Fitted components for reporting
    pub fn summary(&self) -> ModelSummary {
        let period = self.model.period();
        let next = self.model.observations();
        // rotate so the offsets line up with forecast days 1..=period
        let seasonal = (0..period)
            .map(|h| self.model.seasonal()[(next + h) % period])
            .collect();

        ModelSummary {
            params: self.model.params(),
            level: self.model.level(),
            trend: self.model.trend(),
            seasonal,
            sse: self.model.sse(),
            accuracy: self.accuracy,
            observations: self.model.observations(),
            converged: self.model.converged(),
        }
    }

    pub fn inner(&self) -> &AdditiveHoltWinters {
        &self.model
    }

    fn z_score(&self) -> Result<f64> {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ModelFit(format!("Cannot build normal distribution: {e}")))?;
        Ok(normal.inverse_cdf(1.0 - (1.0 - self.confidence_level) / 2.0))
    }
}

impl TrainedForecastModel for TrainedSeasonalHoltWinters {
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        let values = self.model.forecast(horizons);
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(format!(
                "Forecast step {} is not finite",
                pos + 1
            )));
        }

        let sigma = self.model.residual_variance().sqrt();
        let z = self.z_score()?;
        let intervals = values
            .iter()
            .zip(self.model.forecast_variance_multipliers(horizons))
            .map(|(v, m)| {
                let margin = z * sigma * m.sqrt();
                (v - margin, v + margin)
            })
            .collect();

        ForecastResult::new_with_intervals(values, horizons, intervals, self.confidence_level)
    }

    fn fitted_values(&self) -> &[f64] {
        self.model.fitted_values()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
