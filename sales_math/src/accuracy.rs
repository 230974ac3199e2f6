//! Accuracy metrics comparing fitted or forecast values with observations

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Forecast accuracy metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, over non-zero observations only
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

impl ForecastAccuracy {
    /// Compare `predicted` against `actual`
    pub fn between(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() || actual.is_empty() {
            return Err(MathError::InvalidInput(format!(
                "Actual ({}) and predicted ({}) values must have the same non-zero length",
                actual.len(),
                predicted.len()
            )));
        }

        let n = actual.len() as f64;
        let errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

        let (pct_sum, pct_count) = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| **a != 0.0)
            .fold((0.0, 0usize), |(sum, count), (a, e)| {
                (sum + e.abs() / a.abs() * 100.0, count + 1)
            });
        let mape = if pct_count > 0 {
            pct_sum / pct_count as f64
        } else {
            0.0
        };

        let smape = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| {
                let denom = a.abs() + p.abs();
                if denom == 0.0 {
                    0.0
                } else {
                    200.0 * (a - p).abs() / denom
                }
            })
            .sum::<f64>()
            / n;

        Ok(Self {
            mae,
            mse,
            rmse: mse.sqrt(),
            mape,
            smape,
        })
    }
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE={:.4} RMSE={:.4} MAPE={:.2}% sMAPE={:.2}%",
            self.mae, self.rmse, self.mape, self.smape
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_metrics() {
        let acc = ForecastAccuracy::between(&[100.0, 200.0], &[110.0, 190.0]).unwrap();
        assert_relative_eq!(acc.mae, 10.0);
        assert_relative_eq!(acc.mse, 100.0);
        assert_relative_eq!(acc.rmse, 10.0);
        assert_relative_eq!(acc.mape, 7.5);
    }

    #[test]
    fn test_zero_actuals_skip_percentage() {
        let acc = ForecastAccuracy::between(&[0.0, 50.0], &[5.0, 50.0]).unwrap();
        assert_relative_eq!(acc.mape, 0.0);
        assert_relative_eq!(acc.smape, 100.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ForecastAccuracy::between(&[1.0], &[1.0, 2.0]).is_err());
        assert!(ForecastAccuracy::between(&[], &[]).is_err());
    }
}
