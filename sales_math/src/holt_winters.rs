//! Additive Holt-Winters (triple exponential smoothing)
//!
//! Each observation is modelled as `level + trend + seasonal offset`:
//!
//! ```text
//! level_t    = alpha * (y_t - season_{t-m}) + (1 - alpha) * (level_{t-1} + trend_{t-1})
//! trend_t    = beta  * (level_t - level_{t-1}) + (1 - beta) * trend_{t-1}
//! season_t   = gamma * (y_t - level_t)         + (1 - gamma) * season_{t-m}
//! forecast_h = level_n + h * trend_n + season_{n+h-m}
//! ```
//!
//! Initial components come from the first two seasonal cycles: the trend is the
//! difference of their means per step, and the first cycle is de-trended
//! before its deviations become the seasonal offsets. The smoothing
//! weights are chosen by minimising the sum of squared one-step-ahead errors
//! over `[0, 1]^3`.

use crate::optimize::{cell_centres, grid_search, Bounds, NelderMead};
use crate::{mean, MathError, Result};
use serde::{Deserialize, Serialize};

/// Relative spread below which a series counts as constant
const FLAT_TOLERANCE: f64 = 1e-12;

/// Grid resolution per smoothing weight for the starting point search
const GRID_STEPS: usize = 10;

/// Smoothing weights of an additive Holt-Winters model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Level weight
    pub alpha: f64,
    /// Trend weight
    pub beta: f64,
    /// Seasonal weight
    pub gamma: f64,
}

impl SmoothingParams {
    /// Create smoothing weights, each of which must lie in `[0, 1]`
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Result<Self> {
        for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MathError::InvalidInput(format!(
                    "{name} must be between 0 and 1 (inclusive), got {value}"
                )));
            }
        }
        Ok(Self { alpha, beta, gamma })
    }

    fn from_point(point: &[f64]) -> Self {
        Self {
            alpha: point[0],
            beta: point[1],
            gamma: point[2],
        }
    }
}

/// Components after running the recursion over a series
#[derive(Debug, Clone)]
struct Smoothed {
    level: f64,
    trend: f64,
    seasonal: Vec<f64>,
    fitted: Vec<f64>,
    sse: f64,
}

/// Fitted additive Holt-Winters model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditiveHoltWinters {
    period: usize,
    params: SmoothingParams,
    level: f64,
    trend: f64,
    /// Seasonal offsets indexed by observation position modulo `period`
    seasonal: Vec<f64>,
    /// One-step-ahead fitted values for observations `period..n`
    fitted: Vec<f64>,
    sse: f64,
    observations: usize,
    converged: bool,
}

impl AdditiveHoltWinters {
    /// Fit the model, estimating the smoothing weights by least squares.
    ///
    /// Requires at least two full seasonal cycles of finite, non-constant
    /// observations.
    pub fn fit(data: &[f64], period: usize) -> Result<Self> {
        validate(data, period)?;

        let objective = |p: &[f64]| run(data, period, SmoothingParams::from_point(p)).sse;

        let axis = cell_centres(Bounds::unit(), GRID_STEPS)?;
        let start = grid_search(objective, &[axis.clone(), axis.clone(), axis])?;
        let refined = NelderMead::new(Bounds::unit()).minimize(objective, &start.point)?;

        let best = if refined.value <= start.value {
            refined
        } else {
            start
        };
        if !best.value.is_finite() {
            return Err(MathError::CalculationError(
                "Holt-Winters optimisation did not reach a finite squared error".to_string(),
            ));
        }

        let params = SmoothingParams::from_point(&best.point);
        Ok(Self::from_smoothed(
            period,
            params,
            run(data, period, params),
            data.len(),
            best.converged,
        ))
    }

    /// Fit the model with fixed smoothing weights
    pub fn fit_with_params(data: &[f64], period: usize, params: SmoothingParams) -> Result<Self> {
        validate(data, period)?;
        let smoothed = run(data, period, params);
        if !smoothed.sse.is_finite() {
            return Err(MathError::CalculationError(
                "Holt-Winters recursion produced a non-finite squared error".to_string(),
            ));
        }
        Ok(Self::from_smoothed(
            period,
            params,
            smoothed,
            data.len(),
            true,
        ))
    }

    fn from_smoothed(
        period: usize,
        params: SmoothingParams,
        smoothed: Smoothed,
        observations: usize,
        converged: bool,
    ) -> Self {
        Self {
            period,
            params,
            level: smoothed.level,
            trend: smoothed.trend,
            seasonal: smoothed.seasonal,
            fitted: smoothed.fitted,
            sse: smoothed.sse,
            observations,
            converged,
        }
    }

    /// Project the next `horizon` values
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (1..=horizon)
            .map(|h| {
                let season = self.seasonal[(self.observations + h - 1) % self.period];
                self.level + h as f64 * self.trend + season
            })
            .collect()
    }

    /// Multipliers of the one-step residual variance for each horizon step.
    ///
    /// Step `h` gets `1 + sum_{j=1}^{h-1} (alpha * (1 + j * beta) + gamma * [j mod m == 0])^2`.
    pub fn forecast_variance_multipliers(&self, horizon: usize) -> Vec<f64> {
        let SmoothingParams { alpha, beta, gamma } = self.params;
        let mut multipliers = Vec::with_capacity(horizon);
        let mut acc = 1.0;
        for h in 1..=horizon {
            multipliers.push(acc);
            let j = h as f64;
            let seasonal = if h % self.period == 0 { gamma } else { 0.0 };
            acc += (alpha * (1.0 + j * beta) + seasonal).powi(2);
        }
        multipliers
    }

    /// Mean squared one-step-ahead error
    pub fn residual_variance(&self) -> f64 {
        if self.fitted.is_empty() {
            0.0
        } else {
            self.sse / self.fitted.len() as f64
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn params(&self) -> SmoothingParams {
        self.params
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn trend(&self) -> f64 {
        self.trend
    }

    pub fn seasonal(&self) -> &[f64] {
        &self.seasonal
    }

    /// One-step-ahead fitted values, aligned with observations `period..n`
    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    /// In-sample sum of squared one-step-ahead errors
    pub fn sse(&self) -> f64 {
        self.sse
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Whether the optimiser met its tolerance (always true for fixed weights)
    pub fn converged(&self) -> bool {
        self.converged
    }
}

fn validate(data: &[f64], period: usize) -> Result<()> {
    if period < 2 {
        return Err(MathError::InvalidInput(format!(
            "Seasonal period must be at least 2, got {period}"
        )));
    }
    let required = 2 * period;
    if data.len() < required {
        return Err(MathError::InsufficientData(format!(
            "Need at least {required} observations (two seasonal cycles of {period}), got {}",
            data.len()
        )));
    }
    if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(format!(
            "Observation {pos} is not finite"
        )));
    }

    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = min.abs().max(max.abs()).max(1.0);
    if max - min <= FLAT_TOLERANCE * scale {
        return Err(MathError::DegenerateSeries(format!(
            "Series is constant at {min}; seasonal components cannot be estimated"
        )));
    }
    Ok(())
}

fn run(data: &[f64], period: usize, params: SmoothingParams) -> Smoothed {
    let SmoothingParams { alpha, beta, gamma } = params;

    let first = mean(&data[..period]);
    let second = mean(&data[period..2 * period]);
    let mut trend = (second - first) / period as f64;
    // first-cycle mean sits at its midpoint; the state is anchored at its end
    let centre = (period as f64 - 1.0) / 2.0;
    let mut level = first + centre * trend;
    let mut seasonal: Vec<f64> = data[..period]
        .iter()
        .enumerate()
        .map(|(i, v)| v - (first + (i as f64 - centre) * trend))
        .collect();

    let mut fitted = Vec::with_capacity(data.len() - period);
    let mut sse = 0.0;

    for (t, &value) in data.iter().enumerate().skip(period) {
        let idx = t % period;
        let prev_level = level;
        let prev_season = seasonal[idx];

        let prediction = level + trend + prev_season;
        fitted.push(prediction);
        sse += (value - prediction).powi(2);

        level = alpha * (value - prev_season) + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        seasonal[idx] = gamma * (value - level) + (1.0 - gamma) * prev_season;
    }

    Smoothed {
        level,
        trend,
        seasonal,
        fitted,
        sse,
    }
}
