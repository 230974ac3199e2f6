//! Box-constrained minimisation for small parameter vectors
//!
//! Fitting runs in two passes: a deterministic grid search picks a starting
//! point, then a Nelder-Mead simplex refines it. Every candidate point is
//! clamped into the box, so the search never leaves the feasible region.
//! Given the same objective and inputs the result is always identical.

use crate::{MathError, Result};

/// Outcome of a minimisation
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Location of the best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Number of simplex iterations performed (0 for a pure grid search)
    pub iterations: usize,
    /// Whether the stopping tolerance was met before the iteration limit
    pub converged: bool,
}

/// Closed interval applied to every coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    /// Create bounds, rejecting empty or non-finite intervals
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(MathError::InvalidInput(format!(
                "Invalid bounds: lower={lower}, upper={upper}"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// The unit interval `[0, 1]`
    pub fn unit() -> Self {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    fn clamp(&self, point: &mut [f64]) {
        for v in point.iter_mut() {
            *v = v.clamp(self.lower, self.upper);
        }
    }
}

/// Generate `steps` evenly spaced interior points of `bounds`.
///
/// Points sit at the centres of `steps` equal cells, so neither edge is
/// sampled.
pub fn cell_centres(bounds: Bounds, steps: usize) -> Result<Vec<f64>> {
    if steps == 0 {
        return Err(MathError::InvalidInput(
            "Grid steps must be at least 1".to_string(),
        ));
    }
    let width = (bounds.upper - bounds.lower) / steps as f64;
    Ok((0..steps)
        .map(|i| bounds.lower + width * (i as f64 + 0.5))
        .collect())
}

fn finite_or_inf(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        f64::INFINITY
    }
}

/// Evaluate `objective` on the Cartesian product of `axes`.
///
/// Ties keep the first point visited. Non-finite objective values are treated
/// as `+inf`.
pub fn grid_search<F>(objective: F, axes: &[Vec<f64>]) -> Result<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    if axes.is_empty() || axes.iter().any(|a| a.is_empty()) {
        return Err(MathError::InvalidInput(
            "Grid search needs at least one value per axis".to_string(),
        ));
    }

    let mut indices = vec![0usize; axes.len()];
    let mut point: Vec<f64> = axes.iter().map(|a| a[0]).collect();
    let mut best = Minimum {
        point: point.clone(),
        value: f64::INFINITY,
        iterations: 0,
        converged: true,
    };

    loop {
        let value = finite_or_inf(objective(&point));
        if value < best.value {
            best.value = value;
            best.point.copy_from_slice(&point);
        }

        // odometer increment, last axis fastest
        let mut axis = axes.len();
        loop {
            if axis == 0 {
                return Ok(best);
            }
            axis -= 1;
            indices[axis] += 1;
            if indices[axis] < axes[axis].len() {
                point[axis] = axes[axis][indices[axis]];
                break;
            }
            indices[axis] = 0;
            point[axis] = axes[axis][0];
        }
    }
}

/// Nelder-Mead simplex minimiser with coordinate clamping
#[derive(Debug, Clone)]
pub struct NelderMead {
    bounds: Bounds,
    max_iterations: usize,
    tolerance: f64,
    initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            bounds: Bounds::unit(),
            max_iterations: 2_000,
            tolerance: 1e-10,
            initial_step: 0.05,
        }
    }
}

impl NelderMead {
    /// Create a minimiser restricted to `bounds`
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    /// Set the iteration limit
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Set the stopping tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs().max(f64::EPSILON);
        self
    }

    /// Minimise `objective` starting from `start`
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64,
    {
        if start.is_empty() {
            return Err(MathError::InvalidInput(
                "Starting point must not be empty".to_string(),
            ));
        }

        let n = start.len();
        let eval = |p: &[f64]| finite_or_inf(objective(p));

        let mut origin = start.to_vec();
        self.bounds.clamp(&mut origin);
        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((origin.clone(), eval(&origin)));
        for i in 0..n {
            let mut vertex = origin.clone();
            // step inward when the start sits near the upper edge
            if vertex[i] + self.initial_step <= self.bounds.upper {
                vertex[i] += self.initial_step;
            } else {
                vertex[i] -= self.initial_step;
            }
            self.bounds.clamp(&mut vertex);
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            if self.has_converged(&simplex) {
                converged = true;
                break;
            }
            iterations += 1;

            let worst = simplex[n].clone();
            let centroid: Vec<f64> = (0..n)
                .map(|d| simplex[..n].iter().map(|(p, _)| p[d]).sum::<f64>() / n as f64)
                .collect();
            let along = |coef: f64| -> Vec<f64> {
                let mut p: Vec<f64> = centroid
                    .iter()
                    .zip(&worst.0)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect();
                self.bounds.clamp(&mut p);
                p
            };

            let reflected = along(1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < simplex[0].1 {
                let expanded = along(2.0);
                let f_expanded = eval(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let contracted = if f_reflected < worst.1 {
                along(0.5)
            } else {
                along(-0.5)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < f_reflected.min(worst.1) {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            // shrink towards the best vertex
            let best = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                for (v, b) in vertex.0.iter_mut().zip(&best) {
                    *v = b + 0.5 * (*v - b);
                }
                self.bounds.clamp(&mut vertex.0);
                vertex.1 = eval(&vertex.0);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Ok(Minimum {
            point,
            value,
            iterations,
            converged,
        })
    }

    fn has_converged(&self, sorted: &[(Vec<f64>, f64)]) -> bool {
        let best = &sorted[0];
        let worst = &sorted[sorted.len() - 1];
        if !best.1.is_finite() {
            return false;
        }
        if worst.1.is_finite() && worst.1 - best.1 <= self.tolerance * best.1.abs().max(1.0) {
            return true;
        }
        let diameter = sorted
            .iter()
            .skip(1)
            .flat_map(|(p, _)| p.iter().zip(&best.0).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        diameter <= self.tolerance
    }
}
