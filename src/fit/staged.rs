// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! Incremental least-squares fitting of the Gaussian terms.

use super::{BoundsPolicy, FitMode, PotentialCurve, RadialGrid, WeightVector};
use crate::error::{FitError, Result};
use crate::solver::{LeastSquaresSolver, Termination};
use crate::twobody::{evaluate_flat, GaussianMixture};
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of a single fitting stage
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct FitResult {
    /// 0-based stage index; the stage fits `stage + 1` terms in staged mode
    pub stage: usize,
    /// Parameters handed to the solver, `[B0, K0, B1, K1, ...]`
    pub initial_guess: Vec<f64>,
    /// Optimized parameters, `[B0, K0, B1, K1, ...]`
    pub params: Vec<f64>,
    /// Half the sum of squared weighted residuals
    pub cost: f64,
    pub termination: Termination,
    /// Residual evaluations spent by the solver
    pub evaluations: usize,
}

impl FitResult {
    pub const fn converged(&self) -> bool {
        self.termination.converged()
    }

    /// Number of Gaussian terms
    pub fn n_terms(&self) -> usize {
        self.params.len() / 2
    }

    /// Optimized parameters as a mixture
    pub fn mixture(&self) -> GaussianMixture {
        GaussianMixture::from_flat(&self.params)
    }
}

/// Receives each stage's result as soon as it is available
pub trait StageObserver {
    fn on_stage(&mut self, result: &FitResult);
}

impl<F: FnMut(&FitResult)> StageObserver for F {
    fn on_stage(&mut self, result: &FitResult) {
        self(result)
    }
}

/// Logs every stage with `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage(&mut self, result: &FitResult) {
        info!(
            "stage {}: {} term(s), cost = {:.6e}, {} evaluations, {}",
            result.stage,
            result.n_terms(),
            result.cost,
            result.evaluations,
            result.termination
        );
        if !result.converged() {
            warn!(
                "stage {} did not converge ({}); continuing from its parameters",
                result.stage, result.termination
            );
        }
    }
}

/// Boltzmann weighted residuals, $r_j = w_j (u_\mathrm{fit}(r_j) - u(r_j))$
fn weighted_residuals(params: &[f64], radii: &[f64], weights: &[f64], target: &[f64]) -> Vec<f64> {
    evaluate_flat(params, radii)
        .into_iter()
        .zip(weights.iter().zip(target))
        .map(|(u_fit, (w, u))| w * (u_fit - u))
        .collect()
}

/// Cost of `params` on the weighted problem, $\frac{1}{2}\sum_j r_j^2$.
///
/// Uses the same convention as the solver, so evaluating the parameters of a
/// [`FitResult`] reproduces its cost.
pub fn weighted_cost(
    params: &[f64],
    grid: &RadialGrid,
    weights: &WeightVector,
    curve: &PotentialCurve,
) -> f64 {
    0.5 * weighted_residuals(params, grid.radii(), weights.as_slice(), curve.values())
        .iter()
        .map(|r| r * r)
        .sum::<f64>()
}

/// Grows a Gaussian mixture towards a weighted potential curve.
///
/// In staged mode, stage `i` fits `i + 1` terms. Stage 0 starts from
/// `[u_max, 1]` and every later stage from the previous optimum with a
/// zero term appended, so that each stage starts exactly where the previous
/// one ended. Stages that do not converge are recorded and staging continues.
#[derive(Debug)]
pub struct StagedFitter<'a, L: LeastSquaresSolver + ?Sized> {
    solver: &'a L,
    grid: &'a RadialGrid,
    curve: &'a PotentialCurve,
    weights: &'a WeightVector,
    policy: BoundsPolicy,
    u_max: f64,
}

impl<'a, L: LeastSquaresSolver + ?Sized> StagedFitter<'a, L> {
    /// Fails if grid, curve and weights differ in length, or if the curve
    /// maximum leaves no admissible starting point.
    pub fn new(
        solver: &'a L,
        grid: &'a RadialGrid,
        curve: &'a PotentialCurve,
        weights: &'a WeightVector,
        policy: BoundsPolicy,
    ) -> Result<Self> {
        if !(grid.len() == curve.len() && grid.len() == weights.len()) {
            return Err(FitError::config(format!(
                "grid, curve and weights have lengths {}, {} and {}",
                grid.len(),
                curve.len(),
                weights.len()
            )));
        }
        let u_max = curve.max_value();
        if !u_max.is_finite() {
            return Err(FitError::degenerate(format!("curve maximum is {u_max}")));
        }
        Ok(Self {
            solver,
            grid,
            curve,
            weights,
            policy,
            u_max,
        })
    }

    /// Largest value of the target curve
    pub fn u_max(&self) -> f64 {
        self.u_max
    }

    /// Fit `n_terms` Gaussians; returns one [`FitResult`] per solver call.
    ///
    /// Configuration errors are raised before the solver is invoked.
    pub fn fit<O: StageObserver + ?Sized>(
        &self,
        n_terms: usize,
        mode: &FitMode,
        observer: &mut O,
    ) -> Result<Vec<FitResult>> {
        if n_terms == 0 {
            return Err(FitError::config("at least one Gaussian term is required"));
        }
        mode.validate(n_terms)?;
        match mode {
            FitMode::Staged => {
                if self.u_max < 0.0 {
                    return Err(FitError::config(format!(
                        "staged fitting seeds the first amplitude with the curve maximum, \
                         which must be non-negative, got {}",
                        self.u_max
                    )));
                }
                let results = (0..n_terms).fold(
                    Vec::<FitResult>::with_capacity(n_terms),
                    |mut results, stage| {
                        let initial_guess = match results.last() {
                            None => vec![self.u_max, 1.0],
                            Some(previous) => previous
                                .params
                                .iter()
                                .copied()
                                .chain([0.0, 0.0])
                                .collect_vec(),
                        };
                        let result = self.solve_stage(stage, stage + 1, initial_guess);
                        observer.on_stage(&result);
                        results.push(result);
                        results
                    },
                );
                Ok(results)
            }
            FitMode::SingleShot { initial_guess } => {
                if self.policy == BoundsPolicy::CappedRepulsion && self.u_max < 0.0 {
                    return Err(FitError::config(format!(
                        "capped repulsion needs a non-negative curve maximum, got {}",
                        self.u_max
                    )));
                }
                let result = self.solve_stage(0, n_terms, initial_guess.clone());
                observer.on_stage(&result);
                Ok(vec![result])
            }
        }
    }

    fn solve_stage(&self, stage: usize, n_terms: usize, initial_guess: Vec<f64>) -> FitResult {
        let bounds = self.policy.bounds(n_terms, self.u_max);
        let (radii, weights, target) = (
            self.grid.radii(),
            self.weights.as_slice(),
            self.curve.values(),
        );
        let residuals = |x: &[f64]| weighted_residuals(x, radii, weights, target);
        let outcome = self.solver.solve(&residuals, &initial_guess, &bounds);
        FitResult {
            stage,
            initial_guess,
            params: outcome.params,
            cost: outcome.cost,
            termination: outcome.termination,
            evaluations: outcome.evaluations,
        }
    }
}
