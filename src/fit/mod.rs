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

//! # Decomposition of a pair potential into Gaussians
//!
//! The pipeline is
//!
//! 1. sample the spline on a [`RadialGrid`] and correct its hard core, giving a [`PotentialCurve`];
//! 2. compute Boltzmann weights with [`BoltzmannWeighter`];
//! 3. fit the mixture with a [`StagedFitter`] under the [`BoundsPolicy`] constraints.
//!
//! [`decompose`] runs all steps with an injected spline, solver and observer, while
//! [`decompose_knots`] uses the built-in [`KnotSpline`] and [`LevenbergMarquardt`].

use crate::error::{FitError, Result};
use crate::solver::{LeastSquaresSolver, LevenbergMarquardt};
use crate::spline::{KnotSpline, PairSpline};
use tracing::debug;

mod bounds;
mod config;
mod curve;
mod grid;
mod staged;
mod weights;

pub use self::bounds::{BoundsPolicy, BoxConstraints};
pub use self::config::{FitConfig, FitMode};
pub use self::curve::{HardCoreCorrection, PotentialCurve, PotentialCurveBuilder};
pub use self::grid::RadialGrid;
pub use self::staged::{
    weighted_cost, FitResult, StageObserver, StagedFitter, TracingObserver,
};
pub use self::weights::{BoltzmannWeighter, WeightVector};

/// Everything produced by a decomposition run
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub grid: RadialGrid,
    /// Sampled potential after the hard-core correction
    pub curve: PotentialCurve,
    pub weights: WeightVector,
    stages: Vec<FitResult>,
}

impl FitReport {
    /// Results of all stages in the order they were fitted
    pub fn stages(&self) -> &[FitResult] {
        &self.stages
    }

    /// Result of the last stage, i.e. the fitted mixture
    pub fn final_result(&self) -> &FitResult {
        // a report is only built from a non-empty fit
        &self.stages[self.stages.len() - 1]
    }

    /// Stages where the solver stopped without converging
    pub fn non_converged_stages(&self) -> impl Iterator<Item = &FitResult> {
        self.stages.iter().filter(|result| !result.converged())
    }

    /// The final result, or [`FitError::SolverNonConvergence`] for the first stage that did not converge
    pub fn require_converged(&self) -> Result<&FitResult> {
        match self.non_converged_stages().next() {
            Some(result) => Err(FitError::SolverNonConvergence {
                stage: result.stage,
                termination: result.termination,
            }),
            None => Ok(self.final_result()),
        }
    }

    /// Cost of `params` on the weighted problem of this run
    pub fn cost_of(&self, params: &[f64]) -> f64 {
        weighted_cost(params, &self.grid, &self.weights, &self.curve)
    }
}

/// Decompose `spline` into a sum of Gaussians.
///
/// The configuration is validated before anything is sampled or solved.
/// `observer` is notified after every stage.
pub fn decompose<S, L, O>(
    spline: &S,
    cutoff: f64,
    config: &FitConfig,
    solver: &L,
    observer: &mut O,
) -> Result<FitReport>
where
    S: PairSpline + ?Sized,
    L: LeastSquaresSolver + ?Sized,
    O: StageObserver + ?Sized,
{
    config.validate()?;
    let grid = RadialGrid::uniform(cutoff, config.n_samples)?;
    let curve = PotentialCurveBuilder::new(config.hard_core.clone()).build(spline, &grid)?;
    let weights = BoltzmannWeighter::weigh(&curve)?;
    debug!(
        "fitting {} term(s) on {} samples up to r = {}, u_max = {:.4e}",
        config.n_terms,
        grid.len(),
        cutoff,
        curve.max_value()
    );
    let stages = StagedFitter::new(solver, &grid, &curve, &weights, config.bounds)?.fit(
        config.n_terms,
        &config.mode,
        observer,
    )?;
    Ok(FitReport {
        grid,
        curve,
        weights,
        stages,
    })
}

/// Decompose the spline through `knots`, spaced evenly on `[0, cutoff)`.
///
/// Uses [`KnotSpline`], the default [`LevenbergMarquardt`] solver, and logs each stage
/// with [`TracingObserver`].
pub fn decompose_knots(knots: &[f64], cutoff: f64, config: &FitConfig) -> Result<FitReport> {
    config.validate()?;
    let spline = KnotSpline::new(cutoff, knots)?;
    decompose(
        &spline,
        cutoff,
        config,
        &LevenbergMarquardt::default(),
        &mut TracingObserver,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Termination;
    use approx::assert_relative_eq;

    #[test]
    fn test_concrete_single_term() {
        let config = FitConfig::default().with_terms(1).with_samples(100);
        let report = decompose_knots(&[1.0, 0.5, 0.1, 0.0], 5.0, &config).unwrap();
        assert_eq!(report.stages().len(), 1);
        assert_eq!(report.grid.len(), 100);
        let result = report.final_result();
        let (b, k) = (result.params[0], result.params[1]);
        assert!(b >= 0.0 && b <= report.curve.max_value());
        assert!(k >= 0.0);
        assert_relative_eq!(report.cost_of(&result.params), result.cost, max_relative = 1e-10);
    }

    #[test]
    fn test_configuration_errors_fail_fast() {
        let knots = [1.0, 0.5, 0.1, 0.0];
        let is_config_error = |result: Result<FitReport>| {
            matches!(result, Err(FitError::Configuration(_)))
        };
        let config = FitConfig::default();
        assert!(is_config_error(decompose_knots(&[], 5.0, &config)));
        assert!(is_config_error(decompose_knots(&knots, 0.0, &config)));
        assert!(is_config_error(decompose_knots(&knots, -5.0, &config)));
        assert!(is_config_error(decompose_knots(
            &knots,
            5.0,
            &config.clone().with_terms(0)
        )));
        assert!(is_config_error(decompose_knots(
            &knots,
            5.0,
            &config.clone().with_samples(0)
        )));
        let single_shot = config.with_mode(FitMode::SingleShot {
            initial_guess: vec![1.0, 1.0, 0.0],
        });
        assert!(is_config_error(decompose_knots(&knots, 5.0, &single_shot)));
    }

    #[test]
    fn test_require_converged() {
        let result = |stage, termination| FitResult {
            stage,
            initial_guess: vec![1.0, 1.0],
            params: vec![1.0, 1.0],
            cost: 0.0,
            termination,
            evaluations: 1,
        };
        let grid = RadialGrid::uniform(1.0, 2).unwrap();
        let curve = PotentialCurve::new(vec![1.0, 0.0], vec![0.0, 0.0]).unwrap();
        let weights = BoltzmannWeighter::weigh(&curve).unwrap();
        let mut report = FitReport {
            grid,
            curve,
            weights,
            stages: vec![
                result(0, Termination::CostTolerance),
                result(1, Termination::MaxEvaluations),
                result(2, Termination::GradientTolerance),
            ],
        };
        assert_eq!(report.non_converged_stages().count(), 1);
        assert_eq!(
            report.require_converged(),
            Err(FitError::SolverNonConvergence {
                stage: 1,
                termination: Termination::MaxEvaluations
            })
        );
        report.stages.remove(1);
        assert_eq!(report.require_converged().map(|r| r.stage), Ok(2));
    }
}
