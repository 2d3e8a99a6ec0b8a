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

//! # Bounded nonlinear least squares
//!
//! The fitter hands a vector valued residual function, an initial guess and box
//! constraints to a [`LeastSquaresSolver`] and gets back the optimized parameters.
//! The cost convention is $C = \frac{1}{2}\sum_j r_j^2$ throughout.
//!
//! [`LevenbergMarquardt`] is the default solver; tests may inject their own.

use crate::fit::BoxConstraints;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

mod levenberg_marquardt;
pub use levenberg_marquardt::LevenbergMarquardt;

/// Residual function, mapping parameters to a residual vector of fixed length
pub type Residuals<'a> = &'a dyn Fn(&[f64]) -> Vec<f64>;

/// Minimizes $\frac{1}{2}\|r(x)\|^2$ subject to `lower <= x <= upper`.
pub trait LeastSquaresSolver {
    /// Solve from the initial guess `x0`.
    ///
    /// Solvers never fail hard: problems such as an infeasible start or
    /// exhausted evaluations are reported through [`SolverOutcome::termination`].
    fn solve(
        &self,
        residuals: Residuals<'_>,
        x0: &[f64],
        bounds: &BoxConstraints,
    ) -> SolverOutcome;
}

impl<T: LeastSquaresSolver + ?Sized> LeastSquaresSolver for &T {
    fn solve(
        &self,
        residuals: Residuals<'_>,
        x0: &[f64],
        bounds: &BoxConstraints,
    ) -> SolverOutcome {
        (**self).solve(residuals, x0, bounds)
    }
}

/// Why a solver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Termination {
    /// Projected gradient below `gtol`
    GradientTolerance,
    /// Relative cost reduction below `ftol`
    CostTolerance,
    /// Relative step length below `xtol`
    StepTolerance,
    /// Evaluation budget exhausted
    MaxEvaluations,
    /// No damping could produce a downhill step
    DampingOverflow,
    /// The residuals are NaN or infinite at the current parameters
    NonFiniteResidual,
    /// The initial guess lies outside the box; parameters are returned untouched
    InfeasibleStart,
}

impl Termination {
    /// True if the solver stopped on one of its convergence criteria
    pub const fn converged(&self) -> bool {
        matches!(
            self,
            Self::GradientTolerance | Self::CostTolerance | Self::StepTolerance
        )
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::GradientTolerance => "gradient tolerance reached",
            Self::CostTolerance => "cost tolerance reached",
            Self::StepTolerance => "step tolerance reached",
            Self::MaxEvaluations => "maximum number of evaluations exceeded",
            Self::DampingOverflow => "damping overflow, no downhill step found",
            Self::NonFiniteResidual => "non-finite residuals",
            Self::InfeasibleStart => "initial guess violates bounds",
        };
        write!(f, "{message}")
    }
}

/// Result of a single solver invocation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SolverOutcome {
    /// Optimized parameters
    pub params: Vec<f64>,
    /// Half the sum of squared residuals at `params`
    pub cost: f64,
    pub termination: Termination,
    /// Residual evaluations, excluding those spent on the Jacobian
    pub evaluations: usize,
}

impl SolverOutcome {
    pub const fn converged(&self) -> bool {
        self.termination.converged()
    }
}

/// Stopping criteria for [`LevenbergMarquardt`]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SolverConfig {
    /// Relative cost reduction tolerance (default: 1e-8)
    pub ftol: f64,
    /// Relative step tolerance (default: 1e-8)
    pub xtol: f64,
    /// Projected gradient tolerance (default: 1e-8)
    pub gtol: f64,
    /// Maximum residual evaluations (default: 100 × number of parameters)
    pub max_evaluations: Option<usize>,
    /// Initial Marquardt damping (default: 1e-3)
    pub initial_damping: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            max_evaluations: None,
            initial_damping: 1e-3,
        }
    }
}

impl SolverConfig {
    /// Set all three tolerances at once
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.ftol = tolerance;
        self.xtol = tolerance;
        self.gtol = tolerance;
        self
    }

    /// Limit the number of residual evaluations
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Evaluation budget for a problem with `n_params` parameters
    pub fn evaluation_budget(&self, n_params: usize) -> usize {
        self.max_evaluations.unwrap_or(100 * n_params.max(1))
    }
}
