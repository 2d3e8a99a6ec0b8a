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

//! Errors raised while decomposing a potential.

use crate::solver::Termination;
use thiserror::Error;

/// Failure modes of a fitting run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Invalid input, detected before the solver is invoked.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The weighted problem is ill-posed, e.g. the potential is unbounded
    /// or all Boltzmann factors underflow.
    #[error("numerically degenerate problem: {0}")]
    NumericalDegeneracy(String),

    /// A stage did not converge. Only raised on request, see
    /// [`FitReport::require_converged`](crate::fit::FitReport::require_converged).
    #[error("solver did not converge in stage {stage} ({termination})")]
    SolverNonConvergence { stage: usize, termination: Termination },
}

impl FitError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn degenerate(message: impl Into<String>) -> Self {
        Self::NumericalDegeneracy(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FitError>;
