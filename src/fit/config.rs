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

use super::{BoundsPolicy, HardCoreCorrection};
use crate::error::{FitError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the terms are brought into the fit
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum FitMode {
    /// Add one term per stage, starting each stage from the previous optimum
    #[default]
    Staged,
    /// Fit all terms at once from `[B0, K0, B1, K1, ...]`
    SingleShot { initial_guess: Vec<f64> },
}

impl FitMode {
    /// Validate against the number of terms to be fitted
    pub fn validate(&self, n_terms: usize) -> Result<()> {
        match self {
            Self::Staged => Ok(()),
            Self::SingleShot { initial_guess } if initial_guess.len() != 2 * n_terms => {
                Err(FitError::config(format!(
                    "initial guess has {} entries but {} terms need {}",
                    initial_guess.len(),
                    n_terms,
                    2 * n_terms
                )))
            }
            Self::SingleShot { initial_guess } => match initial_guess.iter().find(|x| !x.is_finite()) {
                Some(x) => Err(FitError::config(format!(
                    "initial guess contains non-finite value {x}"
                ))),
                None => Ok(()),
            },
        }
    }
}

/// Settings for a decomposition run
///
/// # Examples
/// ~~~
/// use spline2gauss::fit::{BoundsPolicy, FitConfig, FitMode};
/// let config = FitConfig::default()
///     .with_terms(3)
///     .with_bounds(BoundsPolicy::UnboundedRepulsion);
/// assert_eq!(config.n_samples, 1000);
/// assert!(config.validate().is_ok());
///
/// let config = config.with_mode(FitMode::SingleShot { initial_guess: vec![1.0, 1.0] });
/// assert!(config.validate().is_err());
/// ~~~
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize), serde(default))]
pub struct FitConfig {
    /// Number of Gaussian terms (default: 2)
    pub n_terms: usize,
    /// Number of radial sample points, including `r = 0` and the cutoff (default: 1000)
    pub n_samples: usize,
    pub hard_core: HardCoreCorrection,
    pub bounds: BoundsPolicy,
    pub mode: FitMode,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            n_terms: 2,
            n_samples: 1000,
            hard_core: HardCoreCorrection::default(),
            bounds: BoundsPolicy::default(),
            mode: FitMode::default(),
        }
    }
}

impl FitConfig {
    pub fn with_terms(mut self, n_terms: usize) -> Self {
        self.n_terms = n_terms;
        self
    }

    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_hard_core(mut self, hard_core: HardCoreCorrection) -> Self {
        self.hard_core = hard_core;
        self
    }

    /// Checks that can be made before any sampling or solving
    pub fn validate(&self) -> Result<()> {
        if self.n_terms == 0 {
            return Err(FitError::config("at least one Gaussian term is required"));
        }
        if self.n_samples < 2 {
            return Err(FitError::config(format!(
                "at least two sample points are required, got {}",
                self.n_samples
            )));
        }
        self.hard_core.validate()?;
        self.mode.validate(self.n_terms)
    }
}
