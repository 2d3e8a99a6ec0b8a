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

//! # Spline2gauss
//!
//! Decomposes a splined pair potential, $u(r)$, into a sum of Gaussians,
//! $$ u(r) \approx \sum_i B_i e^{-K_i r^2}, $$
//! for simulation packages that only support Gaussian pair interactions.
//!
//! The fit minimizes Boltzmann weighted residuals, $w(r) \propto e^{-u(r)}$,
//! with even terms constrained to be repulsive and odd terms attractive.
//! By default the mixture is grown one term at a time, each stage starting
//! from the optimum of the previous one.
//!
//! ## Examples
//! ~~~
//! use spline2gauss::fit::{decompose_knots, FitConfig};
//! let knots = [1.0, 0.5, 0.1, 0.0];
//! let config = FitConfig::default().with_terms(1).with_samples(100);
//! let report = decompose_knots(&knots, 5.0, &config).unwrap();
//! let params = &report.final_result().params;
//! assert_eq!(params.len(), 2);
//! assert!(params[0] >= 0.0 && params[1] >= 0.0);
//! ~~~

#[cfg(test)]
extern crate approx;

pub mod error;
pub mod fit;
pub mod solver;
pub mod spline;
pub mod twobody;

pub use error::{FitError, Result};

use physical_constants::MOLAR_GAS_CONSTANT;

/// Molar Boltzmann constant, i.e. the gas constant, in kJ/(mol K).
///
/// Use as `kB` when the spline energies are in kJ/mol rather than in units of kT.
///
/// Examples:
/// ```
/// use spline2gauss::MOLAR_BOLTZMANN_CONSTANT;
/// let kt = MOLAR_BOLTZMANN_CONSTANT * 298.15;
/// assert!((kt - 2.4790).abs() < 1e-3); // kJ/mol
/// ```
pub const MOLAR_BOLTZMANN_CONSTANT: f64 = MOLAR_GAS_CONSTANT * 1e-3;

/// Defines a cutoff distance
pub trait Cutoff {
    /// Squared cutoff distance
    fn cutoff_squared(&self) -> f64 {
        self.cutoff().powi(2)
    }

    /// Cutoff distance
    fn cutoff(&self) -> f64;
}
