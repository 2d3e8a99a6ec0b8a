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

use super::PotentialCurve;
use crate::error::{FitError, Result};
use tracing::debug;

/// Normalized Boltzmann weights, one per sample.
///
/// $$ w_j = \frac{e^{-u_j}}{\sum_k e^{-u_k}} $$
///
/// The temperature is absorbed in the energy unit of the curve.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    weights: Vec<f64>,
}

impl WeightVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Turns a [`PotentialCurve`] into a [`WeightVector`]
pub struct BoltzmannWeighter;

impl BoltzmannWeighter {
    /// Boltzmann weights of the curve.
    ///
    /// Factors are evaluated relative to the lowest energy, which leaves the normalized
    /// weights unchanged. Fails with [`FitError::NumericalDegeneracy`] if the curve holds
    /// non-finite energies, or if every plain Boltzmann factor, $e^{-u_j}$, underflows.
    ///
    /// # Examples
    /// ~~~
    /// use spline2gauss::fit::{BoltzmannWeighter, PotentialCurve};
    /// let curve = PotentialCurve::new(vec![0.0, 1.0, 2.0], vec![0.0; 3]).unwrap();
    /// let weights = BoltzmannWeighter::weigh(&curve).unwrap();
    /// let sum: f64 = weights.as_slice().iter().sum();
    /// assert!((sum - 1.0).abs() < 1e-15);
    /// ~~~
    pub fn weigh(curve: &PotentialCurve) -> Result<WeightVector> {
        let values = curve.values();
        if values.is_empty() {
            return Err(FitError::config("cannot weigh an empty curve"));
        }
        if let Some((j, u)) = values.iter().enumerate().find(|(_, u)| !u.is_finite()) {
            return Err(FitError::degenerate(format!(
                "non-finite energy {u} at sample {j}"
            )));
        }
        let u_min = values.iter().copied().fold(f64::INFINITY, f64::min);
        // e^{-u_min} < smallest normal f64, i.e. all factors vanish
        if -u_min < f64::MIN_POSITIVE.ln() {
            return Err(FitError::degenerate(format!(
                "all Boltzmann factors underflow, minimum energy is {u_min}"
            )));
        }
        let factors: Vec<f64> = values.iter().map(|u| f64::exp(u_min - u)).collect();
        let partition: f64 = factors.iter().sum();
        if !(partition.is_finite() && partition > 0.0) {
            return Err(FitError::degenerate(format!(
                "invalid Boltzmann normalization {partition}"
            )));
        }
        let weights: Vec<f64> = factors.into_iter().map(|f| f / partition).collect();
        debug!(
            "Boltzmann weights: {} samples, partition function {:.6e}",
            weights.len(),
            partition * f64::exp(-u_min)
        );
        Ok(WeightVector { weights })
    }
}
