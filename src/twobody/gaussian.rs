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

//! Gaussian pair potentials and sums thereof.

use super::IsotropicTwobodyEnergy;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Role of a term in a mixture, given by its index.
///
/// Even indices are repulsive, odd indices attractive. This is a fixed
/// convention: a repulsive core followed by an attractive well, repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum TermRole {
    Repulsive,
    Attractive,
}

impl TermRole {
    /// Role of the term at 0-based `index`
    pub const fn of(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Repulsive
        } else {
            Self::Attractive
        }
    }
}

/// Gaussian potential
///
/// $$ u(r) = B e^{-K r^2} $$
///
/// where $B$ is the amplitude and $K$ the inverse squared width.
///
/// # Examples:
/// ~~~
/// use spline2gauss::twobody::*;
/// let gaussian = Gaussian::new(2.0, 0.5);
/// assert_eq!(gaussian.isotropic_twobody_energy(0.0), 2.0);
/// assert_eq!(gaussian.isotropic_twobody_energy(2.0), 2.0 * f64::exp(-1.0));
/// ~~~
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Deserialize, Serialize),
    serde(deny_unknown_fields)
)]
pub struct Gaussian {
    /// Energy scale, B
    #[cfg_attr(feature = "serde", serde(rename = "B"))]
    pub amplitude: f64,
    /// Inverse squared width, K
    #[cfg_attr(feature = "serde", serde(rename = "K"))]
    pub kappa: f64,
}

impl Gaussian {
    pub const fn new(amplitude: f64, kappa: f64) -> Self {
        Self { amplitude, kappa }
    }

    /// Energy at distance `r` (not squared)
    #[inline(always)]
    pub fn energy(&self, r: f64) -> f64 {
        self.isotropic_twobody_energy(r * r)
    }
}

impl IsotropicTwobodyEnergy for Gaussian {
    #[inline(always)]
    fn isotropic_twobody_energy(&self, distance_squared: f64) -> f64 {
        self.amplitude * f64::exp(-self.kappa * distance_squared)
    }

    /// 𝐹(𝑟) = 2𝐾𝑟 · 𝑢(𝑟)
    #[inline]
    fn isotropic_twobody_force(&self, distance_squared: f64) -> f64 {
        2.0 * self.kappa * distance_squared.sqrt() * self.isotropic_twobody_energy(distance_squared)
    }
}

/// Sum of Gaussian terms, ordered by the stage that introduced them.
///
/// The flat representation used by the fitter is `[B0, K0, B1, K1, ...]`.
///
/// # Examples:
/// ~~~
/// use spline2gauss::twobody::*;
/// let mixture = GaussianMixture::from_flat(&[3.0, 1.0, -1.0, 0.1]);
/// assert_eq!(mixture.len(), 2);
/// assert_eq!(mixture.energy(0.0), 2.0);
/// assert_eq!(mixture.to_flat(), vec![3.0, 1.0, -1.0, 0.1]);
/// ~~~
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct GaussianMixture {
    terms: Vec<Gaussian>,
}

impl GaussianMixture {
    pub fn new(terms: Vec<Gaussian>) -> Self {
        Self { terms }
    }

    /// Build from `[B0, K0, B1, K1, ...]`. A trailing unpaired value is ignored.
    pub fn from_flat(params: &[f64]) -> Self {
        let terms = params
            .chunks_exact(2)
            .map(|pair| Gaussian::new(pair[0], pair[1]))
            .collect();
        Self { terms }
    }

    /// Flatten to `[B0, K0, B1, K1, ...]`
    pub fn to_flat(&self) -> Vec<f64> {
        self.terms
            .iter()
            .flat_map(|g| [g.amplitude, g.kappa])
            .collect()
    }

    pub fn terms(&self) -> &[Gaussian] {
        &self.terms
    }

    /// Number of Gaussian terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterate over terms together with their role
    pub fn roles(&self) -> impl Iterator<Item = (TermRole, &Gaussian)> {
        self.terms
            .iter()
            .enumerate()
            .map(|(i, g)| (TermRole::of(i), g))
    }

    /// Energy at distance `r` (not squared)
    pub fn energy(&self, r: f64) -> f64 {
        self.isotropic_twobody_energy(r * r)
    }

    /// Energy at each of the given radii
    pub fn evaluate(&self, radii: &[f64]) -> Vec<f64> {
        radii.iter().map(|&r| self.energy(r)).collect()
    }
}

impl IsotropicTwobodyEnergy for GaussianMixture {
    #[inline]
    fn isotropic_twobody_energy(&self, distance_squared: f64) -> f64 {
        self.terms
            .iter()
            .map(|g| g.isotropic_twobody_energy(distance_squared))
            .sum()
    }

    #[inline]
    fn isotropic_twobody_force(&self, distance_squared: f64) -> f64 {
        self.terms
            .iter()
            .map(|g| g.isotropic_twobody_force(distance_squared))
            .sum()
    }
}

/// Evaluate `Σ B_i exp(-K_i r²)` from a flat parameter vector without allocating a mixture.
///
/// This is the model function of the fitter and is called once per residual evaluation.
/// The number of terms is `params.len() / 2`.
pub fn evaluate_flat(params: &[f64], radii: &[f64]) -> Vec<f64> {
    radii
        .iter()
        .map(|&r| {
            let r2 = r * r;
            params
                .chunks_exact(2)
                .map(|pair| pair[0] * f64::exp(-pair[1] * r2))
                .sum()
        })
        .collect()
}
