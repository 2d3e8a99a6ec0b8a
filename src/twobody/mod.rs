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

//! ## Twobody interactions
//!
//! Isotropic pair potentials: the Gaussian terms produced by the fit,
//! and the mixtures they form.

use std::fmt::Debug;

mod gaussian;
pub use self::gaussian::{evaluate_flat, Gaussian, GaussianMixture, TermRole};

/// Potential energy between a pair of isotropic particles, 𝑈(𝑟)
pub trait IsotropicTwobodyEnergy: Debug {
    /// Interaction energy between a pair of isotropic particles.
    fn isotropic_twobody_energy(&self, distance_squared: f64) -> f64;

    /// Force magnitude due to an isotropic interaction potential, 𝐹(𝑟) = -∇𝑈(𝑟)
    ///
    /// The default implementation uses a central difference in 𝑟 to calculate the force
    /// and should be overridden with the exact analytical expression for better speed
    /// and accuracy.
    fn isotropic_twobody_force(&self, distance_squared: f64) -> f64 {
        const EPS: f64 = 1e-6;
        let r = distance_squared.sqrt();
        let delta_u = self.isotropic_twobody_energy((r + EPS).powi(2))
            - self.isotropic_twobody_energy((r - EPS).powi(2));
        -delta_u / (2.0 * EPS)
    }
}

#[test]
pub fn test_default_force() {
    use approx::assert_relative_eq;
    #[derive(Debug)]
    struct Harmonic;
    impl IsotropicTwobodyEnergy for Harmonic {
        fn isotropic_twobody_energy(&self, distance_squared: f64) -> f64 {
            0.5 * distance_squared
        }
    }
    // u = r²/2 so F = -r
    assert_relative_eq!(
        Harmonic.isotropic_twobody_force(1.5 * 1.5),
        -1.5,
        epsilon = 1e-6
    );
}
