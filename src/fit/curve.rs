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

//! Sampling of the spline and correction of its hard core.
//!
//! Close to contact a spline potential may diverge or oscillate. All samples up to the
//! outermost one above the energy threshold are replaced by a straight line anchored at
//! the first trustworthy sample, matching the tabulated potentials written for
//! LAMMPS-style pair tables.

use super::RadialGrid;
use crate::error::{FitError, Result};
use crate::spline::PairSpline;
use crate::MOLAR_BOLTZMANN_CONSTANT;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Energy threshold for the hard-core correction, `max_pair_energy_kt · kB · T`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct HardCoreCorrection {
    /// Maximum admissible pair energy in units of kT (default: 20)
    pub max_pair_energy_kt: f64,
    /// Boltzmann constant in the energy unit of the spline (default: 1)
    pub boltzmann_constant: f64,
    /// Reference temperature (default: 1)
    pub temperature: f64,
}

impl Default for HardCoreCorrection {
    fn default() -> Self {
        Self {
            max_pair_energy_kt: 20.0,
            boltzmann_constant: 1.0,
            temperature: 1.0,
        }
    }
}

impl HardCoreCorrection {
    /// Threshold for splines in kJ/mol at the given temperature (K)
    pub fn molar(temperature: f64) -> Self {
        Self {
            boltzmann_constant: MOLAR_BOLTZMANN_CONSTANT,
            temperature,
            ..Default::default()
        }
    }

    /// No hard-core correction; the sampled spline is fitted as is
    pub fn disabled() -> Self {
        Self::default().with_max_pair_energy_kt(f64::INFINITY)
    }

    /// False if no energy can exceed the threshold
    pub fn is_enabled(&self) -> bool {
        self.threshold() < f64::INFINITY
    }

    /// Set the maximum admissible energy in units of kT
    pub fn with_max_pair_energy_kt(mut self, max_pair_energy_kt: f64) -> Self {
        self.max_pair_energy_kt = max_pair_energy_kt;
        self
    }

    /// Energies above this value are considered unphysical
    pub fn threshold(&self) -> f64 {
        self.boltzmann_constant * self.temperature * self.max_pair_energy_kt
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let threshold = self.threshold();
        if threshold.is_nan() || threshold == f64::NEG_INFINITY {
            Err(FitError::config(format!(
                "hard-core threshold must be a number or +inf, got {threshold}"
            )))
        } else {
            Ok(())
        }
    }
}

/// Sampled potential and derivative on a [`RadialGrid`]. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialCurve {
    values: Vec<f64>,
    derivatives: Vec<f64>,
    /// First sample not touched by the hard-core correction
    anchor: Option<usize>,
}

impl PotentialCurve {
    /// Curve from raw samples, without any correction
    pub fn new(values: Vec<f64>, derivatives: Vec<f64>) -> Result<Self> {
        if values.len() != derivatives.len() {
            return Err(FitError::config(format!(
                "{} values but {} derivatives",
                values.len(),
                derivatives.len()
            )));
        }
        Ok(Self {
            values,
            derivatives,
            anchor: None,
        })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest energy on the curve
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the sample anchoring the linear hard-core wall, if a correction was applied
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Replace the hard core with a linear wall anchored at the first sample
    /// beyond the outermost one that exceeds `threshold`.
    ///
    /// Flagged samples also take the derivative of the anchor. Does nothing if no
    /// sample exceeds the threshold.
    pub fn correct_hard_core(mut self, radii: &[f64], threshold: f64) -> Result<Self> {
        if radii.len() != self.values.len() {
            return Err(FitError::config(format!(
                "{} radii for {} samples",
                radii.len(),
                self.values.len()
            )));
        }
        let flagged: Vec<usize> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, &u)| u > threshold)
            .map(|(j, _)| j)
            .collect();
        let Some(&last) = flagged.last() else {
            return Ok(self);
        };
        let anchor = last + 1;
        if anchor >= self.values.len() {
            return Err(FitError::degenerate(format!(
                "all samples up to the cutoff exceed the hard-core threshold {threshold}"
            )));
        }
        let (r_anchor, u_anchor, du_anchor) =
            (radii[anchor], self.values[anchor], self.derivatives[anchor]);
        for (u, r) in self.values[..anchor].iter_mut().zip(radii) {
            *u = (r_anchor - r) * -du_anchor + u_anchor;
        }
        for j in flagged {
            self.derivatives[j] = du_anchor;
        }
        debug!(
            "hard core corrected below r = {:.4} (index {}), slope {:.4e}",
            r_anchor, anchor, du_anchor
        );
        self.anchor = Some(anchor);
        Ok(self)
    }
}

/// Samples a [`PairSpline`] on a grid and applies the hard-core correction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PotentialCurveBuilder {
    correction: HardCoreCorrection,
}

impl PotentialCurveBuilder {
    pub fn new(correction: HardCoreCorrection) -> Self {
        Self { correction }
    }

    pub fn correction(&self) -> &HardCoreCorrection {
        &self.correction
    }

    /// Evaluate value and derivative at every grid point, then correct the hard core.
    pub fn build<S: PairSpline + ?Sized>(
        &self,
        spline: &S,
        grid: &RadialGrid,
    ) -> Result<PotentialCurve> {
        self.correction.validate()?;
        let values = grid.radii().iter().map(|&r| spline.value(r)).collect();
        let derivatives = grid.radii().iter().map(|&r| spline.derivative(r)).collect();
        let curve = PotentialCurve::new(values, derivatives)?;
        if !self.correction.is_enabled() {
            debug!("hard-core correction disabled");
            return Ok(curve);
        }
        curve.correct_hard_core(grid.radii(), self.correction.threshold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spline::KnotSpline;
    use approx::assert_relative_eq;

    /// Steep wall, u = 100 (1 - r) for r < 1, plus a shallow well
    #[derive(Debug)]
    struct Wall;

    impl PairSpline for Wall {
        fn value(&self, r: f64) -> f64 {
            if r < 1.0 {
                100.0 * (1.0 - r) + 10.0 / (r + 0.01)
            } else {
                -0.5 * f64::exp(-(r - 1.5).powi(2))
            }
        }
        fn derivative(&self, r: f64) -> f64 {
            if r < 1.0 {
                -100.0 - 10.0 / (r + 0.01).powi(2)
            } else {
                (r - 1.5) * f64::exp(-(r - 1.5).powi(2))
            }
        }
    }

    #[test]
    fn test_no_correction_below_threshold() {
        let spline = KnotSpline::new(5.0, &[1.0, 0.5, 0.1, 0.0]).unwrap();
        let grid = RadialGrid::uniform(5.0, 100).unwrap();
        let curve = PotentialCurveBuilder::default().build(&spline, &grid).unwrap();
        assert_eq!(curve.anchor(), None);
        for (j, &r) in grid.radii().iter().enumerate() {
            assert_eq!(curve.values()[j], spline.value(r));
            assert_eq!(curve.derivatives()[j], spline.derivative(r));
        }
        assert_eq!(curve.max_value(), 1.0);
    }

    #[test]
    fn test_linear_wall_below_anchor() {
        let grid = RadialGrid::uniform(3.0, 301).unwrap();
        let curve = PotentialCurveBuilder::default().build(&Wall, &grid).unwrap();
        let anchor = curve.anchor().unwrap();
        let r = grid.radii();

        // outermost flagged sample is just inside the anchor
        assert!(Wall.value(r[anchor - 1]) > 20.0);
        assert!(Wall.value(r[anchor]) <= 20.0);

        let slope = -Wall.derivative(r[anchor]);
        for j in 0..anchor {
            let expected = (r[anchor] - r[j]) * slope + curve.values()[anchor];
            assert_relative_eq!(curve.values()[j], expected, epsilon = 1e-12);
            assert_eq!(curve.derivatives()[j], Wall.derivative(r[anchor]));
        }
        // untouched beyond the anchor
        for j in anchor..grid.len() {
            assert_eq!(curve.values()[j], Wall.value(r[j]));
            assert_eq!(curve.derivatives()[j], Wall.derivative(r[j]));
        }
        // the wall is continuous with the anchor value
        assert_relative_eq!(
            curve.values()[anchor - 1] - curve.values()[anchor],
            slope * (r[anchor] - r[anchor - 1]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_only_flagged_derivatives_are_replaced() {
        let radii = [0.0, 1.0, 2.0, 3.0, 4.0];
        let values = vec![50.0, 5.0, 30.0, 1.0, 0.0];
        let derivatives = vec![-9.0, -8.0, -7.0, -2.0, 0.0];
        let curve = PotentialCurve::new(values, derivatives)
            .unwrap()
            .correct_hard_core(&radii, 20.0)
            .unwrap();
        assert_eq!(curve.anchor(), Some(3));
        // u = (3 - r) * 2 + 1
        assert_eq!(curve.values(), &[7.0, 5.0, 3.0, 1.0, 0.0]);
        // index 1 was below the threshold and keeps its derivative
        assert_eq!(curve.derivatives(), &[-2.0, -8.0, -2.0, -2.0, 0.0]);
    }

    #[test]
    fn test_no_anchor_is_degenerate() {
        let radii = [0.0, 1.0, 2.0];
        let curve = PotentialCurve::new(vec![50.0, 40.0, 30.0], vec![0.0; 3]).unwrap();
        assert!(matches!(
            curve.correct_hard_core(&radii, 20.0),
            Err(FitError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn test_radii_length_mismatch() {
        let curve = PotentialCurve::new(vec![50.0, 5.0, 1.0], vec![0.0; 3]).unwrap();
        for radii in [&[0.0, 1.0][..], &[0.0, 1.0, 2.0, 3.0][..]] {
            assert!(matches!(
                curve.clone().correct_hard_core(radii, 20.0),
                Err(FitError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_disabled_correction_keeps_raw_samples() {
        let grid = RadialGrid::uniform(3.0, 301).unwrap();
        let correction = HardCoreCorrection::disabled();
        assert!(!correction.is_enabled());
        assert!(correction.validate().is_ok());
        let curve = PotentialCurveBuilder::new(correction)
            .build(&Wall, &grid)
            .unwrap();
        assert_eq!(curve.anchor(), None);
        for (j, &r) in grid.radii().iter().enumerate() {
            assert_eq!(curve.values()[j], Wall.value(r));
            assert_eq!(curve.derivatives()[j], Wall.derivative(r));
        }
        assert!(curve.max_value() > 1000.0);
        assert!(HardCoreCorrection::default().is_enabled());
    }

    #[test]
    fn test_nan_threshold_is_rejected() {
        let correction = HardCoreCorrection::default().with_max_pair_energy_kt(f64::NAN);
        assert!(matches!(
            correction.validate(),
            Err(FitError::Configuration(_))
        ));
    }

    #[test]
    fn test_molar_threshold() {
        let correction = HardCoreCorrection::molar(300.0);
        assert_relative_eq!(correction.threshold(), 20.0 * 0.0083144626 * 300.0, epsilon = 1e-6);
        assert_eq!(HardCoreCorrection::default().threshold(), 20.0);
    }
}
