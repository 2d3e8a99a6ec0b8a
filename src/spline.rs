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

//! Splined pair potentials defined by knot values
//!
//! The fitter only needs the potential and its first derivative as a function of
//! distance, expressed by the [`PairSpline`] trait. [`KnotSpline`] is a cubic Hermite
//! spline through equidistant knots that vanishes smoothly at the cutoff.
//!
//! # Example
//!
//! ```
//! use spline2gauss::spline::{KnotSpline, PairSpline};
//! let spline = KnotSpline::new(5.0, &[1.0, 0.5, 0.1, 0.0]).unwrap();
//! assert_eq!(spline.value(0.0), 1.0);
//! assert!((spline.value(1.25) - 0.5).abs() < 1e-12);
//! assert_eq!(spline.value(5.0), 0.0);
//! ```

use crate::error::{FitError, Result};
use crate::twobody::IsotropicTwobodyEnergy;
use crate::Cutoff;
use std::fmt::{self, Debug};

/// Radial potential with a first derivative, 𝑈(𝑟) and d𝑈/d𝑟.
///
/// Implementations must be deterministic and defined on `[0, cutoff]`.
pub trait PairSpline {
    /// Potential energy at distance `r`
    fn value(&self, r: f64) -> f64;
    /// First derivative, d𝑈/d𝑟, at distance `r`
    fn derivative(&self, r: f64) -> f64;
}

/// Cubic polynomial for one knot interval.
///
/// For ε ∈ [0, 1), the polynomial is:
/// ```text
/// U(ε) = c[0] + c[1]·ε + c[2]·ε² + c[3]·ε³
/// ```
#[derive(Clone, Copy, Default, PartialEq)]
struct IntervalCoeffs([f64; 4]);

impl Debug for IntervalCoeffs {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "IntervalCoeffs {:?}", self.0)
    }
}

/// Cubic Hermite spline through equidistant knots.
///
/// With `m` knots the nodes are placed at $r_k = k\\,r_c/m$ for $k = 0 \ldots m-1$,
/// and an implicit node with zero energy and zero slope sits at the cutoff, $r_c$.
/// Tangents are central differences (one-sided at $r = 0$), giving a C¹ curve that
/// passes exactly through every knot. Beyond the cutoff the energy is zero.
#[derive(Clone, PartialEq)]
pub struct KnotSpline {
    coeffs: Vec<IntervalCoeffs>,
    knots: Vec<f64>,
    cutoff: f64,
    /// Node spacing, Δr
    delta: f64,
    inv_delta: f64,
}

impl KnotSpline {
    /// Create from a cutoff distance and knot energies.
    ///
    /// Fails if `knots` is empty or the cutoff is not finite and positive.
    pub fn new(cutoff: f64, knots: &[f64]) -> Result<Self> {
        if knots.is_empty() {
            return Err(FitError::config("knot sequence is empty"));
        }
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(FitError::config(format!(
                "cutoff must be finite and positive, got {cutoff}"
            )));
        }
        if let Some(bad) = knots.iter().find(|k| !k.is_finite()) {
            return Err(FitError::config(format!("non-finite knot value {bad}")));
        }
        let delta = cutoff / knots.len() as f64;
        Ok(Self {
            coeffs: Self::compute_cubic_hermite_coeffs(knots, delta),
            knots: knots.to_vec(),
            cutoff,
            delta,
            inv_delta: delta.recip(),
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Distances of the knots, $r_k = k\\,r_c/m$
    pub fn knot_positions(&self) -> Vec<f64> {
        (0..self.knots.len())
            .map(|k| k as f64 * self.delta)
            .collect()
    }

    /// For each interval, fit a cubic polynomial in ε = (r - r_i) / Δr matching
    /// energy and slope at both ends.
    fn compute_cubic_hermite_coeffs(knots: &[f64], delta: f64) -> Vec<IntervalCoeffs> {
        let m = knots.len();
        // node energies including the zero at the cutoff
        let u = |k: usize| if k < m { knots[k] } else { 0.0 };
        // dU/dr at node k
        let slope = |k: usize| match k {
            0 => (u(1) - u(0)) / delta,
            k if k == m => 0.0,
            k => (u(k + 1) - u(k - 1)) / (2.0 * delta),
        };

        (0..m)
            .map(|i| {
                let (u_i, u_i1) = (u(i), u(i + 1));
                let (dudr_i, dudr_i1) = (slope(i), slope(i + 1));
                let a0 = u_i;
                let a1 = delta * dudr_i;
                let a2 = 3.0 * (u_i1 - u_i) - delta * (2.0 * dudr_i + dudr_i1);
                let a3 = 2.0 * (u_i - u_i1) + delta * (dudr_i + dudr_i1);
                IntervalCoeffs([a0, a1, a2, a3])
            })
            .collect()
    }

    /// Interval index and fractional position. Negative distances are mirrored.
    #[inline]
    fn locate(&self, r: f64) -> (usize, f64) {
        let t = r.abs() * self.inv_delta;
        let i = (t as usize).min(self.coeffs.len() - 1);
        (i, t - i as f64)
    }
}

impl PairSpline for KnotSpline {
    #[inline]
    fn value(&self, r: f64) -> f64 {
        if r.abs() >= self.cutoff {
            return 0.0;
        }
        let (i, eps) = self.locate(r);
        let c = &self.coeffs[i].0;
        c[0] + eps * (c[1] + eps * (c[2] + eps * c[3]))
    }

    #[inline]
    fn derivative(&self, r: f64) -> f64 {
        if r.abs() >= self.cutoff {
            return 0.0;
        }
        let (i, eps) = self.locate(r);
        let c = &self.coeffs[i].0;
        (c[1] + eps * (2.0 * c[2] + 3.0 * eps * c[3])) * self.inv_delta
    }
}

impl Cutoff for KnotSpline {
    #[inline]
    fn cutoff(&self) -> f64 {
        self.cutoff
    }
}

impl IsotropicTwobodyEnergy for KnotSpline {
    #[inline]
    fn isotropic_twobody_energy(&self, distance_squared: f64) -> f64 {
        self.value(distance_squared.sqrt())
    }

    #[inline]
    fn isotropic_twobody_force(&self, distance_squared: f64) -> f64 {
        -self.derivative(distance_squared.sqrt())
    }
}

impl Debug for KnotSpline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnotSpline")
            .field("n_knots", &self.knots.len())
            .field("cutoff", &self.cutoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_passes_through_knots() {
        let knots = [278.35, 3.3541, -0.58015, 0.16469, -0.11965, 0.05272];
        let spline = KnotSpline::new(11.0, &knots).unwrap();
        for (r, u) in spline.knot_positions().iter().zip(knots) {
            assert_relative_eq!(spline.value(*r), u, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_vanishes_at_cutoff() {
        let spline = KnotSpline::new(4.0, &[2.0, -1.0, -0.2]).unwrap();
        let just_below = 4.0 - 1e-9;
        assert_relative_eq!(spline.value(just_below), 0.0, epsilon = 1e-12);
        assert_relative_eq!(spline.derivative(just_below), 0.0, epsilon = 1e-6);
        assert_eq!(spline.value(4.0), 0.0);
        assert_eq!(spline.derivative(10.0), 0.0);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let spline = KnotSpline::new(5.0, &[1.0, 0.5, 0.1, 0.0]).unwrap();
        let h = 1e-6;
        for &r in &[0.3, 1.0, 2.2, 3.1, 4.6] {
            let numerical = (spline.value(r + h) - spline.value(r - h)) / (2.0 * h);
            assert_relative_eq!(spline.derivative(r), numerical, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_continuous_slope_at_nodes() {
        let spline = KnotSpline::new(3.0, &[5.0, 1.0, -0.5]).unwrap();
        let h = 1e-9;
        for r in [1.0, 2.0] {
            assert_relative_eq!(
                spline.derivative(r - h),
                spline.derivative(r + h),
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_force_is_negative_derivative() {
        let spline = KnotSpline::new(5.0, &[1.0, 0.5, 0.1, 0.0]).unwrap();
        let r: f64 = 1.7;
        assert_relative_eq!(
            spline.isotropic_twobody_force(r * r),
            -spline.derivative(r),
            epsilon = 1e-12
        );
        assert_eq!(spline.cutoff_squared(), 25.0);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            KnotSpline::new(5.0, &[]),
            Err(FitError::Configuration(_))
        ));
        assert!(KnotSpline::new(0.0, &[1.0]).is_err());
        assert!(KnotSpline::new(f64::NAN, &[1.0]).is_err());
        assert!(KnotSpline::new(1.0, &[f64::INFINITY]).is_err());
    }
}
