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

//! Sign constraints on the Gaussian terms.

use crate::twobody::TermRole;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-parameter lower and upper bounds for a flat `[B0, K0, B1, K1, ...]` vector
#[derive(Debug, Clone, PartialEq)]
pub struct BoxConstraints {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoxConstraints {
    /// # Panics
    /// Panics if `lower` and `upper` differ in length
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(
            lower.len(),
            upper.len(),
            "lower and upper bounds must have equal length"
        );
        Self { lower, upper }
    }

    /// No constraints on `n` parameters
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Number of constrained parameters
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// True if `x` has the right length and every component is inside its bounds.
    /// NaN is never inside.
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.len()
            && x
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(v, (lo, hi))| lo <= v && v <= hi)
    }

    /// Clamp every component of `x` into its bounds
    pub fn project(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.max(*lo).min(*hi);
        }
    }
}

/// How the amplitudes of the terms are bounded.
///
/// For term index `i`, the inverse squared width is always `K ∈ [0, ∞)`, while
///
/// | Term            | `CappedRepulsion` | `UnboundedRepulsion` |
/// |-----------------|-------------------|----------------------|
/// | even, repulsive | `B ∈ [0, u_max]`  | `B ∈ [0, ∞)`         |
/// | odd, attractive | `B ∈ (-∞, 0]`     | `B ∈ (-∞, 0]`        |
///
/// where `u_max` is the maximum of the corrected potential curve.
///
/// # Examples
/// ~~~
/// use spline2gauss::fit::BoundsPolicy;
/// let bounds = BoundsPolicy::CappedRepulsion.bounds(2, 30.0);
/// assert_eq!(bounds.lower(), &[0.0, 0.0, f64::NEG_INFINITY, 0.0]);
/// assert_eq!(bounds.upper(), &[30.0, f64::INFINITY, 0.0, f64::INFINITY]);
/// ~~~
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum BoundsPolicy {
    /// Repulsive amplitudes may not exceed the curve maximum
    #[default]
    CappedRepulsion,
    /// Repulsive amplitudes are only required to be non-negative
    UnboundedRepulsion,
}

impl BoundsPolicy {
    /// Bounds for `n_terms` Gaussians, i.e. `2 n_terms` parameters
    pub fn bounds(&self, n_terms: usize, u_max: f64) -> BoxConstraints {
        let repulsive_cap = match self {
            Self::CappedRepulsion => u_max,
            Self::UnboundedRepulsion => f64::INFINITY,
        };
        let (lower, upper) = (0..n_terms)
            .map(|i| match TermRole::of(i) {
                TermRole::Repulsive => ([0.0, 0.0], [repulsive_cap, f64::INFINITY]),
                TermRole::Attractive => ([f64::NEG_INFINITY, 0.0], [0.0, f64::INFINITY]),
            })
            .fold(
                (Vec::with_capacity(2 * n_terms), Vec::with_capacity(2 * n_terms)),
                |(mut lower, mut upper), (lo, hi)| {
                    lower.extend(lo);
                    upper.extend(hi);
                    (lower, upper)
                },
            );
        BoxConstraints { lower, upper }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_of_amplitude_bounds() {
        for policy in [BoundsPolicy::CappedRepulsion, BoundsPolicy::UnboundedRepulsion] {
            for n in 1..8 {
                let bounds = policy.bounds(n, 12.5);
                assert_eq!(bounds.len(), 2 * n);
                for i in 0..n {
                    let (b, k) = (2 * i, 2 * i + 1);
                    if i % 2 == 0 {
                        assert_eq!(bounds.lower()[b], 0.0);
                    } else {
                        assert_eq!(bounds.upper()[b], 0.0);
                        assert_eq!(bounds.lower()[b], f64::NEG_INFINITY);
                    }
                    assert_eq!(bounds.lower()[k], 0.0);
                    assert_eq!(bounds.upper()[k], f64::INFINITY);
                }
            }
        }
    }

    #[test]
    fn test_repulsive_cap() {
        let capped = BoundsPolicy::CappedRepulsion.bounds(3, 7.0);
        let unbounded = BoundsPolicy::UnboundedRepulsion.bounds(3, 7.0);
        assert_eq!(capped.upper()[0], 7.0);
        assert_eq!(capped.upper()[4], 7.0);
        assert_eq!(unbounded.upper()[0], f64::INFINITY);
        assert_eq!(unbounded.upper()[4], f64::INFINITY);
    }

    #[test]
    fn test_contains_and_project() {
        let bounds = BoundsPolicy::CappedRepulsion.bounds(2, 5.0);
        assert!(bounds.contains(&[5.0, 0.0, 0.0, 0.0]));
        assert!(!bounds.contains(&[5.1, 1.0, -1.0, 1.0]));
        assert!(!bounds.contains(&[1.0, 1.0, -1.0]));
        assert!(!bounds.contains(&[f64::NAN, 1.0, -1.0, 1.0]));

        let mut x = [6.0, -1.0, 2.0, 0.5];
        bounds.project(&mut x);
        assert_eq!(x, [5.0, 0.0, 0.0, 0.5]);
        assert!(bounds.contains(&x));
    }
}
