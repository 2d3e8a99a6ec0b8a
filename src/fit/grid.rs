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

use crate::error::{FitError, Result};

/// Uniformly spaced sample radii spanning `[0, cutoff]`, both ends included.
///
/// # Examples
/// ~~~
/// use spline2gauss::fit::RadialGrid;
/// let grid = RadialGrid::uniform(5.0, 6).unwrap();
/// assert_eq!(grid.radii(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
/// ~~~
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGrid {
    radii: Vec<f64>,
}

impl RadialGrid {
    /// Create `n` points, $r_j = r_c\\,j/(n-1)$. Requires `n >= 2` and a finite, positive cutoff.
    pub fn uniform(cutoff: f64, n: usize) -> Result<Self> {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(FitError::config(format!(
                "cutoff must be finite and positive, got {cutoff}"
            )));
        }
        if n < 2 {
            return Err(FitError::config(format!(
                "at least two sample points are required, got {n}"
            )));
        }
        let last = (n - 1) as f64;
        let radii = (0..n)
            .map(|j| match j {
                j if j == n - 1 => cutoff,
                j => cutoff * j as f64 / last,
            })
            .collect();
        Ok(Self { radii })
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn cutoff(&self) -> f64 {
        self.radii[self.radii.len() - 1]
    }
}
