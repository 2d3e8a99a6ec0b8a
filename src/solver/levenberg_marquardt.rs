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

//! Projected Levenberg-Marquardt for box constrained least squares.
//!
//! Each iteration solves the damped normal equations
//! $$ (J^TJ + \lambda\\,\mathrm{diag}(J^TJ))\\,\delta = -J^Tr $$
//! for the parameters that are free to move, and projects the trial point back into the box.
//! A parameter resting on a bound with the gradient pointing outwards is frozen for that
//! iteration. If the projected step does not lower the cost, a projected gradient step
//! with an Armijo backtrack is tried before the damping is raised.
//!
//! The run is reported as converged only when the projected gradient,
//! $\\|P(x - \nabla C) - x\\|_\infty$, is small. The cost and step tolerances merely
//! end the run early once it is below $\sqrt{g_{tol}}$.
//!
//! References:
//! - Marquardt, J. Soc. Ind. Appl. Math. 11, 431-441 (1963)
//!   <https://doi.org/10.1137/0111030>
//! - Kanzow, Yamashita & Fukushima, J. Comput. Appl. Math. 172, 375-397 (2004)
//!   <https://doi.org/10.1016/j.cam.2004.02.013>

use super::{LeastSquaresSolver, Residuals, SolverConfig, SolverOutcome, Termination};
use crate::fit::BoxConstraints;
use finitediff::FiniteDiff;
use nalgebra::{DMatrix, DVector};
use std::cell::Cell;

/// Damping limits; beyond `MAX_DAMPING` no downhill step exists at machine precision.
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;
/// Floor for the Marquardt scaling of parameters with a vanishing Jacobian column
const MIN_SCALE: f64 = 1e-12;
/// Sufficient decrease parameter of the Armijo rule
const ARMIJO_SIGMA: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 30;

/// Box constrained Levenberg-Marquardt solver
///
/// # Examples
/// ```
/// use spline2gauss::fit::BoxConstraints;
/// use spline2gauss::solver::{LeastSquaresSolver, LevenbergMarquardt};
/// // minimize (x - 3)² + (y + 1)² with x ≤ 2
/// let residuals = |x: &[f64]| vec![x[0] - 3.0, x[1] + 1.0];
/// let bounds = BoxConstraints::new(vec![0.0, f64::NEG_INFINITY], vec![2.0, f64::INFINITY]);
/// let outcome = LevenbergMarquardt::default().solve(&residuals, &[1.0, 0.0], &bounds);
/// assert!(outcome.converged());
/// assert!((outcome.params[0] - 2.0).abs() < 1e-6);
/// assert!((outcome.params[1] + 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: SolverConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

/// Residual function with an evaluation counter
struct Problem<'a> {
    residuals: Residuals<'a>,
    bounds: &'a BoxConstraints,
    evaluations: Cell<usize>,
}

impl<'a> Problem<'a> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self.evaluations.set(self.evaluations.get() + 1);
        DVector::from_vec((self.residuals)(x.as_slice()))
    }

    /// Forward difference Jacobian, m × n. Not counted as evaluations.
    fn jacobian(&self, x: &DVector<f64>, m: usize) -> DMatrix<f64> {
        let f = |p: &Vec<f64>| (self.residuals)(p.as_slice());
        // one row per parameter
        let rows = x.as_slice().to_vec().forward_jacobian(&f);
        DMatrix::from_fn(m, x.len(), |i, j| {
            rows.get(j)
                .and_then(|row| row.get(i))
                .copied()
                .unwrap_or(0.0)
        })
    }

    /// True if parameter `j` sits on a bound and the gradient pushes it outwards
    fn is_pinned(&self, j: usize, x: f64, gradient: f64) -> bool {
        (x <= self.bounds.lower()[j] && gradient > 0.0)
            || (x >= self.bounds.upper()[j] && gradient < 0.0)
    }

    /// Point reached by a steepest descent step of length `alpha`, projected onto the box
    fn gradient_point(&self, x: &DVector<f64>, gradient: &DVector<f64>, alpha: f64) -> DVector<f64> {
        let mut point = x - gradient * alpha;
        self.bounds.project(point.as_mut_slice());
        point
    }

    /// Infinity norm of the projected gradient, zero at a stationary point of the box problem
    fn projected_gradient_norm(&self, x: &DVector<f64>, gradient: &DVector<f64>) -> f64 {
        (self.gradient_point(x, gradient, 1.0) - x).amax()
    }
}

fn half_squared_norm(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

/// Solve the damped normal equations restricted to the `free` parameters.
fn damped_step(
    jtj: &DMatrix<f64>,
    gradient: &DVector<f64>,
    free: &[usize],
    damping: f64,
) -> Option<DVector<f64>> {
    let k = free.len();
    let mut a = DMatrix::from_fn(k, k, |p, q| jtj[(free[p], free[q])]);
    for p in 0..k {
        a[(p, p)] += damping * a[(p, p)].max(MIN_SCALE);
    }
    let b = DVector::from_fn(k, |p, _| -gradient[free[p]]);
    let reduced = match a.clone().cholesky() {
        Some(cholesky) => cholesky.solve(&b),
        None => a.lu().solve(&b)?,
    };
    let mut step = DVector::zeros(gradient.len());
    for (p, &j) in free.iter().enumerate() {
        step[j] = reduced[p];
    }
    step.iter().all(|s| s.is_finite()).then_some(step)
}

/// Accepted trial point
struct Trial {
    x: DVector<f64>,
    r: DVector<f64>,
    cost: f64,
}

impl LeastSquaresSolver for LevenbergMarquardt {
    fn solve(
        &self,
        residuals: Residuals<'_>,
        x0: &[f64],
        bounds: &BoxConstraints,
    ) -> SolverOutcome {
        let problem = Problem {
            residuals,
            bounds,
            evaluations: Cell::new(0),
        };
        let mut x = DVector::from_column_slice(x0);
        let mut r = problem.residuals(&x);
        let mut cost = half_squared_norm(&r);

        let finish = |x: DVector<f64>, cost: f64, termination: Termination| SolverOutcome {
            params: x.as_slice().to_vec(),
            cost,
            termination,
            evaluations: problem.evaluations.get(),
        };

        if !bounds.contains(x0) {
            return finish(x, cost, Termination::InfeasibleStart);
        }
        if !cost.is_finite() {
            return finish(x, cost, Termination::NonFiniteResidual);
        }

        let config = &self.config;
        let budget = config.evaluation_budget(x0.len());
        let mut damping = config.initial_damping;
        // set when the last accepted step met the cost or step tolerance
        let mut stalled: Option<Termination> = None;

        loop {
            let jac = problem.jacobian(&x, r.len());
            let gradient = jac.tr_mul(&r);
            let projected_gradient = problem.projected_gradient_norm(&x, &gradient);
            if projected_gradient <= config.gtol {
                return finish(x, cost, Termination::GradientTolerance);
            }
            if let Some(termination) = stalled.take() {
                if projected_gradient <= config.gtol.sqrt() {
                    return finish(x, cost, termination);
                }
            }
            let free: Vec<usize> = (0..x.len())
                .filter(|&j| !problem.is_pinned(j, x[j], gradient[j]))
                .collect();
            let jtj = jac.tr_mul(&jac);

            // Raise the damping until a downhill step is found
            let (trial, from_gradient) = loop {
                if problem.evaluations.get() >= budget {
                    return finish(x, cost, Termination::MaxEvaluations);
                }
                if damping > MAX_DAMPING {
                    return finish(x, cost, Termination::DampingOverflow);
                }
                if let Some(step) = damped_step(&jtj, &gradient, &free, damping) {
                    let mut point = &x + step;
                    bounds.project(point.as_mut_slice());
                    if point != x {
                        let r_trial = problem.residuals(&point);
                        let cost_trial = half_squared_norm(&r_trial);
                        if cost_trial.is_finite() && cost_trial < cost {
                            break (
                                Trial {
                                    x: point,
                                    r: r_trial,
                                    cost: cost_trial,
                                },
                                false,
                            );
                        }
                    }
                }
                if let Some(trial) = armijo_step(&problem, &x, cost, &gradient, budget) {
                    break (trial, true);
                }
                damping *= 10.0;
            };

            let step_norm = (&trial.x - &x).norm();
            let reduction = cost - trial.cost;
            if reduction <= config.ftol * cost {
                stalled = Some(Termination::CostTolerance);
            } else if step_norm <= config.xtol * (config.xtol + x.norm()) {
                stalled = Some(Termination::StepTolerance);
            }
            if !from_gradient {
                damping = (damping / 10.0).max(MIN_DAMPING);
            }
            x = trial.x;
            r = trial.r;
            cost = trial.cost;
        }
    }
}

/// Projected gradient step with Armijo backtracking, starting from unit length
fn armijo_step(
    problem: &Problem<'_>,
    x: &DVector<f64>,
    cost: f64,
    gradient: &DVector<f64>,
    budget: usize,
) -> Option<Trial> {
    let mut alpha = 1.0;
    for _ in 0..MAX_BACKTRACKS {
        if problem.evaluations.get() >= budget {
            return None;
        }
        let point = problem.gradient_point(x, gradient, alpha);
        let decrease = gradient.dot(&(&point - x));
        if point == *x || decrease >= 0.0 {
            return None;
        }
        let r = problem.residuals(&point);
        let trial_cost = half_squared_norm(&r);
        if trial_cost.is_finite() && trial_cost <= cost + ARMIJO_SIGMA * decrease {
            return Some(Trial {
                x: point,
                r,
                cost: trial_cost,
            });
        }
        alpha *= 0.5;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Exponential decay data, y = 2 exp(-0.5 t)
    fn decay_residuals(x: &[f64]) -> Vec<f64> {
        (0..20)
            .map(|i| {
                let t = i as f64 * 0.25;
                x[0] * f64::exp(-x[1] * t) - 2.0 * f64::exp(-0.5 * t)
            })
            .collect()
    }

    #[test]
    fn test_unconstrained_exponential() {
        let bounds = BoxConstraints::unbounded(2);
        let outcome = LevenbergMarquardt::default().solve(&decay_residuals, &[1.0, 1.0], &bounds);
        assert!(outcome.converged(), "{:?}", outcome.termination);
        assert_relative_eq!(outcome.params[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(outcome.params[1], 0.5, epsilon = 1e-5);
        assert!(outcome.cost < 1e-12);
    }

    #[test]
    fn test_active_upper_bound() {
        let bounds = BoxConstraints::new(vec![0.0, 0.0], vec![1.5, f64::INFINITY]);
        let outcome = LevenbergMarquardt::default().solve(&decay_residuals, &[1.0, 1.0], &bounds);
        assert!(bounds.contains(&outcome.params));
        assert_relative_eq!(outcome.params[0], 1.5, epsilon = 1e-6);
        assert!(outcome.cost > 0.0);
    }

    #[test]
    fn test_start_on_bound() {
        // minimum at x = -1 lies outside; solution must stay at the lower bound 0
        let residuals = |x: &[f64]| vec![x[0] + 1.0];
        let bounds = BoxConstraints::new(vec![0.0], vec![f64::INFINITY]);
        let outcome = LevenbergMarquardt::default().solve(&residuals, &[0.0], &bounds);
        assert_eq!(outcome.termination, Termination::GradientTolerance);
        assert_eq!(outcome.params, vec![0.0]);
        assert_relative_eq!(outcome.cost, 0.5);
    }

    #[test]
    fn test_leaves_bound_when_gradient_points_inwards() {
        // the second Gaussian starts switched off at B = 0, K = 0 and must move
        // away from both bounds to describe the data
        let target = |t: f64| 3.0 * f64::exp(-2.0 * t * t) - 0.4 * f64::exp(-0.2 * t * t);
        let residuals = |x: &[f64]| {
            (0..60)
                .map(|i| {
                    let t = i as f64 * 0.1;
                    x[0] * f64::exp(-x[1] * t * t) + x[2] * f64::exp(-x[3] * t * t) - target(t)
                })
                .collect::<Vec<f64>>()
        };
        let bounds = BoxConstraints::new(
            vec![0.0, 0.0, f64::NEG_INFINITY, 0.0],
            vec![f64::INFINITY, f64::INFINITY, 0.0, f64::INFINITY],
        );
        let solver = LevenbergMarquardt::new(SolverConfig::default().with_max_evaluations(5000));
        let outcome = solver.solve(&residuals, &[3.0, 2.0, 0.0, 0.0], &bounds);
        assert!(bounds.contains(&outcome.params));
        assert!(outcome.params[2] < 0.0);
        assert!(outcome.params[3] > 0.0);
        assert!(outcome.cost < 0.5 * residuals(&[3.0, 2.0, 0.0, 0.0]).iter().map(|r| r * r).sum::<f64>());
    }

    #[test]
    fn test_restart_from_converged_point() {
        let bounds = BoxConstraints::new(vec![0.0, 0.0], vec![1.5, f64::INFINITY]);
        let solver = LevenbergMarquardt::default();
        let first = solver.solve(&decay_residuals, &[1.0, 1.0], &bounds);
        assert!(first.converged(), "{:?}", first.termination);
        let second = solver.solve(&decay_residuals, &first.params, &bounds);
        assert!(second.cost >= first.cost * (1.0 - 1e-6));
    }

    #[test]
    fn test_infeasible_start() {
        let bounds = BoxConstraints::new(vec![0.0], vec![1.0]);
        let outcome =
            LevenbergMarquardt::default().solve(&|x: &[f64]| vec![x[0]], &[2.0], &bounds);
        assert_eq!(outcome.termination, Termination::InfeasibleStart);
        assert!(!outcome.converged());
        assert_eq!(outcome.params, vec![2.0]);
        assert_eq!(outcome.evaluations, 1);
    }

    #[test]
    fn test_evaluation_budget() {
        let solver = LevenbergMarquardt::new(SolverConfig::default().with_max_evaluations(2));
        let bounds = BoxConstraints::unbounded(2);
        let outcome = solver.solve(&decay_residuals, &[10.0, 5.0], &bounds);
        assert_eq!(outcome.termination, Termination::MaxEvaluations);
        assert!(outcome.evaluations <= 2);
    }

    #[test]
    fn test_non_finite_start() {
        let bounds = BoxConstraints::unbounded(1);
        let outcome =
            LevenbergMarquardt::default().solve(&|_: &[f64]| vec![f64::NAN], &[0.0], &bounds);
        assert_eq!(outcome.termination, Termination::NonFiniteResidual);
    }
}
