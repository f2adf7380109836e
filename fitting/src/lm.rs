//! Levenberg-Marquardt nonlinear least-squares refiner.
//!
//! Damped Gauss-Newton with a multiplicative trust heuristic: accepted
//! steps relax the damping, rejected steps raise it. The damping rule
//! multiplies each diagonal entry by `lambda * (diag + 1e-10)`; the floor
//! keeps a zero diagonal from erasing the damping entirely and is pinned
//! by regression tests, as are the covariance regularizers.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::linalg::{invert, solve};

/// Forward-difference step for the numerical Jacobian.
const JACOBIAN_DELTA: f64 = 1e-7;

/// Diagonal floor inside the damping term and covariance regularization.
const DIAG_FLOOR: f64 = 1e-10;

/// Levenberg-Marquardt options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LmOptions {
    pub max_iter: usize,
    pub tol: f64,
    pub lambda_init: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-8,
            lambda_init: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Outcome of a Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct LmResult {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Final n-by-p Jacobian.
    pub jacobian: Array2<f64>,
    /// p-by-p covariance estimate (variance-scaled inverse of J^T J).
    pub covariance: Array2<f64>,
    pub iterations: usize,
    pub converged: bool,
}

fn jacobian<R>(residual_fn: &mut R, p: &[f64], r0: &[f64]) -> Array2<f64>
where
    R: FnMut(&[f64]) -> Vec<f64>,
{
    let n = r0.len();
    let np = p.len();
    let mut jac = Array2::zeros((n, np));
    let mut probe = p.to_vec();
    for j in 0..np {
        let saved = probe[j];
        probe[j] += JACOBIAN_DELTA;
        let rj = residual_fn(&probe);
        probe[j] = saved;
        for i in 0..n {
            jac[[i, j]] = (rj[i] - r0[i]) / JACOBIAN_DELTA;
        }
    }
    jac
}

fn cost_of(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// Minimize the sum of squared residuals starting from `p0`.
///
/// Singular damped systems are absorbed by the solver's in-place pivot
/// regularization plus the damping escalation; the routine never fails.
pub fn levenberg_marquardt<R>(mut residual_fn: R, p0: &[f64], options: &LmOptions) -> LmResult
where
    R: FnMut(&[f64]) -> Vec<f64>,
{
    let np = p0.len();
    let mut p = p0.to_vec();
    let mut r = residual_fn(&p);
    let mut cost = cost_of(&r);
    let mut jac = jacobian(&mut residual_fn, &p, &r);
    let mut lambda = options.lambda_init;

    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..options.max_iter {
        iterations += 1;

        let jt = jac.t();
        let a = jt.dot(&jac);
        let g = jt.dot(&Array1::from_vec(r.clone()));

        let mut damped = a.clone();
        for j in 0..np {
            damped[[j, j]] += lambda * (a[[j, j]] + DIAG_FLOOR);
        }
        let neg_g: Vec<f64> = g.iter().map(|v| -v).collect();
        let step = solve(&damped, &neg_g);

        let p_new: Vec<f64> = p.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
        let r_new = residual_fn(&p_new);
        let cost_new = cost_of(&r_new);
        let step_max = step.iter().fold(0.0_f64, |m, v| m.max(v.abs()));

        if cost_new < cost {
            let drop = cost - cost_new;
            let relative_floor = options.tol * cost;
            p = p_new;
            r = r_new;
            cost = cost_new;
            lambda *= options.lambda_down;
            if drop < relative_floor || step_max < options.tol {
                converged = true;
                break;
            }
            jac = jacobian(&mut residual_fn, &p, &r);
        } else {
            lambda *= options.lambda_up;
            if step_max < options.tol {
                converged = true;
                break;
            }
        }
    }

    let covariance = covariance_estimate(&jac, cost, r.len(), np);
    debug!(iterations, cost, converged, "levenberg-marquardt finished");

    LmResult {
        x: p,
        residuals: r,
        jacobian: jac,
        covariance,
        iterations,
        converged,
    }
}

/// Variance-scaled inverse of the regularized normal matrix, with a
/// diagonal fallback when the inverse is unusable.
fn covariance_estimate(jac: &Array2<f64>, cost: f64, n: usize, np: usize) -> Array2<f64> {
    let mut a = jac.t().dot(jac);
    for j in 0..np {
        a[[j, j]] += DIAG_FLOOR;
    }
    let variance = cost / (n.saturating_sub(np)).max(1) as f64;
    let mut cov = invert(&a);
    cov.mapv_inplace(|v| v * variance);

    let unusable = cov.iter().any(|v| !v.is_finite())
        || cov.iter().fold(0.0_f64, |m, v| m.max(v.abs())) > 1e10;
    if unusable {
        warn!("covariance ill-conditioned, falling back to diagonal proxy");
        let mut fallback = Array2::zeros((np, np));
        for j in 0..np {
            fallback[[j, j]] = variance * 0.01;
        }
        return fallback;
    }
    cov
}
