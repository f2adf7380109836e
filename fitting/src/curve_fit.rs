//! Bounded curve fitting: Differential Evolution for the basin, then
//! Levenberg-Marquardt for the refinement.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::de::{differential_evolution, Bounds, DeOptions, ProgressFn};
use crate::error::FitError;
use crate::lm::{levenberg_marquardt, LmOptions};

/// A parameterized model evaluated over an independent axis.
///
/// Implementations bundle whatever fixed context the model needs (fixed
/// temperature, grids, ...) instead of capturing it in closures, so the
/// same model value can be handed to both optimizers and serialized hosts.
pub trait FitModel {
    /// Evaluate the model at every point of `x` for parameters `params`.
    fn eval(&self, x: &[f64], params: &[f64]) -> Vec<f64>;
}

/// Options for the DE + LM composite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveFitOptions {
    /// Run the global stage before refining. When off, LM starts from the
    /// caller's initial guess.
    pub use_global_opt: bool,
    pub de: DeOptions,
    pub lm: LmOptions,
}

impl Default for CurveFitOptions {
    fn default() -> Self {
        Self {
            use_global_opt: true,
            de: DeOptions::default(),
            lm: LmOptions::default(),
        }
    }
}

/// Result of a bounded curve fit.
#[derive(Debug, Clone)]
pub struct CurveFitResult {
    /// Fitted parameters, projected into bounds.
    pub params: Vec<f64>,
    /// One-sigma parameter errors; NaN marks entries whose estimate is
    /// meaningless (displayed as "N/A" by consumers).
    pub param_errors: Vec<f64>,
    pub covariance: Array2<f64>,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
    pub converged: bool,
}

/// Threshold above which a parameter error is considered meaningless.
const ERROR_ABS_CAP: f64 = 1e6;

/// Relative cap: errors beyond 100x the parameter magnitude are noise.
const ERROR_REL_CAP: f64 = 100.0;

fn sanitize_errors(params: &[f64], covariance: &Array2<f64>) -> Vec<f64> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let err = covariance[[i, i]].abs().sqrt();
            if !err.is_finite() || err > ERROR_ABS_CAP || err > ERROR_REL_CAP * p.abs() + 1e-10 {
                f64::NAN
            } else {
                err
            }
        })
        .collect()
}

fn validate_data(x: &[f64], y: &[f64], p0: &[f64], bounds: &Bounds) -> Result<(), FitError> {
    if x.is_empty() || y.is_empty() {
        return Err(FitError::EmptyInput);
    }
    if x.len() != y.len() {
        return Err(FitError::MismatchedLengths {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteData);
    }
    if p0.len() != bounds.dim() {
        return Err(FitError::InvalidBounds {
            reason: format!(
                "initial guess has {} parameters, bounds have {}",
                p0.len(),
                bounds.dim()
            ),
        });
    }
    if x.len() <= p0.len() {
        return Err(FitError::TooFewPoints {
            needed: p0.len() + 1,
            got: x.len(),
        });
    }
    Ok(())
}

/// Fit `model` to `(x, y)` within `bounds`.
///
/// DE minimizes the sum of squared residuals inside the box; LM then
/// refines unconstrained, and the refined parameters are projected back
/// into the box componentwise. R-squared is computed against the sample
/// mean of `y`.
pub fn curve_fit<M: FitModel>(
    model: &M,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    bounds: &Bounds,
    options: &CurveFitOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<CurveFitResult, FitError> {
    validate_data(x, y, p0, bounds)?;

    let residuals_of = |params: &[f64]| -> Vec<f64> {
        model
            .eval(x, params)
            .iter()
            .zip(y.iter())
            .map(|(m, obs)| obs - m)
            .collect()
    };

    let start = if options.use_global_opt {
        let objective = |params: &[f64]| -> f64 {
            residuals_of(params).iter().map(|r| r * r).sum()
        };
        differential_evolution(objective, bounds, &options.de, progress).x
    } else {
        p0.to_vec()
    };

    let lm_result = levenberg_marquardt(|p: &[f64]| residuals_of(p), &start, &options.lm);

    let mut params = lm_result.x.clone();
    bounds.clamp(&mut params);
    let residuals = residuals_of(&params);

    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    let param_errors = sanitize_errors(&params, &lm_result.covariance);

    Ok(CurveFitResult {
        params,
        param_errors,
        covariance: lm_result.covariance,
        residuals,
        r_squared,
        converged: lm_result.converged,
    })
}
