//! Full instrumental-response parameter estimation.
//!
//! Recovers the eight physical IRF parameters by driving the forward
//! simulator inside a Differential Evolution search: each candidate vector
//! is simulated and scored by the mean squared error between the
//! max-normalized simulated and observed spectra. Both spectra are
//! normalized before comparison, so the loss is blind to overall scale;
//! that is intentional and must not be "fixed" silently.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use simulator::{simulate, SimulatorParams};
use tracing::{debug, info};

use crate::de::{differential_evolution, Bounds, DeOptions, ProgressFn};

/// Number of fitted IRF parameters, in the order
/// `(kappa, theta, sigma_res, alpha, sigma_x, sigma_y, gamma_x, gamma_y)`.
pub const IRF_PARAM_COUNT: usize = 8;

/// Default search box for the eight parameters.
pub fn default_irf_bounds() -> Bounds {
    Bounds::new(
        vec![0.0, -0.5, 0.1, -0.01, 0.01, 0.01, -5.0, -10.0],
        vec![0.1, 0.5, 10.0, 0.01, 5.0, 5.0, 5.0, 10.0],
    )
    .expect("default IRF bounds are well-formed")
}

/// Options for the IRF estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrfEstimationOptions {
    /// Number of DE sweeps; every sweep emits one progress event.
    pub max_iterations: usize,
    /// Custom search box; `None` uses `default_irf_bounds`.
    pub bounds: Option<Bounds>,
}

impl Default for IrfEstimationOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            bounds: None,
        }
    }
}

/// Outcome of an IRF estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrfEstimationResult {
    pub success: bool,
    pub kappa: f64,
    pub theta: f64,
    pub sigma_res: f64,
    pub alpha: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub gamma_x: f64,
    pub gamma_y: f64,
    /// Clean simulated spectrum at the fitted parameters.
    pub fitted_spectrum: Vec<f64>,
    /// Instrumental response at the fitted parameters.
    pub estimated_irf: Vec<f64>,
    /// Final mean squared normalized-spectrum error.
    #[serde(deserialize_with = "crate::serde_util::nan_from_null")]
    pub final_loss: f64,
    pub iterations: usize,
    /// Objective evaluations, including the initial population.
    pub evaluations: usize,
    pub message: String,
}

impl IrfEstimationResult {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            kappa: 0.0,
            theta: 0.0,
            sigma_res: 0.0,
            alpha: 0.0,
            sigma_x: 0.0,
            sigma_y: 0.0,
            gamma_x: 0.0,
            gamma_y: 0.0,
            fitted_spectrum: Vec::new(),
            estimated_irf: Vec::new(),
            final_loss: f64::NAN,
            iterations: 0,
            evaluations: 0,
            message,
        }
    }
}

fn params_from_vector(x: &[f64], temp: f64) -> SimulatorParams {
    SimulatorParams {
        kappa: x[0],
        theta: x[1],
        sigma_res: x[2],
        alpha: x[3],
        sigma_x: x[4],
        sigma_y: x[5],
        gamma_x: x[6],
        gamma_y: x[7],
        temp,
        poisson_noise: 0.0,
        gaussian_noise: 0.0,
    }
}

/// Mean squared error between two max-normalized spectra, over the
/// shorter length.
fn normalized_mse(simulated: &[f64], observed: &[f64]) -> f64 {
    let n = simulated.len().min(observed.len());
    if n == 0 {
        return f64::NAN;
    }
    let sim_max = simulated.iter().fold(0.0_f64, |m, v| m.max(*v));
    let obs_max = observed.iter().fold(0.0_f64, |m, v| m.max(*v));
    let mut acc = 0.0;
    for i in 0..n {
        let d = simulated[i] / (sim_max + 1e-12) - observed[i] / (obs_max + 1e-12);
        acc += d * d;
    }
    acc / n as f64
}

/// Estimate the eight IRF parameters from an observed spectrum at sample
/// temperature `temp` (K).
///
/// DE-only: the objective is too rough for derivative-based refinement.
/// The convergence tolerance is disabled so the run always performs
/// exactly `max_iterations` sweeps, one progress event each.
pub fn estimate_irf(
    observed: &[f64],
    temp: f64,
    options: &IrfEstimationOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> IrfEstimationResult {
    if observed.is_empty() {
        return IrfEstimationResult::failure("observed spectrum is empty".into());
    }
    if observed.iter().any(|v| !v.is_finite()) {
        return IrfEstimationResult::failure("observed spectrum contains non-finite values".into());
    }
    if !temp.is_finite() || temp < 0.0 {
        return IrfEstimationResult::failure(format!("invalid sample temperature {temp}"));
    }
    let bounds = match &options.bounds {
        Some(b) => {
            if b.dim() != IRF_PARAM_COUNT {
                return IrfEstimationResult::failure(format!(
                    "IRF bounds must have {IRF_PARAM_COUNT} dimensions, got {}",
                    b.dim()
                ));
            }
            b.clone()
        }
        None => default_irf_bounds(),
    };

    let evaluations = Cell::new(0usize);
    let objective = |x: &[f64]| -> f64 {
        evaluations.set(evaluations.get() + 1);
        let result = simulate(&params_from_vector(x, temp));
        normalized_mse(&result.spectrum_clean, observed)
    };

    let de_options = DeOptions {
        max_iter: options.max_iterations,
        tol: 0.0,
        ..Default::default()
    };
    info!(
        max_iterations = options.max_iterations,
        temp, "starting IRF estimation"
    );
    let de_result = differential_evolution(objective, &bounds, &de_options, progress);

    let best = params_from_vector(&de_result.x, temp);
    let simulated = simulate(&best);
    debug!(loss = de_result.fitness, "IRF estimation finished");

    IrfEstimationResult {
        success: true,
        kappa: de_result.x[0],
        theta: de_result.x[1],
        sigma_res: de_result.x[2],
        alpha: de_result.x[3],
        sigma_x: de_result.x[4],
        sigma_y: de_result.x[5],
        gamma_x: de_result.x[6],
        gamma_y: de_result.x[7],
        fitted_spectrum: simulated.spectrum_clean,
        estimated_irf: simulated.irf,
        final_loss: de_result.fitness,
        iterations: de_result.iterations,
        evaluations: evaluations.get(),
        message: format!(
            "IRF estimation completed after {} iterations ({} evaluations), final loss {:.3e}",
            de_result.iterations,
            evaluations.get(),
            de_result.fitness
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_inputs_reported() {
        let result = estimate_irf(&[], 5.0, &IrfEstimationOptions::default(), None);
        assert!(!result.success);
        assert!(result.message.contains("empty"));

        let result = estimate_irf(
            &[1.0, f64::NAN],
            5.0,
            &IrfEstimationOptions::default(),
            None,
        );
        assert!(!result.success);

        let result = estimate_irf(&[1.0, 0.5], -3.0, &IrfEstimationOptions::default(), None);
        assert!(!result.success);

        let bad_bounds = IrfEstimationOptions {
            bounds: Some(Bounds::new(vec![0.0], vec![1.0]).unwrap()),
            ..Default::default()
        };
        let result = estimate_irf(&[1.0, 0.5], 5.0, &bad_bounds, None);
        assert!(!result.success);
        assert!(result.message.contains("dimensions"));
    }

    #[test]
    fn test_normalized_mse_properties() {
        let a = vec![0.0, 0.5, 1.0];
        assert_eq!(normalized_mse(&a, &a), 0.0);
        // Scale invariance: the loss only sees shapes
        let scaled: Vec<f64> = a.iter().map(|v| v * 7.0).collect();
        assert!(normalized_mse(&a, &scaled) < 1e-20);
        // Shorter length wins
        let longer = vec![0.0, 0.5, 1.0, 0.3];
        assert_eq!(normalized_mse(&a, &longer), 0.0);
    }

    #[test]
    fn test_params_from_vector_order() {
        let x = [0.01, 0.08, 1.5, 0.002, 0.5, 0.6, 0.1, -0.2];
        let p = params_from_vector(&x, 5.0);
        assert_eq!(p.kappa, 0.01);
        assert_eq!(p.theta, 0.08);
        assert_eq!(p.sigma_res, 1.5);
        assert_eq!(p.alpha, 0.002);
        assert_eq!(p.sigma_x, 0.5);
        assert_eq!(p.sigma_y, 0.6);
        assert_eq!(p.gamma_x, 0.1);
        assert_eq!(p.gamma_y, -0.2);
        assert_eq!(p.temp, 5.0);
        assert_eq!(p.poisson_noise, 0.0);
        assert_eq!(p.gaussian_noise, 0.0);
    }
}
