//! Fermi-edge fitting against the analytic broadened-edge model.
//!
//! The model is `amplitude * FD_conv(e - shift; T, sigma) + offset`, with
//! the convolution performed on a padded axis so the fit window never sees
//! convolution edge artifacts. Temperature can be fitted or held fixed;
//! holding it fixed removes it from the parameter vector entirely rather
//! than pinning it with degenerate bounds.

use serde::{Deserialize, Serialize};
use shared::algo::fermi::fermi_dirac_convolved;
use tracing::debug;

use crate::curve_fit::{curve_fit, CurveFitOptions, FitModel};
use crate::de::{Bounds, ProgressFn};

/// Analytic Fermi-edge model.
///
/// `fixed_temp` selects the 4-parameter variant
/// `(ef_shift, sigma_total, amplitude, offset)`; otherwise temperature is
/// the third of five parameters.
pub struct FermiEdgeModel {
    pub fixed_temp: Option<f64>,
}

impl FitModel for FermiEdgeModel {
    fn eval(&self, x: &[f64], params: &[f64]) -> Vec<f64> {
        let (ef_shift, sigma, temp, amplitude, offset) = match self.fixed_temp {
            Some(t) => (params[0], params[1], t, params[2], params[3]),
            None => (params[0], params[1], params[2], params[3], params[4]),
        };
        fermi_dirac_convolved(x, ef_shift, temp, sigma)
            .iter()
            .map(|v| amplitude * v + offset)
            .collect()
    }
}

impl FermiEdgeModel {
    fn bounds(&self) -> Bounds {
        match self.fixed_temp {
            Some(_) => Bounds::new(
                vec![-0.05, 1e-4, 0.5, -0.5],
                vec![0.05, 0.05, 2.0, 0.5],
            ),
            None => Bounds::new(
                vec![-0.05, 1e-4, 0.1, 0.5, -0.5],
                vec![0.05, 0.05, 300.0, 2.0, 0.5],
            ),
        }
        .expect("fermi-edge bounds are well-formed")
    }

    fn initial_guess(&self, temp0: f64) -> Vec<f64> {
        match self.fixed_temp {
            Some(_) => vec![0.0, 0.005, 1.0, 0.0],
            None => vec![0.0, 0.005, temp0, 1.0, 0.0],
        }
    }
}

/// Outcome of a Fermi-edge fit. Widths are in eV; NaN errors mean the
/// uncertainty estimate was rejected (rendered "N/A" downstream).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FermiEdgeFitResult {
    pub success: bool,
    pub ef_shift: f64,
    #[serde(deserialize_with = "crate::serde_util::nan_from_null")]
    pub ef_shift_error: f64,
    pub sigma_total: f64,
    #[serde(deserialize_with = "crate::serde_util::nan_from_null")]
    pub sigma_total_error: f64,
    pub temp_fit: f64,
    #[serde(deserialize_with = "crate::serde_util::nan_from_null")]
    pub temp_error: f64,
    pub amplitude: f64,
    pub offset: f64,
    pub fitted_spectrum: Vec<f64>,
    pub r_squared: f64,
    pub residuals: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub error_message: Option<String>,
}

impl FermiEdgeFitResult {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            ef_shift: 0.0,
            ef_shift_error: f64::NAN,
            sigma_total: 0.0,
            sigma_total_error: f64::NAN,
            temp_fit: 0.0,
            temp_error: f64::NAN,
            amplitude: 0.0,
            offset: 0.0,
            fitted_spectrum: Vec::new(),
            r_squared: 0.0,
            residuals: Vec::new(),
            error_message: Some(message),
        }
    }
}

/// Fit the analytic Fermi-edge model to an observed spectrum.
///
/// `energy` is in eV. Invalid input is reported through the result's
/// `success`/`error_message` rather than a panic or an `Err`: the caller
/// is typically a worker that must always produce a terminal message.
pub fn fit_fermi_edge(
    energy: &[f64],
    observed: &[f64],
    temp0: f64,
    fit_temp: bool,
    use_global_opt: bool,
    progress: Option<&mut ProgressFn<'_>>,
) -> FermiEdgeFitResult {
    if !temp0.is_finite() || temp0 < 0.0 {
        return FermiEdgeFitResult::failure(format!("invalid initial temperature {temp0}"));
    }

    let model = FermiEdgeModel {
        fixed_temp: if fit_temp { None } else { Some(temp0) },
    };
    let bounds = model.bounds();
    let p0 = model.initial_guess(temp0);
    let options = CurveFitOptions {
        use_global_opt,
        ..Default::default()
    };

    let fit = match curve_fit(&model, energy, observed, &p0, &bounds, &options, progress) {
        Ok(fit) => fit,
        Err(e) => return FermiEdgeFitResult::failure(e.to_string()),
    };

    let fitted_spectrum = model.eval(energy, &fit.params);
    let (temp_fit, temp_error) = if fit_temp {
        (fit.params[2], fit.param_errors[2])
    } else {
        (temp0, f64::NAN)
    };
    let (amplitude, offset) = if fit_temp {
        (fit.params[3], fit.params[4])
    } else {
        (fit.params[2], fit.params[3])
    };

    debug!(
        ef_shift = fit.params[0],
        sigma_total = fit.params[1],
        r_squared = fit.r_squared,
        "fermi-edge fit finished"
    );

    FermiEdgeFitResult {
        success: true,
        ef_shift: fit.params[0],
        ef_shift_error: fit.param_errors[0],
        sigma_total: fit.params[1],
        sigma_total_error: fit.param_errors[1],
        temp_fit,
        temp_error,
        amplitude,
        offset,
        fitted_spectrum,
        r_squared: fit.r_squared,
        residuals: fit.residuals,
        error_message: None,
    }
}
