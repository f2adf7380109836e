//! The forward pipeline: parameters in, detector observables out.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use shared::algo::fermi::fermi_dirac_curve;
use shared::algo::interp::interp_with_fill;
use shared::algo::normalize_max;
use tracing::debug;

use crate::emission::{emission_image, spot_profile};
use crate::grid::Grid;
use crate::noise::apply_noise;
use crate::params::SimulatorParams;
use crate::projection::project_spectrum;

/// Temperature (K) used for the near-zero rerun that isolates the
/// instrumental response from the thermal edge width.
const IRF_PROBE_TEMP: f64 = 0.01;

/// Everything the forward model produces for one parameter set.
///
/// 1D vectors are on the display energy axis; 2D arrays are row-major
/// `[y_steps, e_steps]` on the display grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Display energy axis in meV.
    pub energy: Vec<f64>,
    /// Normalized spectrum with noise applied (equals `spectrum_clean`
    /// when both noise channels are off).
    pub spectrum: Vec<f64>,
    /// Normalized noise-free spectrum; peak value 1.
    pub spectrum_clean: Vec<f64>,
    /// Ideal Fermi-Dirac occupation on the display axis.
    pub ideal_fd: Vec<f64>,
    /// Instrumental response function, peak-normalized, sign flipped to
    /// the binding-energy convention.
    pub irf: Vec<f64>,
    /// Undistorted emission image on the display grid.
    pub image_2d: Array2<f64>,
    /// Source spot profile on the display grid.
    pub spot_profile: Array2<f64>,
    /// Display position axis (mm).
    pub y_axis: Vec<f64>,
    /// Source resolution (meV), echoed from the input.
    pub sigma_source: f64,
    /// Detector resolution (meV), echoed from the input.
    pub sigma_detector: f64,
    /// Quadrature-combined resolution (meV).
    pub sigma_combined: f64,
}

/// Emission + projection + resampling onto the display axis, at an
/// arbitrary sample temperature.
fn projected_display_spectrum(
    params: &SimulatorParams,
    temp: f64,
    ext: &Grid,
    display: &Grid,
) -> Vec<f64> {
    let image = emission_image(ext, temp, params.alpha, params.sigma_y, params.gamma_y);
    let spectrum_ext = project_spectrum(
        ext,
        &image,
        params.kappa,
        params.theta,
        params.sigma_source_ev(),
        params.sigma_detector_ev(),
    );
    interp_with_fill(
        display.e_axis.as_slice().expect("contiguous axis"),
        ext.e_axis.as_slice().expect("contiguous axis"),
        &spectrum_ext,
        None,
        None,
    )
    .expect("extended axis and spectrum lengths match by construction")
}

/// Central-difference derivative with one-sided stencils at the ends.
fn differentiate(values: &[f64], dx: f64) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|j| {
            if j == 0 {
                (values[1] - values[0]) / dx
            } else if j == n - 1 {
                (values[n - 1] - values[n - 2]) / dx
            } else {
                (values[j + 1] - values[j - 1]) / (2.0 * dx)
            }
        })
        .collect()
}

/// Run the forward model with an explicit noise seed.
///
/// The pipeline is total: any finite parameter set yields a finite result
/// (degenerate inputs produce all-zero spectra rather than an error).
pub fn simulate_seeded(params: &SimulatorParams, noise_seed: Option<u64>) -> SimulationResult {
    let ext = Grid::extended();
    let display = Grid::display();

    let raw = projected_display_spectrum(params, params.temp, &ext, &display);
    let peak = raw.iter().fold(0.0_f64, |m, v| m.max(*v));
    let spectrum_clean: Vec<f64> = raw.iter().map(|v| v / (peak + 1e-12)).collect();

    let spectrum = if params.has_noise() {
        apply_noise(
            &spectrum_clean,
            params.poisson_noise,
            params.gaussian_noise,
            noise_seed,
        )
    } else {
        spectrum_clean.clone()
    };

    // Near-zero-temperature rerun: the detected edge is then purely
    // instrumental, and its derivative is the response function.
    let cold = projected_display_spectrum(params, IRF_PROBE_TEMP, &ext, &display);
    let gradient = differentiate(&cold, display.de);
    let irf: Vec<f64> = normalize_max(&gradient).iter().map(|v| -v).collect();

    let ideal_fd = fermi_dirac_curve(
        display.e_axis.as_slice().expect("contiguous axis"),
        params.temp,
        0.0,
    );
    let image_2d = emission_image(
        &display,
        params.temp,
        params.alpha,
        params.sigma_y,
        params.gamma_y,
    );
    let spot = spot_profile(
        &display,
        params.sigma_source_ev(),
        params.sigma_y,
        params.gamma_x,
        params.gamma_y,
    );

    debug!(
        temp = params.temp,
        sigma_combined = params.sigma_combined_mev(),
        "forward simulation complete"
    );

    SimulationResult {
        energy: display.e_axis.iter().map(|e| e * 1000.0).collect(),
        spectrum,
        spectrum_clean,
        ideal_fd,
        irf,
        image_2d,
        spot_profile: spot,
        y_axis: display.y_axis.to_vec(),
        sigma_source: params.sigma_x,
        sigma_detector: params.sigma_res,
        sigma_combined: params.sigma_combined_mev(),
    }
}

/// Run the forward model; noisy runs draw a fresh seed.
pub fn simulate(params: &SimulatorParams) -> SimulationResult {
    simulate_seeded(params, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_simulation_shapes_and_resolutions() {
        let result = simulate(&SimulatorParams::default());

        assert_eq!(result.energy.len(), 500);
        assert_eq!(result.spectrum.len(), 500);
        assert_eq!(result.spectrum_clean.len(), 500);
        assert_eq!(result.ideal_fd.len(), 500);
        assert_eq!(result.irf.len(), 500);
        assert_eq!(result.image_2d.dim(), (200, 500));
        assert_eq!(result.spot_profile.dim(), (200, 500));
        assert_eq!(result.y_axis.len(), 200);

        // sqrt(0.5^2 + 1.5^2) meV
        assert_relative_eq!(result.sigma_combined, 1.5811, epsilon = 1e-4);
        assert_relative_eq!(
            result.sigma_combined,
            (result.sigma_source.powi(2) + result.sigma_detector.powi(2)).sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_clean_spectrum_normalized() {
        let result = simulate(&SimulatorParams::default());
        let max = result.spectrum_clean.iter().fold(0.0_f64, |m, v| m.max(*v));
        assert!(max <= 1.0 + 1e-12);
        assert_relative_eq!(max, 1.0, epsilon = 1e-6);
        assert!(result.spectrum_clean.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_irf_normalization_and_sign() {
        let result = simulate(&SimulatorParams::default());
        let peak = result.irf.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert_relative_eq!(peak, 1.0, epsilon = 1e-9);
        // Binding-energy sign convention: the edge derivative is negative,
        // the flipped response integrates positive over the whole axis
        let integral: f64 = result.irf.iter().sum();
        assert!(integral > 0.0);
        assert!(result.irf.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_energy_axis_in_mev() {
        let result = simulate(&SimulatorParams::default());
        assert_relative_eq!(result.energy[0], -100.0, epsilon = 1e-9);
        assert_relative_eq!(result.energy[499], 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noise_only_touches_spectrum() {
        let params = SimulatorParams {
            poisson_noise: 5.0,
            gaussian_noise: 0.5,
            ..Default::default()
        };
        let result = simulate_seeded(&params, Some(42));
        assert_ne!(result.spectrum, result.spectrum_clean);
        assert!(result.spectrum.iter().all(|v| *v >= 0.0));

        let again = simulate_seeded(&params, Some(42));
        assert_eq!(result.spectrum, again.spectrum);
    }

    #[test]
    fn test_noiseless_spectrum_equals_clean() {
        let result = simulate(&SimulatorParams::default());
        assert_eq!(result.spectrum, result.spectrum_clean);
    }

    #[test]
    fn test_degenerate_params_still_finite() {
        let params = SimulatorParams {
            sigma_x: 0.0,
            sigma_y: 1e-9,
            sigma_res: 0.0,
            temp: 0.0,
            alpha: 0.0,
            kappa: 0.0,
            theta: 0.0,
            ..Default::default()
        };
        let result = simulate(&params);
        assert!(result.spectrum.iter().all(|v| v.is_finite()));
        assert!(result.irf.iter().all(|v| v.is_finite()));
        assert!(result.image_2d.iter().all(|v| v.is_finite()));
        assert!(result.spot_profile.iter().all(|v| v.is_finite()));
    }
}
