//! Physical input parameters of the forward model.

use serde::{Deserialize, Serialize};

/// Physical inputs to the forward simulator.
///
/// Resolution widths (`sigma_x`, `sigma_res`) are specified in meV and
/// converted to eV at the pipeline boundary; spatial quantities are in mm,
/// the tilt in degrees, and the skewness/smile parameters dimensionless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorParams {
    /// Source energy resolution (meV).
    pub sigma_x: f64,
    /// Spot spatial width (mm).
    pub sigma_y: f64,
    /// Energy gradient across the spot (eV/mm).
    pub alpha: f64,
    /// Energy-axis skewness of the spot.
    pub gamma_x: f64,
    /// Spatial skewness of the spot.
    pub gamma_y: f64,
    /// Smile curvature of iso-energy lines on the detector.
    pub kappa: f64,
    /// Detector tilt (degrees).
    pub theta: f64,
    /// Detector intrinsic resolution (meV).
    pub sigma_res: f64,
    /// Sample temperature (K, non-negative).
    pub temp: f64,
    /// Poisson noise level; 0 disables.
    pub poisson_noise: f64,
    /// Gaussian noise level in percent of full scale; 0 disables.
    pub gaussian_noise: f64,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        Self {
            sigma_x: 0.5,
            sigma_y: 0.5,
            alpha: 0.002,
            gamma_x: 0.0,
            gamma_y: 0.0,
            kappa: 0.01,
            theta: 0.08,
            sigma_res: 1.5,
            temp: 5.0,
            poisson_noise: 0.0,
            gaussian_noise: 0.0,
        }
    }
}

impl SimulatorParams {
    /// Source resolution in eV.
    pub fn sigma_source_ev(&self) -> f64 {
        self.sigma_x / 1000.0
    }

    /// Detector resolution in eV.
    pub fn sigma_detector_ev(&self) -> f64 {
        self.sigma_res / 1000.0
    }

    /// Combined quadrature resolution in meV.
    pub fn sigma_combined_mev(&self) -> f64 {
        (self.sigma_x * self.sigma_x + self.sigma_res * self.sigma_res).sqrt()
    }

    /// Whether either noise channel is active.
    pub fn has_noise(&self) -> bool {
        self.poisson_noise > 1e-5 || self.gaussian_noise > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_params() {
        let p = SimulatorParams::default();
        assert_relative_eq!(p.sigma_x, 0.5);
        assert_relative_eq!(p.sigma_res, 1.5);
        assert_relative_eq!(p.temp, 5.0);
        assert!(!p.has_noise());
    }

    #[test]
    fn test_unit_conversions() {
        let p = SimulatorParams {
            sigma_x: 0.5,
            sigma_res: 1.5,
            ..Default::default()
        };
        assert_relative_eq!(p.sigma_source_ev(), 0.0005, epsilon = 1e-12);
        assert_relative_eq!(p.sigma_detector_ev(), 0.0015, epsilon = 1e-12);
        assert_relative_eq!(p.sigma_combined_mev(), 1.5811388300841898, epsilon = 1e-9);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let p: SimulatorParams = serde_json::from_str(r#"{"temp": 10.0}"#).unwrap();
        assert_relative_eq!(p.temp, 10.0);
        assert_relative_eq!(p.sigma_x, 0.5);
    }
}
