//! Numerical algorithms for spectral simulation and fitting.
//!
//! This module provides the special functions, physics kernels, and
//! resampling primitives the forward simulator and the optimizers are
//! built from.

pub mod convolve;
pub mod fermi;
pub mod interp;
pub mod rng;
pub mod special;

pub use convolve::{convolve_same, gaussian_kernel};
pub use fermi::{fermi_dirac, fermi_dirac_convolved, fermi_dirac_curve, KB};
pub use interp::{bilinear_sample, interp_with_fill, InterpError};
pub use rng::Mulberry32;
pub use special::{elliptical_gaussian_2d, erf, normal_cdf, skew_gaussian};

/// Scale a vector so its largest absolute value becomes 1.
///
/// A small floor on the divisor keeps all-zero inputs from producing NaN;
/// such inputs come back unchanged (modulo the floor).
pub fn normalize_max(values: &[f64]) -> Vec<f64> {
    let max_abs = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let scale = max_abs + 1e-12;
    values.iter().map(|v| v / scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_max() {
        let out = normalize_max(&[0.5, -2.0, 1.0]);
        assert_relative_eq!(out[1], -1.0, epsilon = 1e-9);
        assert_relative_eq!(out[0], 0.25, epsilon = 1e-9);

        let zeros = normalize_max(&[0.0, 0.0]);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
