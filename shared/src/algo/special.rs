//! Special functions: error function, normal CDF, and skew-Gaussian
//! profiles in one and two dimensions.
//!
//! The error function uses the Abramowitz & Stegun 7.1.26 rational
//! approximation. Its coefficients are pinned by downstream tests, so the
//! implementation must not be swapped for a library version with different
//! rounding behavior.

use ndarray::{Array2, ArrayView2};
use std::f64::consts::{PI, SQRT_2};

const A1: f64 = 0.254829592;
const A2: f64 = -0.284496736;
const A3: f64 = 1.421413741;
const A4: f64 = -1.453152027;
const A5: f64 = 1.061405429;
const P: f64 = 0.3275911;

/// Error function via the Abramowitz & Stegun rational approximation.
///
/// Maximum absolute error is about 1.5e-7 over the real line. Computed for
/// |x| and reflected, since the approximation is only valid for x >= 0.
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let ax = x.abs();
    let t = 1.0 / (1.0 + P * ax);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-ax * ax).exp();
    sign * y
}

/// Cumulative distribution function of the standard normal distribution.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Skew-Gaussian density evaluated at each point of `xs`.
///
/// `2 * phi(x/sigma) / sigma * Phi(gamma * x / sigma)` where `phi` is the
/// standard normal PDF and `Phi` the standard normal CDF. `gamma = 0`
/// reduces to the plain Gaussian density.
pub fn skew_gaussian(xs: &[f64], sigma: f64, gamma: f64) -> Vec<f64> {
    let norm = 1.0 / (2.0 * PI).sqrt();
    xs.iter()
        .map(|&x| {
            let u = x / sigma;
            let phi = norm * (-0.5 * u * u).exp();
            let v = 2.0 * phi / sigma * normal_cdf(gamma * u);
            // A degenerate width divides 0 by 0; report no density there
            if v.is_finite() {
                v
            } else {
                0.0
            }
        })
        .collect()
}

/// Two-dimensional elliptical skew-Gaussian over mesh coordinates.
///
/// `e_mesh` and `y_mesh` are row-major `[y, e]` meshes of the evaluation
/// coordinates. The profile is the product of one-dimensional skew factors
/// in the rotated frame. The result is normalized to unit total sum unless
/// the sum is vanishingly small, in which case it is returned as-is.
pub fn elliptical_gaussian_2d(
    e_mesh: &ArrayView2<f64>,
    y_mesh: &ArrayView2<f64>,
    sigma_x: f64,
    sigma_y: f64,
    gamma_x: f64,
    gamma_y: f64,
    rotation_deg: f64,
) -> Array2<f64> {
    let theta = rotation_deg.to_radians();
    let (cos_t, sin_t) = (theta.cos(), theta.sin());

    let mut profile = Array2::zeros(e_mesh.raw_dim());
    for ((i, j), out) in profile.indexed_iter_mut() {
        let x = e_mesh[[i, j]];
        let y = y_mesh[[i, j]];
        let xr = x * cos_t - y * sin_t;
        let yr = x * sin_t + y * cos_t;

        let ux = xr / sigma_x;
        let uy = yr / sigma_y;
        let fx = 2.0 * (-0.5 * ux * ux).exp() * normal_cdf(gamma_x * ux);
        let fy = 2.0 * (-0.5 * uy * uy).exp() * normal_cdf(gamma_y * uy);
        let v = fx * fy;
        *out = if v.is_finite() { v } else { 0.0 };
    }

    let total: f64 = profile.iter().sum();
    if total > 1e-12 {
        profile.mapv_inplace(|v| v / total);
    }
    profile
}
