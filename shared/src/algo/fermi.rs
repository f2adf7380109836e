//! Fermi-Dirac occupation kernels.
//!
//! The occupation function is evaluated in eV and Kelvin. Below 0.1 K the
//! exponential argument overflows double precision long before the
//! physical limit, so the function degenerates to the ideal step; above it
//! the argument is clamped to +/-100 for the same reason.

use crate::algo::convolve::{convolve_same, gaussian_kernel};

/// Boltzmann constant in eV/K.
pub const KB: f64 = 8.617333262e-5;

/// Fermi-Dirac occupation at energy `e` (eV) for temperature `t` (K) and
/// Fermi level `ef` (eV).
pub fn fermi_dirac(e: f64, t: f64, ef: f64) -> f64 {
    if t < 0.1 {
        return if e <= ef { 1.0 } else { 0.0 };
    }
    let arg = ((e - ef) / (KB * t)).clamp(-100.0, 100.0);
    1.0 / (1.0 + arg.exp())
}

/// Fermi-Dirac occupation over a whole energy axis.
pub fn fermi_dirac_curve(energies: &[f64], t: f64, ef: f64) -> Vec<f64> {
    energies.iter().map(|&e| fermi_dirac(e, t, ef)).collect()
}

/// Fermi-Dirac edge broadened by a Gaussian of width `sigma` (eV).
///
/// The axis is extended on both sides by `clamp(ceil(10*sigma/de), 10, 1000)`
/// uniformly spaced samples before convolving, so the edge-replicated
/// convolution boundary never leaks into the returned window. The central
/// `energies.len()` samples are returned.
pub fn fermi_dirac_convolved(energies: &[f64], ef: f64, t: f64, sigma: f64) -> Vec<f64> {
    let n = energies.len();
    if n < 2 {
        return fermi_dirac_curve(energies, t, ef);
    }
    let de = (energies[1] - energies[0]).abs();
    let n_pad = ((10.0 * sigma / de).ceil() as usize).clamp(10, 1000);

    let mut padded = Vec::with_capacity(n + 2 * n_pad);
    for i in (1..=n_pad).rev() {
        padded.push(energies[0] - i as f64 * de);
    }
    padded.extend_from_slice(energies);
    for i in 1..=n_pad {
        padded.push(energies[n - 1] + i as f64 * de);
    }

    let fd = fermi_dirac_curve(&padded, t, ef);
    let kernel = gaussian_kernel(sigma, de);
    let convolved = convolve_same(&fd, &kernel);
    convolved[n_pad..n_pad + n].to_vec()
}
