//! Shared numerical primitives for the Fermi-edge IRF simulator and fitters.
//!
//! This crate contains the pure math used across the workspace: special
//! functions, Fermi-Dirac kernels, interpolation, convolution, and the
//! deterministic PRNG backing the global optimizer. Everything here is
//! stateless and allocation-light so the simulator and fitting crates can
//! call into it from hot loops.

pub mod algo;

pub use algo::convolve::{convolve_same, gaussian_kernel};
pub use algo::fermi::{fermi_dirac, fermi_dirac_convolved, fermi_dirac_curve, KB};
pub use algo::interp::{bilinear_sample, interp_with_fill};
pub use algo::rng::Mulberry32;
pub use algo::special::{elliptical_gaussian_2d, erf, normal_cdf, skew_gaussian};
