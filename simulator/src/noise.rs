//! Detector noise model for the simulated spectrum.
//!
//! Counting noise is approximated by a Gaussian with sqrt(lambda)
//! deviation rather than a true Poisson draw; the approximation is part of
//! the simulator contract and downstream tests assume it. Normal deviates
//! come from the Box-Muller transform over a seeded uniform stream.

use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};

/// Threshold below which the Poisson channel is considered disabled.
const POISSON_EPS: f64 = 1e-5;

/// Standard normal deviate via Box-Muller.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Apply counting and additive noise to a spectrum.
///
/// Per sample: if `poisson_noise` is active, the value is scaled to an
/// expected count `lambda = v * 1000/poisson_noise`, perturbed by
/// `z * sqrt(lambda)`, and scaled back. An independent Gaussian of
/// amplitude `gaussian_noise/100` is then added. Results are clamped to be
/// non-negative.
///
/// `seed` selects a reproducible stream; `None` draws a fresh seed.
pub fn apply_noise(
    spectrum: &[f64],
    poisson_noise: f64,
    gaussian_noise: f64,
    seed: Option<u64>,
) -> Vec<f64> {
    let seed = seed.unwrap_or_else(|| thread_rng().next_u64());
    let mut rng = StdRng::seed_from_u64(seed);

    spectrum
        .iter()
        .map(|&v| {
            let mut out = v;
            if poisson_noise > POISSON_EPS {
                let scale = 1000.0 / poisson_noise;
                let lambda = out * scale;
                let z = standard_normal(&mut rng);
                out = (lambda + z * lambda.max(0.0).sqrt()) / scale;
            }
            if gaussian_noise > 0.0 {
                out += standard_normal(&mut rng) * (gaussian_noise / 100.0);
            }
            out.max(0.0)
        })
        .collect()
}
