//! Differential Evolution global optimizer (DE/rand/1/bin).
//!
//! Runs on the deterministic Mulberry32 stream so that a given seed
//! reproduces the exact trajectory; this is load-bearing for regression
//! tests and for comparing fits across hosts.

use serde::{Deserialize, Serialize};
use shared::algo::rng::Mulberry32;
use tracing::debug;

use crate::error::FitError;

/// Per-iteration progress callback: `(iteration, best_fitness)`.
/// Returning `false` aborts the run.
pub type ProgressFn<'a> = dyn FnMut(usize, f64) -> bool + 'a;

/// Box constraints for the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, FitError> {
        if lower.len() != upper.len() {
            return Err(FitError::InvalidBounds {
                reason: format!(
                    "lower has {} entries, upper has {}",
                    lower.len(),
                    upper.len()
                ),
            });
        }
        if lower.is_empty() {
            return Err(FitError::InvalidBounds {
                reason: "bounds must have at least one dimension".into(),
            });
        }
        for (i, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(FitError::InvalidBounds {
                    reason: format!("dimension {i} has non-finite bounds"),
                });
            }
            if lo > hi {
                return Err(FitError::InvalidBounds {
                    reason: format!("dimension {i}: lower {lo} exceeds upper {hi}"),
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Clamp a vector into the box, componentwise.
    pub fn clamp(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(self.upper.iter())) {
            *v = v.clamp(*lo, *hi);
        }
    }
}

/// Differential Evolution options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DeOptions {
    pub max_iter: usize,
    pub pop: usize,
    /// Mutation factor.
    pub f: f64,
    /// Crossover rate.
    pub cr: f64,
    /// Convergence tolerance on the best-fitness improvement; 0 disables
    /// early stopping.
    pub tol: f64,
    pub seed: u32,
}

impl Default for DeOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            pop: 15,
            f: 0.8,
            cr: 0.7,
            tol: 1e-8,
            seed: 42,
        }
    }
}

/// Outcome of a Differential Evolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResult {
    /// Best parameter vector found.
    pub x: Vec<f64>,
    /// Best (minimized) objective value.
    pub fitness: f64,
    /// Number of completed sweeps.
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `objective` over the box `bounds` with DE/rand/1/bin.
///
/// Convergence fires on a sweep that improved the best fitness by a
/// strictly positive amount smaller than `tol`; sweeps that fail to
/// improve the best do not stop the run (population members may still be
/// improving toward a later breakthrough).
pub fn differential_evolution<F>(
    mut objective: F,
    bounds: &Bounds,
    options: &DeOptions,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> DeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let dim = bounds.dim();
    let pop = options.pop.max(4);
    let mut rng = Mulberry32::new(options.seed);

    let mut population: Vec<Vec<f64>> = (0..pop)
        .map(|_| {
            (0..dim)
                .map(|j| {
                    bounds.lower[j] + rng.next_f64() * (bounds.upper[j] - bounds.lower[j])
                })
                .collect()
        })
        .collect();
    let mut fitness: Vec<f64> = population.iter().map(|x| objective(x)).collect();

    let mut best_idx = 0;
    for (i, f) in fitness.iter().enumerate() {
        if *f < fitness[best_idx] {
            best_idx = i;
        }
    }
    let mut best = fitness[best_idx];
    let mut best_x = population[best_idx].clone();
    let mut prev_best = best;

    let mut iterations = 0;
    let mut converged = false;
    let mut trial = vec![0.0; dim];

    'sweeps: for iter in 0..options.max_iter {
        iterations = iter + 1;
        for i in 0..pop {
            let a = loop {
                let r = rng.next_index(pop);
                if r != i {
                    break r;
                }
            };
            let b = loop {
                let r = rng.next_index(pop);
                if r != i && r != a {
                    break r;
                }
            };
            let c = loop {
                let r = rng.next_index(pop);
                if r != i && r != a && r != b {
                    break r;
                }
            };

            let j_rand = rng.next_index(dim);
            for j in 0..dim {
                let donor = population[a][j] + options.f * (population[b][j] - population[c][j]);
                let donor = donor.clamp(bounds.lower[j], bounds.upper[j]);
                // The forced dimension guarantees the trial differs from
                // its target
                trial[j] = if rng.next_f64() < options.cr || j == j_rand {
                    donor
                } else {
                    population[i][j]
                };
            }

            let trial_fitness = objective(&trial);
            if trial_fitness < fitness[i] {
                population[i].copy_from_slice(&trial);
                fitness[i] = trial_fitness;
                if trial_fitness < best {
                    best = trial_fitness;
                    best_x.copy_from_slice(&trial);
                }
            }
        }

        if let Some(cb) = progress.as_mut() {
            if !cb(iterations, best) {
                debug!(iteration = iterations, "differential evolution aborted");
                break 'sweeps;
            }
        }

        let improvement = prev_best - best;
        if improvement > 0.0 && improvement < options.tol {
            converged = true;
            break;
        }
        prev_best = best;
    }

    debug!(
        iterations,
        fitness = best,
        converged,
        "differential evolution finished"
    );
    DeResult {
        x: best_x,
        fitness: best,
        iterations,
        converged,
    }
}
