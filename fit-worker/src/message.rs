//! Wire messages between the fitting host and the worker thread.
//!
//! Requests and responses are tagged unions discriminated by a `type`
//! field; unknown tags are rejected at the worker boundary with a fixed
//! error text. The request `id` is an opaque string minted by the host
//! and echoed on every response.

use fitting::{Bounds, FermiEdgeFitResult, IrfEstimationResult};
use serde::{Deserialize, Serialize};

/// Nominal iteration count used to scale Fermi-edge progress percentages.
pub const FERMI_EDGE_NOMINAL_ITERATIONS: usize = 100;

fn default_max_iterations() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Requests accepted by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FitRequest {
    /// Fit the analytic Fermi-edge model to an observed spectrum.
    FitFermiEdge {
        id: String,
        /// Energy axis in eV.
        energy: Vec<f64>,
        observed_spectrum: Vec<f64>,
        /// Sample temperature in K (initial guess when `fit_temp`).
        temp: f64,
        #[serde(default)]
        fit_temp: bool,
        #[serde(default = "default_true")]
        use_global_opt: bool,
    },
    /// Recover the eight IRF parameters by forward-simulation search.
    EstimateIRF {
        id: String,
        observed_spectrum: Vec<f64>,
        temp: f64,
        #[serde(default)]
        #[serde(skip_serializing_if = "Option::is_none")]
        bounds: Option<Bounds>,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
}

impl FitRequest {
    pub fn id(&self) -> &str {
        match self {
            FitRequest::FitFermiEdge { id, .. } => id,
            FitRequest::EstimateIRF { id, .. } => id,
        }
    }
}

/// Terminal payload of a successful dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FitResultPayload {
    Irf(IrfEstimationResult),
    FermiEdge(FermiEdgeFitResult),
}

/// Responses emitted by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FitResponse {
    /// One per optimizer sweep, in iteration order.
    Progress {
        id: String,
        iteration: usize,
        fitness: f64,
        /// Percentage in `[0, 100]`.
        progress: f64,
    },
    /// Terminal: the fit ran to completion (possibly reporting a failed
    /// fit inside the payload).
    Result {
        id: String,
        result: Box<FitResultPayload>,
    },
    /// Terminal: the request could not be dispatched.
    Error { id: String, error: String },
}

impl FitResponse {
    pub fn id(&self) -> &str {
        match self {
            FitResponse::Progress { id, .. } => id,
            FitResponse::Result { id, .. } => id,
            FitResponse::Error { id, .. } => id,
        }
    }

    /// Whether this message ends its request's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FitResponse::Progress { .. })
    }
}

/// Progress percentage for `iteration` out of `max_iterations`.
pub fn progress_percent(iteration: usize, max_iterations: usize) -> f64 {
    let max = max_iterations.max(1);
    (iteration as f64 / max as f64 * 100.0).min(100.0)
}
