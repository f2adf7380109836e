//! Optimizers and fitting APIs for Fermi-edge spectra.
//!
//! The fitting stack is layered: a seeded Differential Evolution global
//! search, a Levenberg-Marquardt local refiner, and a `curve_fit`
//! composite that chains the two and reports parameter uncertainties.
//! On top sit the two physics-facing entry points: `fit_fermi_edge`
//! (analytic edge model) and `estimate_irf` (full forward-simulator
//! parameter recovery).

pub mod curve_fit;
pub mod de;
pub mod error;
pub mod fermi_edge;
pub mod irf;
mod linalg;
pub mod lm;
pub mod serde_util;

pub use curve_fit::{curve_fit, CurveFitOptions, CurveFitResult, FitModel};
pub use de::{differential_evolution, Bounds, DeOptions, DeResult, ProgressFn};
pub use error::FitError;
pub use fermi_edge::{fit_fermi_edge, FermiEdgeFitResult, FermiEdgeModel};
pub use irf::{estimate_irf, IrfEstimationOptions, IrfEstimationResult, IRF_PARAM_COUNT};
pub use lm::{levenberg_marquardt, LmOptions, LmResult};
