//! Forward simulator for the instrumental response of an XPS Fermi-edge
//! measurement.
//!
//! The pipeline models a parameterized X-ray source illuminating a metallic
//! sample at temperature T, imaged by a 2D detector with geometric
//! distortions (tilt and smile), projected to a 1D energy spectrum, and
//! broadened by the source and detector resolution kernels. A near-zero
//! temperature rerun of the same pipeline yields the instrumental response
//! function by differentiation.

pub mod emission;
pub mod forward;
pub mod grid;
pub mod noise;
pub mod params;
pub mod projection;

pub use forward::{simulate, simulate_seeded, SimulationResult};
pub use grid::{Grid, GridError, GridSpec};
pub use params::SimulatorParams;
