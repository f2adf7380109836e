//! Rectangular energy/position grids for the detector plane.
//!
//! Two grids share one specification type: the "display" grid the results
//! are reported on, and a wider "extended" grid the pipeline computes on so
//! convolution edge effects never reach the displayed window.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from constructing a grid out of a malformed specification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("{axis} axis needs at least 2 steps, got {steps}")]
    TooFewSteps { axis: &'static str, steps: usize },
    #[error("{axis} axis range [{start}, {end}] is not strictly increasing")]
    EmptyRange {
        axis: &'static str,
        start: f64,
        end: f64,
    },
    #[error("{axis} axis bounds must be finite")]
    NonFiniteBounds { axis: &'static str },
}

/// Specification of a rectangular product grid: energy (eV) by detector
/// position (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub e_start: f64,
    pub e_end: f64,
    pub e_steps: usize,
    pub y_start: f64,
    pub y_end: f64,
    pub y_steps: usize,
}

impl GridSpec {
    /// Display grid: the window results are reported on.
    pub const DISPLAY: GridSpec = GridSpec {
        e_start: -0.1,
        e_end: 0.1,
        e_steps: 500,
        y_start: -10.0,
        y_end: 10.0,
        y_steps: 200,
    };

    /// Extended grid: 50% wider energy range to absorb convolution edges.
    pub const EXTENDED: GridSpec = GridSpec {
        e_start: -0.15,
        e_end: 0.15,
        e_steps: 750,
        y_start: -10.0,
        y_end: 10.0,
        y_steps: 200,
    };

    fn validate(&self) -> Result<(), GridError> {
        for (axis, start, end, steps) in [
            ("energy", self.e_start, self.e_end, self.e_steps),
            ("position", self.y_start, self.y_end, self.y_steps),
        ] {
            if !start.is_finite() || !end.is_finite() {
                return Err(GridError::NonFiniteBounds { axis });
            }
            if steps < 2 {
                return Err(GridError::TooFewSteps { axis, steps });
            }
            if end <= start {
                return Err(GridError::EmptyRange { axis, start, end });
            }
        }
        Ok(())
    }
}

/// A realized grid: uniform axes plus derived spacing.
#[derive(Debug, Clone)]
pub struct Grid {
    pub spec: GridSpec,
    pub e_axis: Array1<f64>,
    pub y_axis: Array1<f64>,
    /// Energy spacing `e_axis[1] - e_axis[0]` (eV).
    pub de: f64,
}

impl Grid {
    pub fn new(spec: GridSpec) -> Result<Self, GridError> {
        spec.validate()?;
        let e_axis = Array1::linspace(spec.e_start, spec.e_end, spec.e_steps);
        let y_axis = Array1::linspace(spec.y_start, spec.y_end, spec.y_steps);
        let de = e_axis[1] - e_axis[0];
        Ok(Self {
            spec,
            e_axis,
            y_axis,
            de,
        })
    }

    /// The default display grid. The constant spec is known-valid.
    pub fn display() -> Self {
        Self::new(GridSpec::DISPLAY).expect("display grid spec must be valid")
    }

    /// The default extended grid. The constant spec is known-valid.
    pub fn extended() -> Self {
        Self::new(GridSpec::EXTENDED).expect("extended grid spec must be valid")
    }

    pub fn e_steps(&self) -> usize {
        self.spec.e_steps
    }

    pub fn y_steps(&self) -> usize {
        self.spec.y_steps
    }

    /// Row-major mesh matrices `(E, Y)` with `E[[i, j]] = e_axis[j]` and
    /// `Y[[i, j]] = y_axis[i]`.
    pub fn meshgrid(&self) -> (Array2<f64>, Array2<f64>) {
        let (rows, cols) = (self.y_steps(), self.e_steps());
        let e_mesh = Array2::from_shape_fn((rows, cols), |(_, j)| self.e_axis[j]);
        let y_mesh = Array2::from_shape_fn((rows, cols), |(i, _)| self.y_axis[i]);
        (e_mesh, y_mesh)
    }

    /// Largest absolute detector position, used to normalize the smile term.
    pub fn y_max_abs(&self) -> f64 {
        self.y_axis
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}
