//! Interpolation primitives: 1D linear interpolation with configurable
//! out-of-range fills, and bilinear sampling of a 2D grid.
//!
//! Both routines assume strictly increasing axes; that invariant is owned
//! by the grid construction code, so lookups here stay branch-light.

use ndarray::ArrayView2;
use thiserror::Error;

/// Errors for malformed interpolation inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("input vectors must have the same length ({x_len} vs {y_len})")]
    MismatchedLengths { x_len: usize, y_len: usize },
    #[error("input vectors must have at least 2 points")]
    InsufficientData,
}

/// Index of the interval containing `x`: the largest `i` with `xs[i] <= x`,
/// clamped so `i + 1` is always a valid sample.
fn interval_index(xs: &[f64], x: f64) -> usize {
    // partition_point returns the first index with xs[idx] > x
    let idx = xs.partition_point(|&v| v <= x);
    idx.saturating_sub(1).min(xs.len() - 2)
}

fn interp_point(x: f64, xs: &[f64], ys: &[f64], left: f64, right: f64) -> f64 {
    if x < xs[0] {
        return left;
    }
    if x > xs[xs.len() - 1] {
        return right;
    }
    let i = interval_index(xs, x);
    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    ys[i] + t * (ys[i + 1] - ys[i])
}

/// Linear interpolation of `(x_old, y_old)` at each point of `x_new`.
///
/// `x_old` must be sorted ascending. Queries outside the range evaluate to
/// `left`/`right`, defaulting to the first/last sample of `y_old`. This is
/// the numpy-style fill the emission model relies on: left-clamp preserves
/// the occupied plateau, an explicit `right = 0` enforces vacuum above the
/// edge.
pub fn interp_with_fill(
    x_new: &[f64],
    x_old: &[f64],
    y_old: &[f64],
    left: Option<f64>,
    right: Option<f64>,
) -> Result<Vec<f64>, InterpError> {
    if x_old.len() != y_old.len() {
        return Err(InterpError::MismatchedLengths {
            x_len: x_old.len(),
            y_len: y_old.len(),
        });
    }
    if x_old.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    let left = left.unwrap_or(y_old[0]);
    let right = right.unwrap_or(y_old[y_old.len() - 1]);
    Ok(x_new
        .iter()
        .map(|&x| interp_point(x, x_old, y_old, left, right))
        .collect())
}

/// Bilinearly sample `data` (row-major `[y, e]`) at `(y, e)`.
///
/// Coordinates outside either axis return 0: the detector sees nothing
/// beyond its active area.
pub fn bilinear_sample(y_axis: &[f64], e_axis: &[f64], data: &ArrayView2<f64>, y: f64, e: f64) -> f64 {
    if y < y_axis[0] || y > y_axis[y_axis.len() - 1] || e < e_axis[0] || e > e_axis[e_axis.len() - 1]
    {
        return 0.0;
    }
    let i = interval_index(y_axis, y);
    let j = interval_index(e_axis, e);
    let ty = (y - y_axis[i]) / (y_axis[i + 1] - y_axis[i]);
    let te = (e - e_axis[j]) / (e_axis[j + 1] - e_axis[j]);

    data[[i, j]] * (1.0 - ty) * (1.0 - te)
        + data[[i + 1, j]] * ty * (1.0 - te)
        + data[[i, j + 1]] * (1.0 - ty) * te
        + data[[i + 1, j + 1]] * ty * te
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_interp_exact_and_midpoints() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 2.0, 4.0, 6.0];
        let out = interp_with_fill(&[0.0, 1.5, 3.0], &xs, &ys, None, None).unwrap();
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[1], 3.0);
        assert_relative_eq!(out[2], 6.0);
    }

    #[test]
    fn test_interp_default_fills_are_endpoints() {
        let xs = [0.0, 1.0];
        let ys = [5.0, 7.0];
        let out = interp_with_fill(&[-1.0, 2.0], &xs, &ys, None, None).unwrap();
        assert_eq!(out, vec![5.0, 7.0]);
    }

    #[test]
    fn test_interp_explicit_fills() {
        let xs = [0.0, 1.0];
        let ys = [5.0, 7.0];
        let out = interp_with_fill(&[-1.0, 2.0], &xs, &ys, Some(5.0), Some(0.0)).unwrap();
        assert_eq!(out, vec![5.0, 0.0]);
    }

    #[test]
    fn test_interp_rejects_bad_input() {
        assert!(matches!(
            interp_with_fill(&[0.5], &[0.0, 1.0], &[1.0], None, None),
            Err(InterpError::MismatchedLengths { .. })
        ));
        assert!(matches!(
            interp_with_fill(&[0.5], &[0.0], &[1.0], None, None),
            Err(InterpError::InsufficientData)
        ));
    }

    #[test]
    fn test_bilinear_sample_interior_and_corners() {
        let y_axis = [0.0, 1.0];
        let e_axis = [0.0, 1.0];
        let data = array![[0.0, 1.0], [2.0, 3.0]];
        let v = bilinear_sample(&y_axis, &e_axis, &data.view(), 0.5, 0.5);
        assert_relative_eq!(v, 1.5);
        assert_relative_eq!(bilinear_sample(&y_axis, &e_axis, &data.view(), 0.0, 0.0), 0.0);
        assert_relative_eq!(bilinear_sample(&y_axis, &e_axis, &data.view(), 1.0, 1.0), 3.0);
    }

    #[test]
    fn test_bilinear_sample_out_of_range_is_zero() {
        let y_axis = [0.0, 1.0];
        let e_axis = [0.0, 1.0];
        let data = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(bilinear_sample(&y_axis, &e_axis, &data.view(), -0.1, 0.5), 0.0);
        assert_eq!(bilinear_sample(&y_axis, &e_axis, &data.view(), 0.5, 1.1), 0.0);
    }
}
