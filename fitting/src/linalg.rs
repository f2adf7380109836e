//! Small dense linear algebra for the Levenberg-Marquardt refiner.
//!
//! The systems here are p-by-p with p in the single digits, so plain
//! Gaussian elimination with partial pivoting is the right tool. Near-zero
//! pivots are nudged rather than reported: a singular damped system means
//! the damping will be raised next iteration anyway, so the solver must
//! always return something finite.

use ndarray::Array2;

/// Magnitude below which a pivot is regularized in place.
const PIVOT_EPS: f64 = 1e-12;

/// LU factorization with partial pivoting, `A = P L U` stored compactly.
///
/// Returns the packed factors and the row permutation. Pivots smaller than
/// `PIVOT_EPS` in magnitude are bumped by `PIVOT_EPS` instead of failing.
fn lu_factor(a: &Array2<f64>) -> (Array2<f64>, Vec<usize>) {
    let n = a.nrows();
    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    for col in 0..n {
        let mut pivot_row = col;
        for row in col + 1..n {
            if lu[[row, col]].abs() > lu[[pivot_row, col]].abs() {
                pivot_row = row;
            }
        }
        if pivot_row != col {
            for j in 0..n {
                let tmp = lu[[col, j]];
                lu[[col, j]] = lu[[pivot_row, j]];
                lu[[pivot_row, j]] = tmp;
            }
            perm.swap(col, pivot_row);
        }
        if lu[[col, col]].abs() < PIVOT_EPS {
            lu[[col, col]] += PIVOT_EPS;
        }
        for row in col + 1..n {
            let factor = lu[[row, col]] / lu[[col, col]];
            lu[[row, col]] = factor;
            for j in col + 1..n {
                lu[[row, j]] -= factor * lu[[col, j]];
            }
        }
    }
    (lu, perm)
}

/// Solve `L U x = P b` given packed factors.
fn lu_solve(lu: &Array2<f64>, perm: &[usize], b: &[f64]) -> Vec<f64> {
    let n = perm.len();
    let mut x: Vec<f64> = perm.iter().map(|&p| b[p]).collect();
    for i in 1..n {
        for j in 0..i {
            x[i] -= lu[[i, j]] * x[j];
        }
    }
    for i in (0..n).rev() {
        for j in i + 1..n {
            x[i] -= lu[[i, j]] * x[j];
        }
        x[i] /= lu[[i, i]];
    }
    x
}

/// Solve `A x = b` by pivoted elimination with in-place regularization.
pub(crate) fn solve(a: &Array2<f64>, b: &[f64]) -> Vec<f64> {
    let (lu, perm) = lu_factor(a);
    lu_solve(&lu, &perm, b)
}

/// Invert `A` by reusing one LU factorization across unit columns.
pub(crate) fn invert(a: &Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let (lu, perm) = lu_factor(a);
    let mut inv = Array2::zeros((n, n));
    let mut e = vec![0.0; n];
    for col in 0..n {
        e[col] = 1.0;
        let x = lu_solve(&lu, &perm, &e);
        for row in 0..n {
            inv[[row, col]] = x[row];
        }
        e[col] = 0.0;
    }
    inv
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_solve_well_conditioned() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let x = solve(&a, &[1.0, 2.0]);
        assert_relative_eq!(4.0 * x[0] + x[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[0] + 3.0 * x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let x = solve(&a, &[3.0, 7.0]);
        assert_relative_eq!(x[0], 7.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_solve_singular_stays_finite() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        let x = solve(&a, &[1.0, 2.0]);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_invert_round_trip() {
        let a = array![[2.0, 0.5, 0.0], [0.5, 3.0, 1.0], [0.0, 1.0, 4.0]];
        let inv = invert(&a);
        let prod = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(prod[[i, j]], expected, epsilon = 1e-10);
            }
        }
    }
}
