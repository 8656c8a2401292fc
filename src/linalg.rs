//! Dense linear-algebra operations needed by the ellipse fit.
//!
//! The fit only needs a square inverse, a singular value decomposition and a vector
//! norm, so those are exposed through [`LinearAlgebra`] and the rest of the crate stays
//! on `ndarray` views. [`NalgebraBackend`] is the default implementation.

use nalgebra::DMatrix;
use ndarray::prelude::*;

/// Singular value decomposition `m = u * diag(singular_values) * v_t`.
///
/// Singular values are sorted in descending order.
#[derive(Clone, Debug)]
pub struct Svd {
    pub u:               Array2<f64>,
    pub singular_values: Array1<f64>,
    pub v_t:             Array2<f64>,
}

pub trait LinearAlgebra: Send + Sync {
    /// Inverse of a square matrix, or `None` when it is singular.
    fn inverse(&self, m: ArrayView2<'_, f64>) -> Option<Array2<f64>>;

    /// Full SVD of a matrix, or `None` if the decomposition fails.
    fn svd(&self, m: ArrayView2<'_, f64>) -> Option<Svd>;

    /// Euclidean norm of a vector.
    fn norm(&self, v: ArrayView1<'_, f64>) -> f64 {
        v.dot(&v).sqrt()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NalgebraBackend;

fn to_nalgebra(m: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

fn from_nalgebra(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

impl LinearAlgebra for NalgebraBackend {
    fn inverse(&self, m: ArrayView2<'_, f64>) -> Option<Array2<f64>> {
        if m.nrows() != m.ncols() {
            return None;
        }
        let inv = to_nalgebra(m).try_inverse()?;
        if inv.iter().all(|v| v.is_finite()) {
            Some(from_nalgebra(&inv))
        } else {
            None
        }
    }

    fn svd(&self, m: ArrayView2<'_, f64>) -> Option<Svd> {
        let svd = to_nalgebra(m).try_svd(true, true, f64::EPSILON, 1_000)?;
        let u = svd.u?;
        let v_t = svd.v_t?;
        let s = svd.singular_values;

        let mut order: Vec<usize> = (0..s.len()).collect();
        order.sort_by(|&a, &b| s[b].total_cmp(&s[a]));

        Some(Svd {
            u: Array2::from_shape_fn((u.nrows(), order.len()), |(i, k)| u[(i, order[k])]),
            singular_values: order.iter().map(|&k| s[k]).collect(),
            v_t: Array2::from_shape_fn((order.len(), v_t.ncols()), |(k, j)| v_t[(order[k], j)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_inverse_round_trip() {
        let m = array![[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let inv = NalgebraBackend.inverse(m.view()).unwrap();
        let identity = m.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(identity[[i, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_matrix_has_no_inverse() {
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(NalgebraBackend.inverse(m.view()).is_none());
        assert!(NalgebraBackend.inverse(array![[1.0, 2.0, 3.0]].view()).is_none());
    }

    #[test]
    fn test_svd_sorted_and_reconstructs() {
        let m = array![[1.0, 0.0], [0.0, 9.0]];
        let svd = NalgebraBackend.svd(m.view()).unwrap();
        assert_relative_eq!(svd.singular_values[0], 9.0, epsilon = 1e-12);
        assert_relative_eq!(svd.singular_values[1], 1.0, epsilon = 1e-12);

        let rebuilt = svd.u.dot(&Array2::from_diag(&svd.singular_values)).dot(&svd.v_t);
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(rebuilt[[i, j]], m[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_norm() {
        assert_relative_eq!(NalgebraBackend.norm(array![3.0, 4.0].view()), 5.0);
    }
}
