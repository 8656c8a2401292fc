use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};
use crate::linalg::LinearAlgebra;
use crate::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, VSMALL};

/// A 2x2 matrix stored row-major.
pub type Matrix2x2 = [[f64; 2]; 2];

/// Convergence controls for Khachiyan's algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KhachiyanSettings {
    /// Stop once the norm of the weight update drops to this value.
    pub tolerance:      f64,
    /// Hard cap on the number of weight updates.
    pub max_iterations: usize,
}

impl Default for KhachiyanSettings {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Minimum-volume enclosing ellipse of one point sample.
#[derive(Clone, Debug, PartialEq)]
pub struct EllipseFit {
    pub center:   [f64; 2],
    /// Radii in the order of the descending singular values of the shape matrix,
    /// so the first entry is the smaller radius.
    pub radii:    [f64; 2],
    /// Right singular vectors of the shape matrix (`V^T`), one per row.
    pub rotation: Matrix2x2,
    /// Number of weight updates performed.
    pub iterations: usize,
}

/// Rejects point arrays holding NaN or infinite coordinates.
///
/// This is bad input rather than bad geometry, so it is reported as `InvalidCluster`.
pub(crate) fn check_finite(points: ArrayView2<'_, f64>) -> Result<()> {
    match points.outer_iter().position(|row| row.iter().any(|v| !v.is_finite())) {
        Some(row) => Err(ClusterError::InvalidCluster(format!(
            "point {row} has non-finite coordinates"
        ))),
        None => Ok(()),
    }
}

/// Rejects samples whose points span less than a plane.
///
/// The scatter matrix of the centred points is rank-deficient when every point lies on
/// one line (which includes the all-duplicate case); the Khachiyan system is then
/// singular.
fn check_planar(points: ArrayView2<'_, f64>) -> Result<()> {
    let n = points.nrows() as f64;
    let mean_x = points.column(0).sum() / n;
    let mean_y = points.column(1).sum() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for row in points.outer_iter() {
        let dx = row[0] - mean_x;
        let dy = row[1] - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let trace = sxx + syy;
    let det = sxx * syy - sxy * sxy;
    if trace <= 0.0 || det <= VSMALL * trace * trace {
        return Err(ClusterError::DegenerateGeometry(format!(
            "{} points are collinear or coincident",
            points.nrows()
        )));
    }
    Ok(())
}

/// Fits the minimum-volume enclosing ellipse of a 2-D point sample with Khachiyan's
/// algorithm.
///
/// Points are given as an `N x 2` array of planar coordinates. Each iteration lifts the
/// points to homogeneous coordinates `Q`, finds the point with the largest Mahalanobis
/// distance under `V = Q diag(u) Q^T`, and moves weight toward it. After convergence the
/// centre is the weighted mean of the points and the shape matrix is
/// `A = inv(P^T diag(u) P - c c^T) / d`, whose SVD gives the radii (`1/sqrt(s)`) and the
/// orientation.
///
/// # Errors
///
/// * `InvalidCluster` if any coordinate is NaN or infinite.
/// * `DegenerateGeometry` if fewer than three points are given, the points are
///   collinear or coincident, or any matrix along the way is singular.
/// * `Convergence` if the tolerance is not met within `settings.max_iterations`.
pub fn fit_mvee<L: LinearAlgebra + ?Sized>(
    points: ArrayView2<'_, f64>,
    settings: &KhachiyanSettings,
    linalg: &L,
) -> Result<EllipseFit> {
    if points.ncols() != 2 {
        return Err(ClusterError::DegenerateGeometry(format!(
            "expected planar points, got {} columns",
            points.ncols()
        )));
    }
    let n = points.nrows();
    if n < 3 {
        return Err(ClusterError::DegenerateGeometry(format!(
            "an enclosing ellipse needs at least 3 points, got {n}"
        )));
    }
    check_finite(points)?;
    check_planar(points)?;

    let d = 2.0;
    let mut q = Array2::<f64>::ones((3, n));
    q.slice_mut(s![0..2, ..]).assign(&points.t());

    let mut u = Array1::<f64>::from_elem(n, 1.0 / n as f64);
    let mut err = settings.tolerance + 1.0;
    let mut iterations = 0;

    while err > settings.tolerance {
        if iterations >= settings.max_iterations {
            return Err(ClusterError::Convergence {
                iterations,
                error: err,
            });
        }
        let v = (&q * &u).dot(&q.t());
        let v_inv = linalg.inverse(v.view()).ok_or_else(|| {
            ClusterError::DegenerateGeometry("Khachiyan matrix is singular".to_string())
        })?;
        let m = (&q * &v_inv.dot(&q)).sum_axis(Axis(0));

        let (j, maximum) = m
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(jmax, best), (i, &value)| {
                if value > best {
                    (i, value)
                } else {
                    (jmax, best)
                }
            });
        let step_size = (maximum - d - 1.0) / ((d + 1.0) * (maximum - 1.0));

        let mut new_u = &u * (1.0 - step_size);
        new_u[j] += step_size;
        err = linalg.norm((&new_u - &u).view());
        u = new_u;
        iterations += 1;

        if !err.is_finite() {
            return Err(ClusterError::DegenerateGeometry(
                "Khachiyan weights became non-finite".to_string(),
            ));
        }
    }

    let center = points.t().dot(&u);
    let weighted = &points * &u.view().insert_axis(Axis(1));
    let mut scatter = points.t().dot(&weighted);
    for a in 0..2 {
        for b in 0..2 {
            scatter[[a, b]] -= center[a] * center[b];
        }
    }
    let shape = linalg.inverse(scatter.view()).ok_or_else(|| {
        ClusterError::DegenerateGeometry("ellipse scatter matrix is singular".to_string())
    })? / d;

    let svd = linalg.svd(shape.view()).ok_or_else(|| {
        ClusterError::DegenerateGeometry("SVD of the ellipse shape matrix failed".to_string())
    })?;
    let radii = [
        1.0 / svd.singular_values[0].sqrt(),
        1.0 / svd.singular_values[1].sqrt(),
    ];
    if radii.iter().chain(center.iter()).any(|v| !v.is_finite()) {
        return Err(ClusterError::DegenerateGeometry(
            "ellipse parameters are not finite".to_string(),
        ));
    }

    Ok(EllipseFit {
        center: [center[0], center[1]],
        radii,
        rotation: [
            [svd.v_t[[0, 0]], svd.v_t[[0, 1]]],
            [svd.v_t[[1, 0]], svd.v_t[[1, 1]]],
        ],
        iterations,
    })
}
