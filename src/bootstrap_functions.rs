use log::{debug, info};
use ndarray::prelude::*;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::ellipse_functions::{check_finite, fit_mvee, EllipseFit, KhachiyanSettings, Matrix2x2};
use crate::error::{ClusterError, Result};
use crate::linalg::{LinearAlgebra, NalgebraBackend};
use crate::BOOTSTRAP_ITERATIONS;

/// Bootstrap-averaged best-fit ellipse of a cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EllipseParameters {
    pub center:   [f64; 2],
    /// `(minor, major)` labelled by decomposition order, each averaged separately.
    pub radii:    [f64; 2],
    /// Averaged rotation in slot layout `[[r00, r01], [r11, r10]]`.
    pub rotation: Matrix2x2,
    pub angle_deg: f64,
    /// Resamples that contributed to the average.
    pub samples:  usize,
    /// Resamples dropped because they were collinear or coincident.
    pub skipped:  usize,
}

/// Combines the rotation matrices of the individual resamples into one.
pub trait RotationAggregator: Send + Sync {
    fn aggregate(&self, rotations: &[Matrix2x2], linalg: &dyn LinearAlgebra) -> Result<Matrix2x2>;
}

/// Entry-by-entry mean of the rotation matrices.
///
/// The result is generally not orthonormal.
#[derive(Clone, Copy, Debug, Default)]
pub struct ElementwiseMean;

/// Elementwise mean projected onto the nearest orthogonal matrix (`U V^T`).
#[derive(Clone, Copy, Debug, Default)]
pub struct OrthogonalMean;

fn mean_matrix(rotations: &[Matrix2x2]) -> Result<Matrix2x2> {
    if rotations.is_empty() {
        return Err(ClusterError::DegenerateGeometry(
            "no rotations to aggregate".to_string(),
        ));
    }
    let mut sum = [[0.0; 2]; 2];
    for r in rotations {
        for i in 0..2 {
            for j in 0..2 {
                sum[i][j] += r[i][j];
            }
        }
    }
    let count = rotations.len() as f64;
    Ok(sum.map(|row| row.map(|v| v / count)))
}

impl RotationAggregator for ElementwiseMean {
    fn aggregate(&self, rotations: &[Matrix2x2], _linalg: &dyn LinearAlgebra) -> Result<Matrix2x2> {
        mean_matrix(rotations)
    }
}

impl RotationAggregator for OrthogonalMean {
    fn aggregate(&self, rotations: &[Matrix2x2], linalg: &dyn LinearAlgebra) -> Result<Matrix2x2> {
        let mean = mean_matrix(rotations)?;
        let m = array![[mean[0][0], mean[0][1]], [mean[1][0], mean[1][1]]];
        let svd = linalg.svd(m.view()).ok_or_else(|| {
            ClusterError::DegenerateGeometry("SVD of the mean rotation failed".to_string())
        })?;
        let r = svd.u.dot(&svd.v_t);
        Ok([[r[[0, 0]], r[[0, 1]]], [r[[1, 0]], r[[1, 1]]]])
    }
}

/// Rearranges a rotation matrix into the slot layout `[[r00, r01], [r11, r10]]` used for
/// reporting.
pub fn slot_layout(r: &Matrix2x2) -> Matrix2x2 {
    [[r[0][0], r[0][1]], [r[1][1], r[1][0]]]
}

/// Rotation angle in degrees from a slot-layout matrix.
///
/// `acos` of the first entry, negated unless the lower-left slot is positive.
pub fn rotation_angle_deg(slots: &Matrix2x2) -> f64 {
    let alpha = slots[0][0].clamp(-1.0, 1.0).acos().to_degrees();
    if slots[1][0] > 0.0 {
        alpha
    } else {
        -alpha
    }
}

/// Bootstrap-averaged minimum-volume enclosing ellipse.
///
/// Each iteration draws a resample of the input points with replacement, fits it with
/// [`fit_mvee`], and the centres, radii and rotations are averaged over all resamples.
/// Resamples that turn out collinear or coincident are skipped.
pub struct BootstrapAggregator<L = NalgebraBackend, R = ElementwiseMean> {
    pub iterations: usize,
    pub settings:   KhachiyanSettings,
    pub linalg:     L,
    pub rotation:   R,
}

impl Default for BootstrapAggregator {
    fn default() -> Self {
        Self {
            iterations: BOOTSTRAP_ITERATIONS,
            settings: KhachiyanSettings::default(),
            linalg: NalgebraBackend,
            rotation: ElementwiseMean,
        }
    }
}

impl BootstrapAggregator {
    pub fn new(iterations: usize, settings: KhachiyanSettings) -> Self {
        Self {
            iterations,
            settings,
            ..Self::default()
        }
    }
}

impl<L: LinearAlgebra, R: RotationAggregator> BootstrapAggregator<L, R> {
    /// Swaps the rotation aggregation strategy.
    pub fn with_rotation<R2: RotationAggregator>(self, rotation: R2) -> BootstrapAggregator<L, R2> {
        BootstrapAggregator {
            iterations: self.iterations,
            settings: self.settings,
            linalg: self.linalg,
            rotation,
        }
    }

    /// Fits the averaged ellipse of an `N x 2` point array.
    ///
    /// Resample indices are drawn from `rng` in order before the fits run in parallel,
    /// so a seeded generator gives identical results on every run.
    ///
    /// # Errors
    ///
    /// * `InvalidCluster` if any input coordinate is NaN or infinite. The whole fit
    ///   fails instead of averaging only the resamples that miss the bad point.
    /// * `DegenerateGeometry` if fewer than three points are given, every resample is
    ///   degenerate or no iterations are requested.
    /// * `Convergence` if any resample exceeds the iteration cap.
    pub fn fit<G: Rng + ?Sized>(&self, points: ArrayView2<'_, f64>, rng: &mut G) -> Result<EllipseParameters> {
        let n = points.nrows();
        if n < 3 {
            return Err(ClusterError::DegenerateGeometry(format!(
                "an enclosing ellipse needs at least 3 points, got {n}; no resample can be fitted"
            )));
        }
        check_finite(points)?;

        let resamples: Vec<Vec<usize>> = (0..self.iterations)
            .map(|_| (0..n).map(|_| rng.random_range(0..n)).collect())
            .collect();

        let fits: Vec<Result<EllipseFit>> = resamples
            .par_iter()
            .map(|indices| {
                let sample = points.select(Axis(0), indices);
                fit_mvee(sample.view(), &self.settings, &self.linalg)
            })
            .collect();

        let mut accepted = Vec::with_capacity(fits.len());
        let mut skipped = 0;
        for (i, fit) in fits.into_iter().enumerate() {
            match fit {
                Ok(fit) => accepted.push(fit),
                Err(ClusterError::DegenerateGeometry(reason)) => {
                    debug!("skipping bootstrap sample {i}: {reason}");
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if accepted.is_empty() {
            return Err(ClusterError::DegenerateGeometry(format!(
                "all {} bootstrap samples were degenerate",
                self.iterations
            )));
        }

        let count = accepted.len() as f64;
        let mut center = [0.0; 2];
        let mut radii = [0.0; 2];
        for fit in &accepted {
            for k in 0..2 {
                center[k] += fit.center[k];
                radii[k] += fit.radii[k];
            }
        }
        let center = center.map(|v| v / count);
        let radii = radii.map(|v| v / count);

        let rotations: Vec<Matrix2x2> = accepted.iter().map(|fit| fit.rotation).collect();
        let rotation = slot_layout(&self.rotation.aggregate(&rotations, &self.linalg)?);
        let angle_deg = rotation_angle_deg(&rotation);

        info!(
            "bootstrap ellipse from {} samples ({} skipped): radii {:.3} / {:.3} m, angle {:.2} deg",
            accepted.len(),
            skipped,
            radii[0],
            radii[1],
            angle_deg
        );

        Ok(EllipseParameters {
            center,
            radii,
            rotation,
            angle_deg,
            samples: accepted.len(),
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_1_SQRT_2;

    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    use super::*;

    fn scattered() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [120.0, 15.0],
            [-80.0, 40.0],
            [30.0, -60.0],
            [200.0, 90.0],
            [-150.0, -20.0],
            [60.0, 110.0],
            [10.0, -130.0]
        ]
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let points = scattered();
        let aggregator = BootstrapAggregator::default();
        let a = aggregator
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(42))
            .unwrap();
        let b = aggregator
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.samples + a.skipped, BOOTSTRAP_ITERATIONS);
    }

    #[test]
    fn test_default_iteration_count() {
        assert_eq!(BootstrapAggregator::default().iterations, 301);
    }

    #[test]
    fn test_average_radii_are_positive_and_bounded() {
        let points = scattered();
        let ellipse = BootstrapAggregator::default()
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(7))
            .unwrap();
        for r in ellipse.radii {
            assert!(r > 0.0 && r.is_finite());
            // No resample ellipse is larger than the one around the full set by much
            assert!(r < 1000.0);
        }
        assert!(ellipse.angle_deg.abs() <= 180.0);
    }

    #[test]
    fn test_parameters_are_means_of_resample_fits() {
        let points = scattered();
        let n = points.nrows();
        let rng = ChaCha12Rng::seed_from_u64(2024);
        let aggregator = BootstrapAggregator::new(2, KhachiyanSettings::default());
        let ellipse = aggregator.fit(points.view(), &mut rng.clone()).unwrap();

        let mut replay = rng;
        let fits: Vec<EllipseFit> = (0..2)
            .map(|_| {
                let indices: Vec<usize> = (0..n).map(|_| replay.random_range(0..n)).collect();
                let sample = points.select(Axis(0), &indices);
                fit_mvee(sample.view(), &KhachiyanSettings::default(), &NalgebraBackend).unwrap()
            })
            .collect();

        assert_eq!(ellipse.samples, 2);
        assert_eq!(ellipse.skipped, 0);
        for k in 0..2 {
            assert_relative_eq!(
                ellipse.center[k],
                (fits[0].center[k] + fits[1].center[k]) / 2.0,
                epsilon = 1e-12
            );
            assert_relative_eq!(
                ellipse.radii[k],
                (fits[0].radii[k] + fits[1].radii[k]) / 2.0,
                epsilon = 1e-12
            );
        }
        let a = slot_layout(&fits[0].rotation);
        let b = slot_layout(&fits[1].rotation);
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(ellipse.rotation[i][j], (a[i][j] + b[i][j]) / 2.0, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(ellipse.angle_deg, rotation_angle_deg(&ellipse.rotation));
    }

    #[test]
    fn test_non_finite_point_fails_whole_fit() {
        let mut points = scattered();
        points[[5, 0]] = f64::NAN;
        let err = BootstrapAggregator::default()
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(11))
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidCluster(_)));
    }

    #[test]
    fn test_fewer_than_three_points_fail_up_front() {
        let points = array![[0.0, 0.0], [5.0, 1.0]];
        let err = BootstrapAggregator::default()
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(1))
            .unwrap_err();
        match err {
            ClusterError::DegenerateGeometry(reason) => assert!(reason.contains("at least 3 points")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_all_degenerate_samples_fail() {
        let points = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 5.0], [6.0, 6.0]];
        let err = BootstrapAggregator::new(20, KhachiyanSettings::default())
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, ClusterError::DegenerateGeometry(_)));
    }

    #[test]
    fn test_elementwise_mean_is_not_orthogonalised() {
        let identity = [[1.0, 0.0], [0.0, 1.0]];
        let quarter = [[0.0, -1.0], [1.0, 0.0]];
        let mean = ElementwiseMean
            .aggregate(&[identity, quarter], &NalgebraBackend)
            .unwrap();
        assert_eq!(mean, [[0.5, -0.5], [0.5, 0.5]]);

        let orthogonal = OrthogonalMean
            .aggregate(&[identity, quarter], &NalgebraBackend)
            .unwrap();
        assert_relative_eq!(orthogonal[0][0], FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(orthogonal[0][1], -FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(orthogonal[1][0], FRAC_1_SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(orthogonal[1][1], FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_slot_layout_and_angle() {
        let theta = 30f64.to_radians();
        let r = [[theta.cos(), -theta.sin()], [theta.sin(), theta.cos()]];
        let slots = slot_layout(&r);
        assert_eq!(slots, [[r[0][0], r[0][1]], [r[1][1], r[1][0]]]);
        assert_relative_eq!(rotation_angle_deg(&slots), 30.0, epsilon = 1e-9);

        let flipped = [[theta.cos(), 0.0], [-0.2, 0.0]];
        assert_relative_eq!(rotation_angle_deg(&flipped), -30.0, epsilon = 1e-9);
        assert_relative_eq!(rotation_angle_deg(&[[theta.cos(), 0.0], [0.0, 0.0]]), -30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orthogonal_strategy_plugs_in() {
        let points = scattered();
        let aggregator = BootstrapAggregator::default().with_rotation(OrthogonalMean);
        let ellipse = aggregator
            .fit(points.view(), &mut ChaCha12Rng::seed_from_u64(3))
            .unwrap();
        let [[a, b], [d, c]] = ellipse.rotation;
        assert_relative_eq!(a * a + b * b, 1.0, epsilon = 1e-9);
        assert_relative_eq!(c * c + d * d, 1.0, epsilon = 1e-9);
    }
}
