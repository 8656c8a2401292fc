use std::fmt;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::Serialize;

use crate::bootstrap_functions::{BootstrapAggregator, ElementwiseMean, EllipseParameters, RotationAggregator};
use crate::config::AnalysisConfig;
use crate::crater::{CenterPoint, Cluster};
use crate::error::Result;
use crate::linalg::NalgebraBackend;
use crate::projection_functions::{points_to_array, project};
use crate::statistics_functions::{dispersion, effective_diameter, f_value};

/// Morphometric summary of one crater cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterReport {
    /// Observation label, normally the HiRISE image ID.
    pub id:                   String,
    pub crater_count:         usize,
    pub center:               CenterPoint,
    pub effective_diameter_m: f64,
    pub largest_diameter_m:   f64,
    pub n_above_half_max:     usize,
    pub f_value:              f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispersion_m:         Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ellipse:              Option<EllipseParameters>,
}

impl fmt::Display for ClusterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.id)?;
        writeln!(f, "largest Diameter:{}", self.largest_diameter_m)?;
        writeln!(f, "effective Diameter:{}", self.effective_diameter_m)?;
        writeln!(f, "F value:{}", self.f_value)?;
        writeln!(f, "N > D/2:{}", self.n_above_half_max)?;
        if let Some(dispersion) = self.dispersion_m {
            writeln!(f, "Dispersion(m):{dispersion}")?;
        }
        if let Some(ellipse) = &self.ellipse {
            write!(
                f,
                "Radii of best fit Ellipse:{} {}",
                ellipse.radii[0], ellipse.radii[1]
            )?;
        }
        Ok(())
    }
}

/// Runs the full measurement pipeline for a cluster.
pub struct ClusterAnalyzer<R = ElementwiseMean> {
    config:   AnalysisConfig,
    rotation: R,
}

impl Default for ClusterAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl ClusterAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            rotation: ElementwiseMean,
        }
    }
}

impl<R: RotationAggregator + Clone> ClusterAnalyzer<R> {
    pub fn with_rotation<R2: RotationAggregator + Clone>(self, rotation: R2) -> ClusterAnalyzer<R2> {
        ClusterAnalyzer {
            config: self.config,
            rotation,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyses a cluster with a generator seeded from the configuration, or from
    /// entropy when no seed is set.
    pub fn analyze(&self, id: &str, cluster: &Cluster, center: CenterPoint) -> Result<ClusterReport> {
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::from_rng(&mut rand::rng()),
        };
        self.analyze_with_rng(id, cluster, center, &mut rng)
    }

    /// Analyses a cluster drawing bootstrap resamples from `rng`.
    ///
    /// Dispersion is only computed above `dispersion_min_craters` craters and the
    /// ellipse only above `ellipse_min_craters`; with the defaults a cluster of exactly
    /// five craters gets a dispersion but no ellipse.
    pub fn analyze_with_rng<G: Rng + ?Sized>(
        &self,
        id: &str,
        cluster: &Cluster,
        center: CenterPoint,
        rng: &mut G,
    ) -> Result<ClusterReport> {
        let crater_count = cluster.len();
        let points = project(cluster, &center, self.config.planet_radius_m);

        let effective_diameter_m = effective_diameter(cluster, self.config.rounding);
        let fv = f_value(cluster);

        let dispersion_m = if crater_count > self.config.dispersion_min_craters {
            Some(dispersion(&points, self.config.pairing)?)
        } else {
            debug!("{id}: {crater_count} craters, dispersion not computed");
            None
        };

        let ellipse = if crater_count > self.config.ellipse_min_craters {
            let aggregator = BootstrapAggregator {
                iterations: self.config.bootstrap_iterations,
                settings: self.config.khachiyan(),
                linalg: NalgebraBackend,
                rotation: self.rotation.clone(),
            };
            Some(aggregator.fit(points_to_array(&points).view(), rng)?)
        } else {
            debug!("{id}: {crater_count} craters, best-fit ellipse not computed");
            None
        };

        info!(
            "{id}: {crater_count} craters, d_eff {effective_diameter_m} m, F {:.3}",
            fv.f
        );

        Ok(ClusterReport {
            id: id.to_string(),
            crater_count,
            center,
            effective_diameter_m,
            largest_diameter_m: fv.largest_diameter,
            n_above_half_max: fv.n_above_half,
            f_value: fv.f,
            dispersion_m,
            ellipse,
        })
    }
}
