use serde::{Deserialize, Serialize};

use crate::ellipse_functions::KhachiyanSettings;
use crate::statistics_functions::{DiameterRounding, PairingScheme};
use crate::{
    BOOTSTRAP_ITERATIONS, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE, DISPERSION_MIN_CRATERS,
    ELLIPSE_MIN_CRATERS, MARS_RADIUS_M,
};

/// Tunables for one cluster analysis.
///
/// The defaults reproduce the published Mars cluster measurements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Planetary radius used by the projection, metres.
    pub planet_radius_m:       f64,
    pub tolerance:             f64,
    pub max_iterations:        usize,
    pub bootstrap_iterations:  usize,
    pub pairing:               PairingScheme,
    pub rounding:              DiameterRounding,
    /// Dispersion is reported for clusters with more craters than this.
    pub dispersion_min_craters: usize,
    /// The ellipse is fitted for clusters with more craters than this.
    pub ellipse_min_craters:   usize,
    /// Seed for the resampling generator; `None` draws a fresh seed per run.
    pub seed:                  Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            planet_radius_m: MARS_RADIUS_M,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            bootstrap_iterations: BOOTSTRAP_ITERATIONS,
            pairing: PairingScheme::default(),
            rounding: DiameterRounding::default(),
            dispersion_min_craters: DISPERSION_MIN_CRATERS,
            ellipse_min_craters: ELLIPSE_MIN_CRATERS,
            seed: None,
        }
    }
}

impl AnalysisConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pairing(mut self, pairing: PairingScheme) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_rounding(mut self, rounding: DiameterRounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_planet_radius(mut self, planet_radius_m: f64) -> Self {
        self.planet_radius_m = planet_radius_m;
        self
    }

    pub fn with_bootstrap_iterations(mut self, iterations: usize) -> Self {
        self.bootstrap_iterations = iterations;
        self
    }

    pub fn khachiyan(&self) -> KhachiyanSettings {
        KhachiyanSettings {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
        }
    }
}
