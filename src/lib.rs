//! Morphometry of impact crater clusters.
//!
//! Given the craters of one cluster and the centre of the image they were mapped on,
//! [`ClusterAnalyzer`] projects the craters onto a local plane and reports the effective
//! diameter, the F-value, the dispersion of crater separations and a bootstrap-averaged
//! minimum-volume enclosing ellipse.

pub mod analysis;
pub mod bootstrap_functions;
pub mod config;
pub mod crater;
pub mod ellipse_functions;
pub mod error;
pub mod linalg;
pub mod projection_functions;
pub mod statistics_functions;
pub mod table;

pub use analysis::{ClusterAnalyzer, ClusterReport};
pub use bootstrap_functions::{BootstrapAggregator, EllipseParameters};
pub use config::AnalysisConfig;
pub use crater::{CenterPoint, Cluster, Crater};
pub use error::{ClusterError, Result};

/// Mean radius of Mars in metres.
pub const MARS_RADIUS_M: f64 = 3_390_000.0;

/// Default convergence tolerance of the Khachiyan iteration.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Default cap on Khachiyan weight updates per fit.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Number of bootstrap resamples averaged into the reported ellipse.
pub const BOOTSTRAP_ITERATIONS: usize = 301;

pub const DISPERSION_MIN_CRATERS: usize = 3;
pub const ELLIPSE_MIN_CRATERS: usize = 5;

const VSMALL: f64 = 10.0 * f64::EPSILON;
