use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::crater::{round_to, Cluster};
use crate::error::{ClusterError, Result};
use crate::projection_functions::ProjectedPoint;

/// Rounding applied to the effective diameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiameterRounding {
    /// Round to a number of decimal places (metres).
    DecimalPlaces(u32),
    /// Round to a number of significant figures.
    SignificantFigures(u32),
}

impl Default for DiameterRounding {
    fn default() -> Self {
        DiameterRounding::DecimalPlaces(3)
    }
}

impl DiameterRounding {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            DiameterRounding::DecimalPlaces(places) => round_to(value, places as i32),
            DiameterRounding::SignificantFigures(sig) => {
                if value == 0.0 || !value.is_finite() {
                    return value;
                }
                let magnitude = value.abs().log10().floor() as i32;
                round_to(value, sig as i32 - magnitude - 1)
            }
        }
    }
}

/// How crater pairs are enumerated when collecting separations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingScheme {
    /// Every `(n, m)` with `n` over all craters and `m` over craters `1..len`.
    ///
    /// Most unordered pairs are counted twice and each crater except the first is
    /// paired with itself once (separation 0). Dispersion values published from the
    /// mapped cluster catalogue use this enumeration.
    #[default]
    LegacyOrderedOverlap,
    /// Each unordered pair `n < m` exactly once.
    UniqueUnordered,
}

impl PairingScheme {
    /// Index pairs for a set of `len` points.
    pub fn pairs(&self, len: usize) -> Vec<(usize, usize)> {
        match self {
            PairingScheme::LegacyOrderedOverlap => {
                (0..len).cartesian_product(1..len).collect()
            }
            PairingScheme::UniqueUnordered => (0..len).tuple_combinations().collect(),
        }
    }
}

/// Largest crater and the share of craters at least half its size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FValue {
    pub largest_diameter: f64,
    /// Craters with diameter `>= largest_diameter / 2`; always at least 1.
    pub n_above_half:     usize,
    pub total:            usize,
    pub f:                f64,
}

/// Cube root of the summed cubed diameters, rounded with `rounding`.
pub fn effective_diameter(cluster: &Cluster, rounding: DiameterRounding) -> f64 {
    let cubed: f64 = cluster.diameters().map(|d| d.powi(3)).sum();
    rounding.apply(cubed.cbrt())
}

pub fn f_value(cluster: &Cluster) -> FValue {
    let largest_diameter = cluster.diameters().fold(f64::MIN, f64::max);
    let half = largest_diameter / 2.0;
    let n_above_half = cluster.diameters().filter(|&d| d >= half).count();
    let total = cluster.len();
    FValue {
        largest_diameter,
        n_above_half,
        total,
        f: n_above_half as f64 / total as f64,
    }
}

/// Euclidean separations between projected craters under the given pairing.
pub fn pairwise_separations(points: &[ProjectedPoint], scheme: PairingScheme) -> Vec<f64> {
    scheme
        .pairs(points.len())
        .into_iter()
        .map(|(n, m)| {
            let dx = points[m].x_m - points[n].x_m;
            let dy = points[m].y_m - points[n].y_m;
            (dx * dx + dy * dy).sqrt()
        })
        .collect()
}

/// Population standard deviation of the pairwise crater separations.
///
/// # Errors
///
/// Returns `InvalidCluster` for fewer than two points, where no separation exists.
pub fn dispersion(points: &[ProjectedPoint], scheme: PairingScheme) -> Result<f64> {
    if points.len() < 2 {
        return Err(ClusterError::InvalidCluster(format!(
            "dispersion needs at least 2 craters, got {}",
            points.len()
        )));
    }
    let separations = pairwise_separations(points, scheme);
    let count = separations.len() as f64;
    let mean = separations.iter().sum::<f64>() / count;
    let variance = separations.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;
    Ok(variance.sqrt())
}
