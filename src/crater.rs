use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};

/// A single crater measured in orbital imagery.
///
/// Diameters are in metres, coordinates in degrees of latitude and longitude. Fields are
/// only reachable through [`Crater::new`] so every crater carries a positive diameter and
/// finite coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Crater {
    index:      u32,
    diameter_m: f64,
    lat_deg:    f64,
    lon_deg:    f64,
}

impl Crater {
    pub fn new(index: u32, diameter_m: f64, lat_deg: f64, lon_deg: f64) -> Result<Self> {
        if !diameter_m.is_finite() || diameter_m <= 0.0 {
            return Err(ClusterError::InvalidCluster(format!(
                "crater {index} has non-positive diameter {diameter_m}"
            )));
        }
        if !lat_deg.is_finite() || !lon_deg.is_finite() {
            return Err(ClusterError::InvalidCluster(format!(
                "crater {index} has non-finite coordinates ({lat_deg}, {lon_deg})"
            )));
        }
        Ok(Self {
            index,
            diameter_m,
            lat_deg,
            lon_deg,
        })
    }

    /// Builds a crater from a diameter given in kilometres.
    ///
    /// The metric diameter is rounded to centimetres, matching the precision of the
    /// mapped crater tables.
    pub fn from_km(index: u32, diameter_km: f64, lat_deg: f64, lon_deg: f64) -> Result<Self> {
        Self::new(index, round_to(diameter_km * 1000.0, 2), lat_deg, lon_deg)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn diameter_m(&self) -> f64 {
        self.diameter_m
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat_deg
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon_deg
    }
}

/// An ordered, non-empty group of craters sharing one observation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cluster {
    craters: Vec<Crater>,
}

impl Cluster {
    pub fn new(craters: Vec<Crater>) -> Result<Self> {
        if craters.is_empty() {
            return Err(ClusterError::InvalidCluster(
                "a cluster needs at least one crater".to_string(),
            ));
        }
        Ok(Self { craters })
    }

    /// Builds a cluster from parallel arrays of kilometre diameters and coordinates.
    ///
    /// Craters are numbered from 1 in input order.
    pub fn from_km_columns(diameter_km: &[f64], lat_deg: &[f64], lon_deg: &[f64]) -> Result<Self> {
        if diameter_km.len() != lat_deg.len() || diameter_km.len() != lon_deg.len() {
            return Err(ClusterError::InvalidCluster(format!(
                "column lengths differ: {} diameters, {} latitudes, {} longitudes",
                diameter_km.len(),
                lat_deg.len(),
                lon_deg.len()
            )));
        }
        let craters = diameter_km
            .iter()
            .zip(lat_deg)
            .zip(lon_deg)
            .enumerate()
            .map(|(i, ((&d, &lat), &lon))| Crater::from_km(i as u32 + 1, d, lat, lon))
            .collect::<Result<Vec<_>>>()?;
        Self::new(craters)
    }

    pub fn craters(&self) -> &[Crater] {
        &self.craters
    }

    pub fn len(&self) -> usize {
        self.craters.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.craters.is_empty()
    }

    pub fn diameters(&self) -> impl Iterator<Item = f64> + '_ {
        self.craters.iter().map(|c| c.diameter_m)
    }
}

/// Reference point about which crater coordinates are projected, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CenterPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl CenterPoint {
    /// Validates an image centre.
    ///
    /// Latitude must lie in [-180, 180] and longitude in [-360, 360]; eastern longitudes
    /// above 180 are wrapped into [-180, 180].
    pub fn new(lat_deg: f64, lon_deg: f64) -> Result<Self> {
        if !(-180.0..=180.0).contains(&lat_deg) {
            return Err(ClusterError::InvalidCenter(format!(
                "central latitude {lat_deg} is outside the allowed range"
            )));
        }
        if !(-360.0..=360.0).contains(&lon_deg) {
            return Err(ClusterError::InvalidCenter(format!(
                "central longitude {lon_deg} is outside the allowed range"
            )));
        }
        let lon_deg = if lon_deg > 180.0 { lon_deg - 360.0 } else { lon_deg };
        Ok(Self { lat_deg, lon_deg })
    }
}

/// Rounds to `decimals` places through the decimal representation.
///
/// Formatting rounds the exact binary value, so `0.0055` (stored just below the tie)
/// becomes `0.005`. Negative `decimals` round to tens, hundreds and so on.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if decimals >= 0 {
        let text = format!("{:.*}", decimals as usize, value);
        return text.parse().unwrap_or(value);
    }
    let scale = 10f64.powi(-decimals);
    let text = format!("{:.0}", value / scale);
    text.parse::<f64>().map_or(value, |v| v * scale)
}
