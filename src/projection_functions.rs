use std::f64::consts::PI;

use ndarray::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use crate::crater::{CenterPoint, Cluster};

/// Crater position in local planar metres about a reference centre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub x_m: f64,
    pub y_m: f64,
}

/// Projects one latitude/longitude pair (degrees) onto the local tangent plane.
///
/// `x` runs along latitude and `y` along longitude. The longitude term is scaled by
/// `sin(90° - lat)` of the point's own latitude rather than the centre latitude, so
/// this is a local approximation and not a true equirectangular projection.
/// Non-finite input propagates as NaN.
#[inline]
pub fn project_point(lat_deg: f64, lon_deg: f64, center: &CenterPoint, radius: f64) -> ProjectedPoint {
    let scale = radius * (PI / 180.0);
    ProjectedPoint {
        x_m: (lat_deg - center.lat_deg) * scale,
        y_m: (lon_deg - center.lon_deg) * scale * (90.0 - lat_deg).to_radians().sin(),
    }
}

/// Projects every crater of a cluster, preserving order.
pub fn project(cluster: &Cluster, center: &CenterPoint, radius: f64) -> Vec<ProjectedPoint> {
    cluster
        .craters()
        .iter()
        .map(|c| project_point(c.lat_deg(), c.lon_deg(), center, radius))
        .collect()
}

/// Projects coordinate columns in parallel, returning the `x` and `y` columns.
pub fn project_coordinates(
    lat: ArrayView1<'_, f64>,
    lon: ArrayView1<'_, f64>,
    center: &CenterPoint,
    radius: f64,
) -> Result<(Array1<f64>, Array1<f64>), String> {
    if lat.len() != lon.len() {
        return Err("lat and lon arrays must be the same size.".to_string());
    }
    let (x, y): (Vec<f64>, Vec<f64>) = (0..lat.len())
        .into_par_iter()
        .map(|i| {
            let p = project_point(lat[i], lon[i], center, radius);
            (p.x_m, p.y_m)
        })
        .unzip();
    Ok((Array1::from(x), Array1::from(y)))
}

/// Stacks projected points into an `N x 2` array for the ellipse fit.
pub fn points_to_array(points: &[ProjectedPoint]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 2), |(i, j)| {
        if j == 0 {
            points[i].x_m
        } else {
            points[i].y_m
        }
    })
}
