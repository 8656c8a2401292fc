use pyo3::prelude::*;
use pyo3::exceptions::PyValueError;
use pyo3::types::PyDict;
use numpy::{PyArray1, PyReadonlyArray1};
use numpy::ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use cratercluster::bootstrap_functions::{BootstrapAggregator, EllipseParameters};
use cratercluster::ellipse_functions::KhachiyanSettings;
use cratercluster::{AnalysisConfig, CenterPoint, ClusterAnalyzer, ClusterError, Cluster};


fn to_py_err(err: ClusterError) -> PyErr {
    PyErr::new::<PyValueError, _>(err.to_string())
}

fn set_ellipse_items(dict: &Bound<'_, PyDict>, ellipse: &EllipseParameters) -> PyResult<()> {
    dict.set_item("R1", ellipse.radii[0])?;
    dict.set_item("R2", ellipse.radii[1])?;
    dict.set_item("centre_x", ellipse.center[0])?;
    dict.set_item("centre_y", ellipse.center[1])?;
    dict.set_item("rotation_angle", ellipse.angle_deg)?;
    dict.set_item("rotation_matrix", ellipse.rotation.map(|row| row.to_vec()).to_vec())?;
    Ok(())
}

/// Measures a crater cluster and returns its parameter record.
///
/// # Arguments
///
/// * `cluster_id` - Observation label of the cluster, normally the HiRISE image ID.
/// * `diameter_km` - Crater diameters in kilometres.
/// * `lat`, `lon` - Crater coordinates in degrees.
/// * `lat_c`, `lon_c` - Centre of the image in degrees. Longitudes above 180 are wrapped.
/// * `seed` - Optional seed for the bootstrap resampling.
///
/// # Returns
///
/// A dict with the keys `HiRise_ID`, `Number_Craters`, `d_eff`, `d_max`, `N>D/2`,
/// `F_value`, `central_latitude` and `central_longitude`. `Dispersion` is added for more
/// than 3 craters, and `R1`, `R2`, `centre_x`, `centre_y`, `rotation_angle` and
/// `rotation_matrix` for more than 5.
#[pyfunction]
#[pyo3(signature = (cluster_id, diameter_km, lat, lon, lat_c, lon_c, seed=None))]
pub fn analyze_cluster<'py>(
    py: Python<'py>,
    cluster_id: &str,
    diameter_km: PyReadonlyArray1<'py, f64>,
    lat: PyReadonlyArray1<'py, f64>,
    lon: PyReadonlyArray1<'py, f64>,
    lat_c: f64,
    lon_c: f64,
    seed: Option<u64>,
) -> PyResult<Bound<'py, PyDict>> {
    let diameter_km_v = diameter_km.as_array().to_vec();
    let lat_v = lat.as_array().to_vec();
    let lon_v = lon.as_array().to_vec();
    let cluster = Cluster::from_km_columns(&diameter_km_v, &lat_v, &lon_v).map_err(to_py_err)?;
    let center = CenterPoint::new(lat_c, lon_c).map_err(to_py_err)?;

    let mut config = AnalysisConfig::default();
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    let report = py
        .allow_threads(|| ClusterAnalyzer::new(config).analyze(cluster_id, &cluster, center))
        .map_err(to_py_err)?;

    let dict = PyDict::new(py);
    dict.set_item("HiRise_ID", &report.id)?;
    dict.set_item("Number_Craters", report.crater_count)?;
    dict.set_item("d_eff", report.effective_diameter_m)?;
    dict.set_item("d_max", report.largest_diameter_m)?;
    dict.set_item("N>D/2", report.n_above_half_max)?;
    dict.set_item("F_value", report.f_value)?;
    dict.set_item("central_latitude", report.center.lat_deg)?;
    dict.set_item("central_longitude", report.center.lon_deg)?;
    if let Some(dispersion) = report.dispersion_m {
        dict.set_item("Dispersion", dispersion)?;
    }
    if let Some(ellipse) = &report.ellipse {
        set_ellipse_items(&dict, ellipse)?;
    }
    Ok(dict)
}

/// Projects crater coordinates onto the local plane about an image centre.
///
/// # Arguments
/// * `lat`, `lon` - Crater coordinates in degrees.
/// * `lat_c`, `lon_c` - Centre of the image in degrees.
/// * `radius` - Planetary radius in meters.
///
/// # Returns
/// Tuple of NumPy arrays `(x, y)` in meters.
#[pyfunction]
pub fn project_coordinates<'py>(
    py: Python<'py>,
    lat: PyReadonlyArray1<'py, f64>,
    lon: PyReadonlyArray1<'py, f64>,
    lat_c: f64,
    lon_c: f64,
    radius: f64,
) -> PyResult<(Bound<'py, PyArray1<f64>>, Bound<'py, PyArray1<f64>>)> {
    let lat_v = lat.as_array();
    let lon_v = lon.as_array();
    let center = CenterPoint::new(lat_c, lon_c).map_err(to_py_err)?;
    let (x, y) = cratercluster::projection_functions::project_coordinates(
            lat_v,
            lon_v,
            &center,
            radius
        )
        .map_err(|msg| PyErr::new::<PyValueError, _>(msg))?;
    Ok((PyArray1::from_owned_array(py, x), PyArray1::from_owned_array(py, y)))
}

/// Bootstrap-averaged minimum-volume enclosing ellipse of planar points.
///
/// # Arguments
/// * `x`, `y` - Point coordinates in meters.
/// * `iterations` - Number of bootstrap resamples.
/// * `tolerance` - Convergence tolerance of the Khachiyan iteration.
/// * `seed` - Optional seed for the resampling.
///
/// # Returns
/// A dict with `R1`, `R2`, `centre_x`, `centre_y`, `rotation_angle` and `rotation_matrix`.
#[pyfunction]
#[pyo3(signature = (x, y, iterations=301, tolerance=0.1, seed=None))]
pub fn best_fit_ellipse<'py>(
    py: Python<'py>,
    x: PyReadonlyArray1<'py, f64>,
    y: PyReadonlyArray1<'py, f64>,
    iterations: usize,
    tolerance: f64,
    seed: Option<u64>,
) -> PyResult<Bound<'py, PyDict>> {
    let x_v = x.as_array();
    let y_v = y.as_array();
    if x_v.len() != y_v.len() {
        return Err(PyValueError::new_err(
            "x and y arrays must be the same size.",
        ));
    }
    let points = Array2::from_shape_fn((x_v.len(), 2), |(i, j)| if j == 0 { x_v[i] } else { y_v[i] });

    let settings = KhachiyanSettings {
        tolerance,
        ..KhachiyanSettings::default()
    };
    let mut rng = match seed {
        Some(seed) => ChaCha12Rng::seed_from_u64(seed),
        None => ChaCha12Rng::from_rng(&mut rand::rng()),
    };
    let ellipse = py
        .allow_threads(|| BootstrapAggregator::new(iterations, settings).fit(points.view(), &mut rng))
        .map_err(to_py_err)?;

    let dict = PyDict::new(py);
    set_ellipse_items(&dict, &ellipse)?;
    Ok(dict)
}
