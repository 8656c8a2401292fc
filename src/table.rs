//! Reading mapped crater tables.
//!
//! Tables come from GIS exports with one row per crater. Only the diameter and
//! coordinate columns are used; any other column is ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::crater::{Cluster, Crater};
use crate::error::{ClusterError, Result};

#[derive(Debug, Deserialize)]
struct CraterRecord {
    #[serde(rename = "Diam_km")]
    diameter_km: f64,
    #[serde(rename = "x_coord")]
    lat_deg:     f64,
    #[serde(rename = "y_coord")]
    lon_deg:     f64,
    #[serde(rename = "crater_no", default)]
    crater_no:   Option<u32>,
}

/// A cluster together with the observation it was mapped on.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterTable {
    pub id:      String,
    pub cluster: Cluster,
}

/// Observation label for a table path: the file name up to its first dot.
pub fn observation_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.split('.').next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Parses crater rows from CSV data.
///
/// Craters are numbered from `crater_no` when the column is present, otherwise from 1
/// in row order.
pub fn read_cluster<R: Read>(reader: R) -> Result<Cluster> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let craters = csv_reader
        .deserialize::<CraterRecord>()
        .enumerate()
        .map(|(row, record)| {
            let record = record?;
            let index = record.crater_no.unwrap_or(row as u32 + 1);
            Crater::from_km(index, record.diameter_km, record.lat_deg, record.lon_deg)
        })
        .collect::<Result<Vec<_>>>()?;
    Cluster::new(craters)
}

/// Reads a cluster table named after its observation, e.g. `ESP_017425_2045.csv`.
pub fn read_cluster_csv(path: impl AsRef<Path>) -> Result<ClusterTable> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ClusterError::InvalidTable(format!(
            "{} is not a csv file",
            path.display()
        )));
    }
    let id = observation_id(path).ok_or_else(|| {
        ClusterError::InvalidTable(format!("cannot derive an observation id from {}", path.display()))
    })?;
    let cluster = read_cluster(File::open(path)?)?;
    Ok(ClusterTable { id, cluster })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TABLE: &str = "\
FID,crater_no,Diam_km,x_coord,y_coord,tag
0,1,0.0123,20.501,134.2001,a
1,2,0.0081,20.502,134.2003,b
2,3,0.00456,20.5005,134.2,c
";

    #[test]
    fn test_read_cluster_ignores_extra_columns() {
        let cluster = read_cluster(TABLE.as_bytes()).unwrap();
        assert_eq!(cluster.len(), 3);
        let first = cluster.craters()[0];
        assert_eq!(first.index(), 1);
        assert_eq!(first.diameter_m(), 12.3);
        assert_eq!(first.lat_deg(), 20.501);
        assert_eq!(first.lon_deg(), 134.2001);
        assert_eq!(cluster.craters()[2].diameter_m(), 4.56);
    }

    #[test]
    fn test_read_cluster_without_crater_numbers() {
        let data = "Diam_km,x_coord,y_coord\n0.01,1.0,2.0\n0.02,1.1,2.1\n";
        let cluster = read_cluster(data.as_bytes()).unwrap();
        assert_eq!(cluster.craters()[1].index(), 2);
    }

    #[test]
    fn test_read_cluster_rejects_bad_rows() {
        let missing = "Diam_km,x_coord\n0.01,1.0\n";
        assert!(matches!(read_cluster(missing.as_bytes()), Err(ClusterError::Csv(_))));

        let zero = "Diam_km,x_coord,y_coord\n0.0,1.0,2.0\n";
        assert!(matches!(
            read_cluster(zero.as_bytes()),
            Err(ClusterError::InvalidCluster(_))
        ));

        let empty = "Diam_km,x_coord,y_coord\n";
        assert!(matches!(
            read_cluster(empty.as_bytes()),
            Err(ClusterError::InvalidCluster(_))
        ));
    }

    #[test]
    fn test_observation_id() {
        assert_eq!(
            observation_id(Path::new("data/ESP_017425_2045.csv")).as_deref(),
            Some("ESP_017425_2045")
        );
        assert_eq!(
            observation_id(Path::new("ESP_050154_1750.RED.csv")).as_deref(),
            Some("ESP_050154_1750")
        );
    }

    #[test]
    fn test_read_cluster_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ESP_017425_2045.csv");
        File::create(&path).unwrap().write_all(TABLE.as_bytes()).unwrap();

        let table = read_cluster_csv(&path).unwrap();
        assert_eq!(table.id, "ESP_017425_2045");
        assert_eq!(table.cluster.len(), 3);
    }

    #[test]
    fn test_read_cluster_csv_rejects_spreadsheets() {
        assert!(matches!(
            read_cluster_csv("ESP_017425_2045.xlsx"),
            Err(ClusterError::InvalidTable(_))
        ));
    }
}
