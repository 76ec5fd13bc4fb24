//! Builds the station list from map responses captured while browsing the fuel map.
//!
//! Captures are laid out as `<captures>/<city>/<query>.json`. Zooming in until the map
//! shows single stations rather than clusters yields entries with `totalPrices == 1`,
//! and only those are kept.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, info};

use super::Station;
use crate::helpers::natural_cmp;

pub const MAX_STATIONS_FILE: &str = "max_stations";

#[derive(thiserror::Error, Debug)]
pub enum StationCaptureError {
    #[error("Could not read {0}: {1}")]
    CouldNotRead(PathBuf, std::io::Error),

    #[error("Could not parse {0}: {1}")]
    CouldNotParse(PathBuf, serde_json::Error),

    #[error("No capture in {0} contained a list of stations")]
    NoCaptures(PathBuf),

    #[error("Could not write {0}: {1}")]
    CouldNotWrite(PathBuf, std::io::Error),

    #[error("{0} does not hold a station count")]
    InvalidMaxStations(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationCaptures {
    pub stations: Vec<Station>,

    /// Largest number of single stations any one captured query returned. The map API
    /// is not asked for more hash codes than this in one request.
    pub max_stations_per_query: usize,
}

fn sorted_entries(
    directory: &Path,
    want_dirs: bool,
) -> Result<Vec<PathBuf>, StationCaptureError> {
    let read = fs::read_dir(directory)
        .map_err(|e| StationCaptureError::CouldNotRead(directory.to_path_buf(), e))?;

    let mut entries = Vec::new();
    for entry in read {
        let path = entry
            .map_err(|e| StationCaptureError::CouldNotRead(directory.to_path_buf(), e))?
            .path();
        if path.is_dir() == want_dirs {
            entries.push(path);
        }
    }

    entries.sort_by(|a, b| {
        let a_name = a.file_name().unwrap_or_default().to_string_lossy();
        let b_name = b.file_name().unwrap_or_default().to_string_lossy();
        natural_cmp(&a_name, &b_name)
    });

    Ok(entries)
}

fn as_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number.as_i64().unwrap_or_default(),
        Some(Value::String(text)) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

/// Reads every capture below `captures_path`, returning the distinct stations (first
/// occurrence wins) and the per-query maximum station count.
pub fn read_station_captures(
    captures_path: &Path,
) -> Result<StationCaptures, StationCaptureError> {
    let mut stations = Vec::new();
    let mut seen = HashSet::new();
    let mut max_stations_per_query = None;

    for city in sorted_entries(captures_path, true)? {
        for query in sorted_entries(&city, false)? {
            let contents = fs::read_to_string(&query)
                .map_err(|e| StationCaptureError::CouldNotRead(query.clone(), e))?;
            let response: Value = serde_json::from_str(&contents)
                .map_err(|e| StationCaptureError::CouldNotParse(query.clone(), e))?;

            let Some(entries) = response.get("data").and_then(Value::as_array) else {
                debug!("Skipping {} as it holds no station list", query.display());
                continue;
            };

            let singles: Vec<&Value> =
                entries.iter().filter(|entry| as_count(entry.get("totalPrices")) == 1).collect();

            max_stations_per_query = Some(max_stations_per_query.unwrap_or(0).max(singles.len()));

            for entry in singles {
                let (Some(station_id), Some(geo_hash)) =
                    (as_text(entry.get("stationKey")), as_text(entry.get("geoHash")))
                else {
                    debug!("Skipping station without key or geo hash in {}", query.display());
                    continue;
                };

                if seen.insert(station_id.clone()) {
                    stations.push(Station {
                        station_id,
                        name: as_text(entry.get("stationName")),
                        geo_hash,
                    });
                }
            }
        }
    }

    let max_stations_per_query = max_stations_per_query
        .ok_or_else(|| StationCaptureError::NoCaptures(captures_path.to_path_buf()))?;

    info!(
        "Read {} stations from captures, at most {} per query",
        stations.len(),
        max_stations_per_query
    );

    Ok(StationCaptures { stations, max_stations_per_query })
}

pub fn write_max_stations(captures_path: &Path, count: usize) -> Result<(), StationCaptureError> {
    let path = captures_path.join(MAX_STATIONS_FILE);
    fs::write(&path, count.to_string()).map_err(|e| StationCaptureError::CouldNotWrite(path, e))
}

pub fn read_max_stations(captures_path: &Path) -> Result<usize, StationCaptureError> {
    let path = captures_path.join(MAX_STATIONS_FILE);
    let contents =
        fs::read_to_string(&path).map_err(|e| StationCaptureError::CouldNotRead(path.clone(), e))?;

    match contents.trim().parse::<usize>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(StationCaptureError::InvalidMaxStations(path)),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn write_capture(dir: &Path, city: &str, name: &str, body: &str) {
        let city_dir = dir.join(city);
        fs::create_dir_all(&city_dir).unwrap();
        fs::write(city_dir.join(name), body).unwrap();
    }

    #[test]
    fn test_reads_single_stations_and_max_count() {
        let dir = tempdir().unwrap();
        write_capture(
            dir.path(),
            "wellington",
            "query2.json",
            r#"{"data": [
                {"stationKey": "A1", "stationName": "Z Kilbirnie", "geoHash": "rbsm1", "totalPrices": 1},
                {"stationKey": "A2", "stationName": "BP Newtown", "geoHash": "rbsm2", "totalPrices": "1"},
                {"geoHash": "rbs", "totalPrices": 14}
            ]}"#,
        );
        write_capture(
            dir.path(),
            "wellington",
            "query10.json",
            r#"{"data": [
                {"stationKey": "A1", "stationName": "Z Kilbirnie (dup)", "geoHash": "rbsm1", "totalPrices": 1}
            ]}"#,
        );
        write_capture(dir.path(), "auckland", "query1.json", r#"{"success": false}"#);
        fs::write(dir.path().join("README"), "not a city").unwrap();

        let captures = read_station_captures(dir.path()).unwrap();

        assert_eq!(captures.max_stations_per_query, 2);
        assert_eq!(captures.stations.len(), 2);
        assert_eq!(captures.stations[0].name.as_deref(), Some("Z Kilbirnie"));
        assert_eq!(captures.stations[1].geo_hash, "rbsm2");
    }

    #[test]
    fn test_no_captures_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_station_captures(dir.path()),
            Err(StationCaptureError::NoCaptures(_))
        ));
    }

    #[test]
    fn test_max_stations_file() {
        let dir = tempdir().unwrap();
        write_max_stations(dir.path(), 37).unwrap();
        assert_eq!(read_max_stations(dir.path()).unwrap(), 37);

        fs::write(dir.path().join(MAX_STATIONS_FILE), "0").unwrap();
        assert!(read_max_stations(dir.path()).is_err());
    }
}
