use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::{
    database::{
        batch_operations::BatchError,
        catalog::{FUEL_PRICES_TABLE, FUEL_PRICES_UNIQUE_KEY, STATIONS_TABLE, STATIONS_UNIQUE_KEY},
    },
    helpers::{format_duration, load_env_from_project_path},
    manifest::{
        core::Manifest,
        scrape::ScrapeSettings,
        yaml::{read_manifest, ReadManifestError},
    },
    scraper::{
        dedupe_prices, extract_prices, prices_to_batch, read_headers_file, FuelPrice,
        GaspyClient, GaspyClientError, GaspyClientSettings,
    },
    stations::{
        chunk_stations, read_max_stations, read_station_captures, stations_to_batch,
        write_max_stations, Station, StationCaptureError,
    },
    storage::{PriceStorage, PriceStorageError},
};

#[derive(thiserror::Error, Debug)]
pub enum StartScrapeError {
    #[error("Could not work out project path from the parent of the manifest")]
    NoProjectPathFoundUsingParentOfManifestPath,

    #[error("Could not read manifest: {0}")]
    CouldNotReadManifest(#[from] ReadManifestError),

    #[error("{0}")]
    Storage(#[from] PriceStorageError),

    #[error("{0}")]
    Client(#[from] GaspyClientError),

    #[error("Fuel types not offered by gaspy.nz: {}", .0.join(", "))]
    UnknownFuelTypes(Vec<String>),

    #[error("Could not work out the chunk size: {0}")]
    ChunkSize(StationCaptureError),

    #[error("Could not build batch: {0}")]
    Batch(#[from] BatchError),
}

#[derive(thiserror::Error, Debug)]
pub enum ImportStationsError {
    #[error("Could not work out project path from the parent of the manifest")]
    NoProjectPathFoundUsingParentOfManifestPath,

    #[error("Could not read manifest: {0}")]
    CouldNotReadManifest(#[from] ReadManifestError),

    #[error("{0}")]
    Captures(#[from] StationCaptureError),

    #[error("{0}")]
    Storage(#[from] PriceStorageError),

    #[error("Could not build batch: {0}")]
    Batch(#[from] BatchError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeResult {
    pub prices: Vec<FuelPrice>,

    pub requests: usize,

    pub failed_requests: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub requests: usize,

    pub failed_requests: usize,

    pub prices_written: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub stations: usize,

    pub max_stations_per_query: usize,
}

fn project_path_and_manifest(
    manifest_path: &Path,
) -> Option<(PathBuf, Result<Manifest, ReadManifestError>)> {
    let project_path = manifest_path.parent()?.to_path_buf();
    load_env_from_project_path(&project_path);
    Some((project_path, read_manifest(manifest_path)))
}

pub fn client_settings(
    project_path: &Path,
    settings: &ScrapeSettings,
) -> Result<GaspyClientSettings, GaspyClientError> {
    let headers = match &settings.headers_path {
        Some(headers_path) => read_headers_file(&project_path.join(headers_path))?,
        None => Default::default(),
    };

    Ok(GaspyClientSettings {
        base_url: settings.base_url.clone(),
        api_version: settings.api_version,
        app_version: settings.app_version.clone(),
        headers,
        min_delay: settings.min_delay(),
        max_delay: settings.max_delay(),
    })
}

/// Logs in, then asks the map for every chunk of stations once per fuel type.
/// Chunks the API refuses are logged and skipped.
pub async fn scrape_prices(
    client: &GaspyClient,
    settings: &ScrapeSettings,
    stations: Vec<Station>,
    chunk_size: usize,
    now: DateTime<Utc>,
) -> Result<ScrapeResult, StartScrapeError> {
    let login = client.login(&settings.email, &settings.password).await?;

    let missing = login.missing_fuel_types(&settings.fuel_types);
    if !missing.is_empty() {
        return Err(StartScrapeError::UnknownFuelTypes(missing));
    }

    let since = now - Duration::hours(i64::from(settings.lookback_hours));
    let chunks = chunk_stations(stations, chunk_size);
    let total = chunks.len() * settings.fuel_types.len();

    let mut result = ScrapeResult::default();
    for fuel_type in &settings.fuel_types {
        let Some(fuel_type_id) = login.fuel_types.get(fuel_type).copied() else {
            continue;
        };

        for chunk in &chunks {
            let hashcodes: Vec<String> =
                chunk.iter().map(|station| station.geo_hash.clone()).collect();

            result.requests += 1;
            let response =
                client.blocks_from_hashcodes(&hashcodes, fuel_type_id, fuel_type).await;
            client.pause().await;

            match response {
                Ok(entries) => {
                    let prices = extract_prices(&entries, fuel_type, &login.brands, since);
                    info!(
                        "{}/{} fuel {}: {} stations, {} recent prices",
                        result.requests,
                        total,
                        fuel_type,
                        entries.len(),
                        prices.len()
                    );
                    result.prices.extend(prices);
                }
                Err(e) => {
                    result.failed_requests += 1;
                    warn!(
                        "{}/{} fuel {}: skipping chunk - {}",
                        result.requests, total, fuel_type, e
                    );
                }
            }
        }
    }

    result.prices = dedupe_prices(result.prices);

    Ok(result)
}

/// Scrapes the latest prices for the project at `manifest_path` and upserts them into
/// every enabled storage.
pub async fn start_scrape(manifest_path: &Path) -> Result<ScrapeSummary, StartScrapeError> {
    let start = Instant::now();
    let (project_path, manifest) = project_path_and_manifest(manifest_path)
        .ok_or(StartScrapeError::NoProjectPathFoundUsingParentOfManifestPath)?;
    let manifest = manifest?;

    info!("Starting scrape for {}", manifest.name);

    let storage = PriceStorage::from_manifest(&project_path, &manifest).await?;
    let stations = storage.load_stations().await?;
    if stations.is_empty() {
        warn!("No stations stored, run `fuelwatch stations import` first");
        return Ok(ScrapeSummary::default());
    }

    let chunk_size = match manifest.stations.chunk_size {
        Some(chunk_size) => chunk_size,
        None => read_max_stations(&project_path.join(&manifest.stations.captures_path))
            .map_err(StartScrapeError::ChunkSize)?,
    };

    let client = GaspyClient::new(client_settings(&project_path, &manifest.scrape)?)?;
    let result = scrape_prices(&client, &manifest.scrape, stations, chunk_size, Utc::now()).await?;

    let batch = prices_to_batch(&result.prices)?;
    storage.upsert(&batch, FUEL_PRICES_UNIQUE_KEY, FUEL_PRICES_TABLE).await?;

    info!(
        "Scrape finished in {}: {} prices written, {} of {} requests failed",
        format_duration(start.elapsed()),
        batch.len(),
        result.failed_requests,
        result.requests
    );

    Ok(ScrapeSummary {
        requests: result.requests,
        failed_requests: result.failed_requests,
        prices_written: batch.len(),
    })
}

/// Reads the captured map responses, stores stations not seen before and records the
/// chunk size for later scrapes.
pub async fn import_stations(manifest_path: &Path) -> Result<ImportSummary, ImportStationsError> {
    let (project_path, manifest) = project_path_and_manifest(manifest_path)
        .ok_or(ImportStationsError::NoProjectPathFoundUsingParentOfManifestPath)?;
    let manifest = manifest?;

    let captures_path = project_path.join(&manifest.stations.captures_path);
    let captures = read_station_captures(&captures_path)?;

    let storage = PriceStorage::from_manifest(&project_path, &manifest).await?;
    let batch = stations_to_batch(&captures.stations)?;
    storage.insert_if_absent(&batch, STATIONS_UNIQUE_KEY, STATIONS_TABLE).await?;

    write_max_stations(&captures_path, captures.max_stations_per_query)?;

    info!("Imported {} stations", captures.stations.len());

    Ok(ImportSummary {
        stations: captures.stations.len(),
        max_stations_per_query: captures.max_stations_per_query,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::manifest::yaml::YAML_CONFIG_NAME;

    const LOGIN_BODY: &str = r#"{"success": true, "data": {
        "fuel_types": {"1": {"code": "91"}, "4": {"code": "D"}},
        "brands": {"12": "Z"}
    }}"#;

    fn settings(base_url: String, fuel_types: &[&str]) -> ScrapeSettings {
        ScrapeSettings {
            base_url,
            fuel_types: fuel_types.iter().map(|f| f.to_string()).collect(),
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..ScrapeSettings::new("a@b.nz", "secret")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap()
    }

    fn station(id: &str, geo_hash: &str) -> Station {
        Station { station_id: id.to_string(), name: None, geo_hash: geo_hash.to_string() }
    }

    #[tokio::test]
    async fn test_scrape_skips_failing_chunks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Public/login")
            .with_status(200)
            .with_body(LOGIN_BODY)
            .create_async()
            .await;
        server
            .mock("POST", "/Map/blocksFromHashcodes")
            .match_body(Matcher::PartialJson(json!({"hashcodes": ["rbsm1"]})))
            .with_status(200)
            .with_body(
                json!({"success": true, "data": [
                    {"stationKey": "A1", "brandId": 12, "price": 2.5, "dateUpdated": "2024-03-02T07:00:00.000Z"},
                    {"stationKey": "A1", "brandId": 12, "price": 2.6, "dateUpdated": "2024-03-02T06:00:00.000Z"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("POST", "/Map/blocksFromHashcodes")
            .match_body(Matcher::PartialJson(json!({"hashcodes": ["rbsm2"]})))
            .with_status(500)
            .create_async()
            .await;

        let client = GaspyClient::new(
            client_settings(Path::new("."), &settings(server.url(), &["91"])).unwrap(),
        )
        .unwrap();
        let result = scrape_prices(
            &client,
            &settings(server.url(), &["91"]),
            vec![station("A1", "rbsm1"), station("A2", "rbsm2")],
            1,
            now(),
        )
        .await
        .unwrap();

        assert_eq!(result.requests, 2);
        assert_eq!(result.failed_requests, 1);
        assert_eq!(result.prices.len(), 1);
        assert_eq!(result.prices[0].price, Some(2.5));
        assert_eq!(result.prices[0].brand.as_deref(), Some("Z"));
    }

    #[tokio::test]
    async fn test_scrape_rejects_unknown_fuel_types() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Public/login")
            .with_status(200)
            .with_body(LOGIN_BODY)
            .create_async()
            .await;
        let map = server.mock("POST", "/Map/blocksFromHashcodes").expect(0).create_async().await;

        let scrape = settings(server.url(), &["91", "LPG"]);
        let client = GaspyClient::new(client_settings(Path::new("."), &scrape).unwrap()).unwrap();
        let result = scrape_prices(&client, &scrape, vec![station("A1", "rbsm1")], 10, now()).await;

        assert!(matches!(
            result,
            Err(StartScrapeError::UnknownFuelTypes(missing)) if missing == vec!["LPG"]
        ));
        map.assert_async().await;
    }

    #[tokio::test]
    async fn test_import_stations_into_csv() {
        let dir = tempdir().unwrap();
        let city = dir.path().join("captures").join("wellington");
        fs::create_dir_all(&city).unwrap();
        fs::write(
            city.join("query1.json"),
            r#"{"data": [
                {"stationKey": "A1", "stationName": "Z Kilbirnie", "geoHash": "rbsm1", "totalPrices": 1},
                {"stationKey": "A2", "stationName": "BP Newtown", "geoHash": "rbsm2", "totalPrices": 1}
            ]}"#,
        )
        .unwrap();

        let manifest_path = dir.path().join(YAML_CONFIG_NAME);
        fs::write(
            &manifest_path,
            "name: test\nstorage:\n  csv:\n    enabled: true\n    path: ./data\nscrape:\n  email: a\n  password: b\n",
        )
        .unwrap();

        let summary = import_stations(&manifest_path).await.unwrap();

        assert_eq!(summary, ImportSummary { stations: 2, max_stations_per_query: 2 });
        assert!(dir.path().join("data").join("stations.csv").exists());
        assert_eq!(read_max_stations(&dir.path().join("captures")).unwrap(), 2);
    }
}
