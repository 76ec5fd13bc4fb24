mod captures;

pub use captures::{
    read_max_stations, read_station_captures, write_max_stations, StationCaptureError,
    StationCaptures, MAX_STATIONS_FILE,
};

use serde::{Deserialize, Serialize};

use crate::database::{
    batch_operations::{BatchError, RowBatch},
    sql_type_wrapper::SqlValue,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,

    pub name: Option<String>,

    pub geo_hash: String,
}

impl Station {
    pub fn to_row(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.station_id.as_str()),
            SqlValue::from(self.name.clone()),
            SqlValue::from(self.geo_hash.as_str()),
        ]
    }
}

pub const STATION_COLUMNS: [&str; 3] = ["station_id", "name", "geo_hash"];

pub fn stations_to_batch(stations: &[Station]) -> Result<RowBatch, BatchError> {
    let mut batch = RowBatch::new(STATION_COLUMNS)?;
    for station in stations {
        batch.push_row(station.to_row())?;
    }
    Ok(batch)
}

/// Reads stations back out of a batch laid out like the `stations` table. Rows without
/// an id or geo hash can not be scraped and are skipped.
pub fn stations_from_batch(batch: &RowBatch) -> Vec<Station> {
    let (Some(id_index), Some(name_index), Some(geo_hash_index)) = (
        batch.column_index("station_id"),
        batch.column_index("name"),
        batch.column_index("geo_hash"),
    ) else {
        return Vec::new();
    };

    batch
        .rows()
        .iter()
        .filter_map(|row| match (&row[id_index], &row[name_index], &row[geo_hash_index]) {
            (SqlValue::Text(id), name, SqlValue::Text(geo_hash)) => Some(Station {
                station_id: id.clone(),
                name: match name {
                    SqlValue::Text(name) => Some(name.clone()),
                    _ => None,
                },
                geo_hash: geo_hash.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Splits stations into scrape requests: sorted by geo hash, grouped by geo hash length
/// (shortest first), and cut into chunks of at most `chunk_size` within each group.
pub fn chunk_stations(mut stations: Vec<Station>, chunk_size: usize) -> Vec<Vec<Station>> {
    let chunk_size = chunk_size.max(1);
    stations.sort_by(|a, b| a.geo_hash.cmp(&b.geo_hash));
    stations.sort_by_key(|station| station.geo_hash.len());

    let mut chunks: Vec<Vec<Station>> = Vec::new();
    let mut current_len = None;

    for station in stations {
        let len = station.geo_hash.len();
        let start_new = match chunks.last() {
            Some(chunk) => current_len != Some(len) || chunk.len() >= chunk_size,
            None => true,
        };

        if start_new {
            chunks.push(Vec::with_capacity(chunk_size));
            current_len = Some(len);
        }

        if let Some(chunk) = chunks.last_mut() {
            chunk.push(station);
        }
    }

    chunks
}
