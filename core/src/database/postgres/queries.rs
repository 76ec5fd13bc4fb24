use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tokio_postgres::Row;

use crate::{
    database::postgres::{
        batch_operations::format_table_name,
        client::{PostgresClient, PostgresError},
    },
    stations::Station,
};

pub const UNKNOWN_STATION: &str = "Unknown Station";

#[derive(Debug, Clone, PartialEq)]
pub struct LatestPrice {
    pub station_id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price: Option<f64>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPrice {
    pub fuel_type: String,
    pub price: Option<f64>,
    pub update_time: DateTime<Utc>,
}

fn decimal_to_f64(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|value| value.to_f64())
}

/// Read side of the price tables.
pub struct PriceQueries<'a> {
    database: &'a PostgresClient,
    schema: String,
}

impl<'a> PriceQueries<'a> {
    pub fn new(database: &'a PostgresClient, schema: &str) -> Self {
        PriceQueries { database, schema: schema.to_string() }
    }

    fn prices_table(&self) -> String {
        format_table_name(&self.schema, "fuel_prices")
    }

    fn stations_table(&self) -> String {
        format_table_name(&self.schema, "stations")
    }

    /// Most recent price of every station selling `fuel_type`.
    pub async fn latest_prices(&self, fuel_type: &str) -> Result<Vec<LatestPrice>, PostgresError> {
        let sql = format!(
            "SELECT DISTINCT ON (p.station_id)
                p.station_id, s.name, p.brand, p.latitude, p.longitude, p.price, p.update_time
             FROM {} p
             LEFT JOIN {} s ON s.station_id = p.station_id
             WHERE p.fuel_type = $1
             ORDER BY p.station_id, p.update_time DESC",
            self.prices_table(),
            self.stations_table()
        );

        let rows = self.database.query(sql.as_str(), &[&fuel_type]).await?;

        Ok(rows
            .iter()
            .map(|row: &Row| LatestPrice {
                station_id: row.get("station_id"),
                name: row.get("name"),
                brand: row.get("brand"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                price: decimal_to_f64(row.get("price")),
                update_time: row.get("update_time"),
            })
            .collect())
    }

    /// Every recorded price of one station, oldest first.
    pub async fn price_history(
        &self,
        station_id: &str,
    ) -> Result<Vec<HistoricalPrice>, PostgresError> {
        let sql = format!(
            "SELECT fuel_type, price, update_time
             FROM {}
             WHERE station_id = $1
             ORDER BY update_time, fuel_type",
            self.prices_table()
        );

        let rows = self.database.query(sql.as_str(), &[&station_id]).await?;

        Ok(rows
            .iter()
            .map(|row| HistoricalPrice {
                fuel_type: row.get("fuel_type"),
                price: decimal_to_f64(row.get("price")),
                update_time: row.get("update_time"),
            })
            .collect())
    }

    pub async fn station_name(&self, station_id: &str) -> Result<String, PostgresError> {
        let sql = format!("SELECT name FROM {} WHERE station_id = $1", self.stations_table());

        let row = self.database.query_one_or_none(sql.as_str(), &[&station_id]).await?;

        Ok(row
            .and_then(|row| row.get::<_, Option<String>>("name"))
            .unwrap_or_else(|| UNKNOWN_STATION.to_string()))
    }

    pub async fn fuel_types(&self) -> Result<Vec<String>, PostgresError> {
        let sql =
            format!("SELECT DISTINCT fuel_type FROM {} ORDER BY fuel_type", self.prices_table());

        let rows = self.database.query(sql.as_str(), &[]).await?;

        Ok(rows.iter().map(|row| row.get("fuel_type")).collect())
    }

    pub async fn stations(&self) -> Result<Vec<Station>, PostgresError> {
        let sql = format!(
            "SELECT station_id, name, geo_hash FROM {} WHERE geo_hash IS NOT NULL",
            self.stations_table()
        );

        let rows = self.database.query(sql.as_str(), &[]).await?;

        Ok(rows
            .iter()
            .map(|row| Station {
                station_id: row.get("station_id"),
                name: row.get("name"),
                geo_hash: row.get("geo_hash"),
            })
            .collect())
    }
}
