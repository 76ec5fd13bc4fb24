use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::database::{
    batch_operations::{BatchError, RowBatch},
    sql_type_wrapper::SqlValue,
};

pub const FUEL_PRICE_COLUMNS: [&str; 7] =
    ["station_id", "brand", "latitude", "longitude", "fuel_type", "price", "update_time"];

const UPDATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Debug, Clone, PartialEq)]
pub struct FuelPrice {
    pub station_id: String,

    pub brand: Option<String>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub fuel_type: String,

    pub price: Option<f64>,

    pub update_time: DateTime<Utc>,
}

impl FuelPrice {
    pub fn to_row(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::from(self.station_id.as_str()),
            SqlValue::from(self.brand.clone()),
            SqlValue::from(self.latitude),
            SqlValue::from(self.longitude),
            SqlValue::from(self.fuel_type.as_str()),
            SqlValue::from(self.price),
            SqlValue::from(self.update_time),
        ]
    }
}

/// Parses the map API's `dateUpdated`, e.g. `2024-03-01T20:15:04.000Z`.
pub fn parse_update_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, UPDATE_TIME_FORMAT).ok().map(|naive| naive.and_utc())
}

fn lenient_float(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    parsed.is_finite().then_some(parsed)
}

fn lenient_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Turns the stations one map query returned into prices for `fuel_type`, keeping only
/// prices updated at or after `since`.
pub fn extract_prices(
    entries: &[Value],
    fuel_type: &str,
    brands: &HashMap<String, String>,
    since: DateTime<Utc>,
) -> Vec<FuelPrice> {
    entries
        .iter()
        .filter_map(|entry| {
            let Some(update_time) =
                entry.get("dateUpdated").and_then(Value::as_str).and_then(parse_update_time)
            else {
                debug!("Skipping entry without a readable dateUpdated");
                return None;
            };
            if update_time < since {
                return None;
            }

            let Some(station_id) = lenient_text(entry.get("stationKey")) else {
                debug!("Skipping price without a station key");
                return None;
            };

            let brand = lenient_text(entry.get("brandId"))
                .and_then(|brand_id| brands.get(&brand_id).cloned());

            Some(FuelPrice {
                station_id,
                brand,
                latitude: lenient_float(entry.get("lat")),
                longitude: lenient_float(entry.get("lng")),
                fuel_type: fuel_type.to_string(),
                price: lenient_float(entry.get("price")),
                update_time,
            })
        })
        .collect()
}

/// One price per station and fuel type; the first seen wins.
pub fn dedupe_prices(prices: Vec<FuelPrice>) -> Vec<FuelPrice> {
    let mut seen = HashSet::new();
    prices
        .into_iter()
        .filter(|price| seen.insert((price.station_id.clone(), price.fuel_type.clone())))
        .collect()
}

pub fn prices_to_batch(prices: &[FuelPrice]) -> Result<RowBatch, BatchError> {
    let mut batch = RowBatch::new(FUEL_PRICE_COLUMNS)?;
    for price in prices {
        batch.push_row(price.to_row())?;
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_update_time() {
        let parsed = parse_update_time("2024-03-01T20:15:04.000Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 1, 20, 15, 4).unwrap());
        assert!(parse_update_time("yesterday").is_none());
    }

    #[test]
    fn test_extract_prices() {
        let brands = HashMap::from([("12".to_string(), "Z".to_string())]);
        let entries = vec![
            json!({
                "stationKey": "A1", "brandId": 12, "lat": "-41.3", "lng": 174.78,
                "price": 2.509, "dateUpdated": "2024-03-01T20:15:04.000Z"
            }),
            json!({
                "stationKey": "A2", "brandId": 99, "lat": null, "lng": "n/a",
                "price": "2.61", "dateUpdated": "2024-03-02T07:00:00.000Z"
            }),
            json!({"stationKey": "A3", "price": 2.4, "dateUpdated": "2024-02-20T07:00:00.000Z"}),
            json!({"price": 2.4, "dateUpdated": "2024-03-02T07:00:00.000Z"}),
        ];

        let prices = extract_prices(&entries, "91", &brands, now() - Duration::hours(24));

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].brand.as_deref(), Some("Z"));
        assert_eq!(prices[0].latitude, Some(-41.3));
        assert_eq!(prices[0].longitude, Some(174.78));
        assert_eq!(prices[1].brand, None);
        assert_eq!(prices[1].longitude, None);
        assert_eq!(prices[1].price, Some(2.61));
        assert_eq!(prices[1].fuel_type, "91");
    }

    #[test]
    fn test_extract_prices_reads_map_coordinates() {
        let entries = vec![json!({
            "stationKey": "A1", "lat": -41.3, "lng": 174.78, "price": 2.5,
            "dateUpdated": "2024-03-02T07:00:00.000Z"
        })];

        let prices = extract_prices(&entries, "91", &HashMap::new(), now() - Duration::hours(24));

        assert_eq!(prices[0].latitude, Some(-41.3));
        assert_eq!(prices[0].longitude, Some(174.78));
        assert_eq!(prices_to_batch(&prices).unwrap().rows()[0][2], SqlValue::Float(-41.3));
    }

    #[test]
    fn test_dedupe_keeps_first_per_station_and_fuel() {
        let price = |station: &str, fuel: &str, value: f64| FuelPrice {
            station_id: station.to_string(),
            brand: None,
            latitude: None,
            longitude: None,
            fuel_type: fuel.to_string(),
            price: Some(value),
            update_time: now(),
        };

        let deduped = dedupe_prices(vec![
            price("A1", "91", 2.5),
            price("A1", "91", 2.6),
            price("A1", "95", 2.7),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].price, Some(2.5));

        let batch = prices_to_batch(&deduped).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.column_names(), FUEL_PRICE_COLUMNS.to_vec());
    }
}
