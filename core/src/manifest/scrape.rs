use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scraper::DEFAULT_BASE_URL;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_fuel_types() -> Vec<String> {
    vec!["91".to_string(), "95".to_string(), "D".to_string()]
}

fn default_lookback_hours() -> u32 {
    24
}

fn default_min_delay_ms() -> u64 {
    700
}

fn default_max_delay_ms() -> u64 {
    1300
}

fn default_api_version() -> u32 {
    22
}

fn default_app_version() -> String {
    "3.21.3".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScrapeSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub email: String,

    pub password: String,

    #[serde(default = "default_fuel_types")]
    pub fuel_types: Vec<String>,

    /// Prices older than this are ignored.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_api_version")]
    pub api_version: u32,

    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// JSON file of request headers sent with every call, relative to the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_path: Option<String>,
}

impl ScrapeSettings {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        ScrapeSettings {
            base_url: default_base_url(),
            email: email.into(),
            password: password.into(),
            fuel_types: default_fuel_types(),
            lookback_hours: default_lookback_hours(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            api_version: default_api_version(),
            app_version: default_app_version(),
            headers_path: None,
        }
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn default_captures_path() -> String {
    "./captures".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationSettings {
    /// Directory of captured map responses, `<city>/<query>.json`.
    #[serde(default = "default_captures_path")]
    pub captures_path: String,

    /// Stations per map request. Falls back to the `max_stations` file written by the
    /// station import when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

impl Default for StationSettings {
    fn default() -> Self {
        StationSettings { captures_path: default_captures_path(), chunk_size: None }
    }
}
