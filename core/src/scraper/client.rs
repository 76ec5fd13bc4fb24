use std::{collections::HashMap, fs, path::Path, time::Duration};

use rand::Rng;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, StatusCode,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "https://gaspy.nz/api/v1";

#[derive(thiserror::Error, Debug)]
pub enum GaspyClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login failed with status code {status}: {reason}")]
    LoginRejected { status: u16, reason: String },

    #[error("gaspy.nz username and password don't match")]
    InvalidCredentials,

    #[error("Unexpected login response: {0}")]
    InvalidLoginResponse(String),

    #[error("Could not read headers file {0}: {1}")]
    CouldNotReadHeaders(String, String),

    #[error("Invalid header {0}")]
    InvalidHeader(String),
}

/// Why one map query produced no stations. The caller logs it and moves on.
#[derive(thiserror::Error, Debug)]
pub enum BlockQueryError {
    #[error("Status code: {status}. Reason: {reason}")]
    Status { status: u16, reason: String },

    #[error("gaspy.nz returns errors: {0}")]
    Unsuccessful(String),

    #[error("Fail to parse the response")]
    NotAList,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GaspyClientSettings {
    pub base_url: String,

    pub api_version: u32,

    pub app_version: String,

    pub headers: HeaderMap,

    pub min_delay: Duration,

    pub max_delay: Duration,
}

impl Default for GaspyClientSettings {
    fn default() -> Self {
        GaspyClientSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: 22,
            app_version: "3.21.3".to_string(),
            headers: HeaderMap::new(),
            min_delay: Duration::from_millis(700),
            max_delay: Duration::from_millis(1300),
        }
    }
}

/// Reads default request headers from a JSON object of name to value.
pub fn read_headers_file(path: &Path) -> Result<HeaderMap, GaspyClientError> {
    let display = path.display().to_string();
    let contents = fs::read_to_string(path)
        .map_err(|e| GaspyClientError::CouldNotReadHeaders(display.clone(), e.to_string()))?;
    let values: HashMap<String, String> = serde_json::from_str(&contents)
        .map_err(|e| GaspyClientError::CouldNotReadHeaders(display, e.to_string()))?;

    let mut headers = HeaderMap::new();
    for (name, value) in values {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GaspyClientError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| GaspyClientError::InvalidHeader(name))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// What the login call tells us about the catalogue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginDetails {
    /// Fuel type code (e.g. `91`, `D`) to the numeric id the map API expects.
    pub fuel_types: HashMap<String, i64>,

    /// Brand id to brand name.
    pub brands: HashMap<String, String>,
}

impl LoginDetails {
    pub fn missing_fuel_types(&self, wanted: &[String]) -> Vec<String> {
        wanted.iter().filter(|code| !self.fuel_types.contains_key(*code)).cloned().collect()
    }

    fn from_response(response: &Value) -> Result<Self, GaspyClientError> {
        let data = response
            .get("data")
            .ok_or_else(|| GaspyClientError::InvalidLoginResponse("missing data".to_string()))?;

        let fuel_type_map = data.get("fuel_types").and_then(Value::as_object).ok_or_else(|| {
            GaspyClientError::InvalidLoginResponse("missing fuel_types".to_string())
        })?;

        let mut fuel_types = HashMap::with_capacity(fuel_type_map.len());
        for (key, meta) in fuel_type_map {
            let code = match meta.get("code") {
                Some(Value::String(code)) => code.clone(),
                Some(Value::Number(code)) => code.to_string(),
                _ => {
                    return Err(GaspyClientError::InvalidLoginResponse(format!(
                        "fuel type {} has no code",
                        key
                    )))
                }
            };
            // fail here rather than on the first map query
            let id = key.parse::<i64>().map_err(|_| {
                GaspyClientError::InvalidLoginResponse(format!("fuel type id {} is not numeric", key))
            })?;
            fuel_types.insert(code, id);
        }

        let brands = data
            .get("brands")
            .and_then(Value::as_object)
            .map(|brands| {
                brands
                    .iter()
                    .filter_map(|(id, brand)| {
                        let name = match brand {
                            Value::String(name) => Some(name.clone()),
                            Value::Object(fields) => {
                                fields.get("name").and_then(Value::as_str).map(str::to_string)
                            }
                            _ => None,
                        };
                        name.map(|name| (id.clone(), name))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(LoginDetails { fuel_types, brands })
    }
}

pub struct GaspyClient {
    http: Client,
    settings: GaspyClientSettings,
    device_id: String,
}

impl GaspyClient {
    pub fn new(settings: GaspyClientSettings) -> Result<Self, GaspyClientError> {
        let http = Client::builder().default_headers(settings.headers.clone()).build()?;

        Ok(GaspyClient {
            http,
            settings,
            device_id: format!("ios_{}", Uuid::new_v4().to_string().to_uppercase()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginDetails, GaspyClientError> {
        let response = self
            .http
            .post(self.url("Public/login"))
            .json(&json!({
                "email": email,
                "password": password,
                "gold_key": null,
                "v": self.settings.api_version,
                "a": self.settings.app_version,
            }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GaspyClientError::LoginRejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body: Value = response.json().await?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(GaspyClientError::InvalidCredentials);
        }

        let details = LoginDetails::from_response(&body)?;
        debug!(
            "Logged in, {} fuel types and {} brands known",
            details.fuel_types.len(),
            details.brands.len()
        );

        Ok(details)
    }

    /// Asks the map for the stations inside the given geo hash cells.
    pub async fn blocks_from_hashcodes(
        &self,
        hashcodes: &[String],
        fuel_type_id: i64,
        fuel_type_code: &str,
    ) -> Result<Vec<Value>, BlockQueryError> {
        let response = self
            .http
            .post(self.url("Map/blocksFromHashcodes"))
            .json(&json!({
                "hashcodes": hashcodes,
                "fuel_type_id": fuel_type_id,
                "fuel_type_code": fuel_type_code,
                "gold_key": null,
                "ev_plug_types": [],
                "v": self.settings.api_version.to_string(),
                "a": self.settings.app_version,
                "udid": self.device_id,
            }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(BlockQueryError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body: Value = response.json().await?;
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            let error = body.get("error").map(Value::to_string).unwrap_or_default();
            return Err(BlockQueryError::Unsuccessful(error));
        }

        match body.get("data") {
            Some(Value::Array(stations)) => Ok(stations.clone()),
            _ => Err(BlockQueryError::NotAList),
        }
    }

    /// Sleeps a random delay between the configured bounds.
    pub async fn pause(&self) {
        let min = self.settings.min_delay.as_millis() as u64;
        let max = self.settings.max_delay.as_millis() as u64;
        if max == 0 {
            return;
        }

        let delay = if max > min { rand::rng().random_range(min..=max) } else { max };
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
