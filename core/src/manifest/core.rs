use serde::{Deserialize, Serialize};

use crate::manifest::{
    scrape::{ScrapeSettings, StationSettings},
    storage::Storage,
};

fn default_storage() -> Storage {
    Storage::default()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_path: Option<String>,

    #[serde(default = "default_storage")]
    pub storage: Storage,

    pub scrape: ScrapeSettings,

    #[serde(default)]
    pub stations: StationSettings,
}
