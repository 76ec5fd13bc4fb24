use serde::{Deserialize, Serialize};

use crate::database::catalog::DEFAULT_SCHEMA;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PostgresDetails {
    pub enabled: bool,

    #[serde(default = "default_schema")]
    pub schema: String,

    /// Read table definitions from the live database instead of the built-in ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflect_schema: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_create_tables: Option<bool>,
}

fn default_csv_path() -> String {
    "./generated_csv".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CsvDetails {
    pub enabled: bool,

    #[serde(default = "default_csv_path")]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Storage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresDetails>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<CsvDetails>,
}

impl Storage {
    pub fn postgres_enabled(&self) -> bool {
        match &self.postgres {
            Some(details) => details.enabled,
            None => false,
        }
    }

    pub fn postgres_schema(&self) -> &str {
        self.postgres.as_ref().map_or(DEFAULT_SCHEMA, |details| details.schema.as_str())
    }

    pub fn postgres_reflect_schema(&self) -> bool {
        self.postgres
            .as_ref()
            .is_some_and(|details| details.enabled && details.reflect_schema.unwrap_or_default())
    }

    pub fn postgres_disable_create_tables(&self) -> bool {
        let enabled = self.postgres_enabled();
        if !enabled {
            return true;
        }

        self.postgres
            .as_ref()
            .is_some_and(|details| details.disable_create_tables.unwrap_or_default())
    }

    pub fn csv_enabled(&self) -> bool {
        match &self.csv {
            Some(details) => details.enabled,
            None => false,
        }
    }

    pub fn csv_path(&self) -> Option<&str> {
        self.csv.as_ref().filter(|details| details.enabled).map(|details| details.path.as_str())
    }
}
