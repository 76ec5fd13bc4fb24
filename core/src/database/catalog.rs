use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::database::sql_type_wrapper::ColumnType;

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDefinition { name: name.into(), column_type }
    }
}

/// Caller-supplied description of a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,

    pub name: String,

    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableSchema { schema: schema.into(), name: name.into(), columns: Vec::new() }
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDefinition::new(name, column_type));
        self
    }

    pub fn qualified_name(&self) -> String {
        qualified_name(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

pub fn qualified_name(schema: &str, table_name: &str) -> String {
    format!("{}.{}", schema, table_name)
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Table {0} does not exist")]
pub struct TableNotFoundError(pub String);

/// The set of tables a writer knows about, keyed by `(schema, table)`.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    tables: HashMap<(String, String), TableSchema>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing any previous descriptor with the same qualified name.
    pub fn register(&mut self, table: TableSchema) {
        self.tables.insert((table.schema.clone(), table.name.clone()), table);
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.register(table);
        self
    }

    pub fn lookup(
        &self,
        table_name: &str,
        schema: Option<&str>,
    ) -> Result<&TableSchema, TableNotFoundError> {
        let schema = schema.unwrap_or(DEFAULT_SCHEMA);
        self.tables
            .get(&(schema.to_string(), table_name.to_string()))
            .ok_or_else(|| TableNotFoundError(qualified_name(schema, table_name)))
    }

    pub fn contains(&self, table_name: &str, schema: Option<&str>) -> bool {
        self.lookup(table_name, schema).is_ok()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub const STATIONS_TABLE: &str = "stations";
pub const FUEL_PRICES_TABLE: &str = "fuel_prices";

pub const STATIONS_UNIQUE_KEY: &[&str] = &["station_id"];
pub const FUEL_PRICES_UNIQUE_KEY: &[&str] = &["station_id", "fuel_type", "update_time"];

pub fn stations_table(schema: &str) -> TableSchema {
    TableSchema::new(schema, STATIONS_TABLE)
        .with_column("station_id", ColumnType::Text)
        .with_column("name", ColumnType::Text)
        .with_column("geo_hash", ColumnType::Text)
}

pub fn fuel_prices_table(schema: &str) -> TableSchema {
    TableSchema::new(schema, FUEL_PRICES_TABLE)
        .with_column("station_id", ColumnType::Text)
        .with_column("brand", ColumnType::Text)
        .with_column("latitude", ColumnType::Float)
        .with_column("longitude", ColumnType::Float)
        .with_column("fuel_type", ColumnType::Text)
        .with_column("price", ColumnType::Numeric)
        .with_column("update_time", ColumnType::Timestamp)
}

/// Catalog describing the tables fuelwatch itself creates.
pub fn fuelwatch_catalog(schema: &str) -> TableCatalog {
    TableCatalog::new().with_table(stations_table(schema)).with_table(fuel_prices_table(schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_defaults_to_public_schema() {
        let catalog = fuelwatch_catalog(DEFAULT_SCHEMA);
        let table = catalog.lookup(FUEL_PRICES_TABLE, None).unwrap();
        assert_eq!(table.qualified_name(), "public.fuel_prices");
        assert_eq!(table.column("price").unwrap().column_type, ColumnType::Numeric);
    }

    #[test]
    fn test_lookup_unknown_table() {
        let catalog = fuelwatch_catalog(DEFAULT_SCHEMA);
        assert_eq!(
            catalog.lookup("fuel_price", None).unwrap_err(),
            TableNotFoundError("public.fuel_price".to_string())
        );
        assert!(!catalog.contains(FUEL_PRICES_TABLE, Some("staging")));
    }

    #[test]
    fn test_register_replaces_descriptor() {
        let mut catalog = TableCatalog::new();
        catalog.register(TableSchema::new("public", "t").with_column("a", ColumnType::Text));
        catalog.register(TableSchema::new("public", "t").with_column("b", ColumnType::Integer));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("t", None).unwrap().column_names(), vec!["b"]);
    }

    #[test]
    fn test_dotted_names_do_not_collide() {
        let catalog = TableCatalog::new()
            .with_table(TableSchema::new("a.b", "c").with_column("x", ColumnType::Text))
            .with_table(TableSchema::new("a", "b.c").with_column("y", ColumnType::Text));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("c", Some("a.b")).unwrap().column_names(), vec!["x"]);
        assert_eq!(catalog.lookup("b.c", Some("a")).unwrap().column_names(), vec!["y"]);
        assert!(!catalog.contains("c", Some("a")));
    }
}
