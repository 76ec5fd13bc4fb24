use std::path::Path;

use tracing::{debug, info};

use crate::{
    database::{
        batch_operations::RowBatch,
        catalog::{fuelwatch_catalog, TableCatalog, STATIONS_TABLE},
        postgres::{
            batch_operations::{insert_batch_if_absent, upsert_batch, BatchWriteError},
            client::{PostgresClient, PostgresConnectionError, PostgresError},
            queries::PriceQueries,
            reflect::reflect_schema,
            setup::{setup_postgres, SetupPostgresError},
        },
    },
    manifest::core::Manifest,
    simple_file_formatters::csv::{CsvStoreError, CsvTableStore},
    stations::{stations_from_batch, Station},
};

#[derive(thiserror::Error, Debug)]
pub enum PriceStorageError {
    #[error("{0}")]
    PostgresConnection(#[from] PostgresConnectionError),

    #[error("{0}")]
    SetupPostgres(#[from] SetupPostgresError),

    #[error("Could not reflect schema: {0}")]
    Reflect(PostgresError),

    #[error("Postgres write failed: {0}")]
    PostgresWrite(#[from] BatchWriteError),

    #[error("Postgres read failed: {0}")]
    PostgresRead(PostgresError),

    #[error("Csv storage failed: {0}")]
    Csv(#[from] CsvStoreError),

    #[error("No storage is enabled")]
    NoStorageEnabled,
}

/// Every enabled storage backend plus the table descriptors writes are checked against.
/// Writes go to each backend in turn, postgres first.
pub struct PriceStorage {
    postgres: Option<PostgresClient>,
    csv: Option<CsvTableStore>,
    catalog: TableCatalog,
    schema: String,
}

impl PriceStorage {
    pub fn new(
        postgres: Option<PostgresClient>,
        csv: Option<CsvTableStore>,
        catalog: TableCatalog,
        schema: &str,
    ) -> Result<Self, PriceStorageError> {
        if postgres.is_none() && csv.is_none() {
            return Err(PriceStorageError::NoStorageEnabled);
        }

        Ok(PriceStorage { postgres, csv, catalog, schema: schema.to_string() })
    }

    /// Connects every backend the manifest enables. Postgres tables are created unless
    /// `disable_create_tables` is set.
    pub async fn from_manifest(
        project_path: &Path,
        manifest: &Manifest,
    ) -> Result<Self, PriceStorageError> {
        let schema = manifest.storage.postgres_schema();

        let postgres = if manifest.storage.postgres_enabled() {
            let client = if manifest.storage.postgres_disable_create_tables() {
                PostgresClient::new().await?
            } else {
                setup_postgres(schema).await?
            };
            Some(client)
        } else {
            None
        };

        let catalog = match &postgres {
            Some(client) if manifest.storage.postgres_reflect_schema() => {
                reflect_schema(client, schema).await.map_err(PriceStorageError::Reflect)?
            }
            _ => fuelwatch_catalog(schema),
        };

        let csv = manifest.storage.csv_path().map(|path| {
            let directory = project_path.join(path);
            info!("Csv storage enabled at {}", directory.display());
            CsvTableStore::new(directory)
        });

        Self::new(postgres, csv, catalog, schema)
    }

    pub fn queries(&self) -> Option<PriceQueries<'_>> {
        self.postgres.as_ref().map(|client| PriceQueries::new(client, &self.schema))
    }

    pub async fn upsert(
        &self,
        batch: &RowBatch,
        unique_key: &[&str],
        table_name: &str,
    ) -> Result<(), PriceStorageError> {
        if let Some(client) = &self.postgres {
            upsert_batch(client, &self.catalog, batch, unique_key, table_name, Some(&self.schema))
                .await?;
        }

        if let Some(csv) = &self.csv {
            csv.upsert(&self.catalog, batch, unique_key, table_name, Some(&self.schema)).await?;
        }

        debug!("Upserted {} rows into {}", batch.len(), table_name);
        Ok(())
    }

    pub async fn insert_if_absent(
        &self,
        batch: &RowBatch,
        unique_key: &[&str],
        table_name: &str,
    ) -> Result<(), PriceStorageError> {
        if let Some(client) = &self.postgres {
            insert_batch_if_absent(
                client,
                &self.catalog,
                batch,
                unique_key,
                table_name,
                Some(&self.schema),
            )
            .await?;
        }

        if let Some(csv) = &self.csv {
            csv.insert_if_absent(&self.catalog, batch, unique_key, table_name, Some(&self.schema))
                .await?;
        }

        debug!("Inserted up to {} new rows into {}", batch.len(), table_name);
        Ok(())
    }

    /// Stations with a geo hash, read from postgres when enabled, otherwise from csv.
    pub async fn load_stations(&self) -> Result<Vec<Station>, PriceStorageError> {
        if let Some(queries) = self.queries() {
            return queries.stations().await.map_err(PriceStorageError::PostgresRead);
        }

        match &self.csv {
            Some(csv) => {
                let batch = csv.read_rows(&self.catalog, STATIONS_TABLE, Some(&self.schema)).await?;
                Ok(stations_from_batch(&batch))
            }
            None => Err(PriceStorageError::NoStorageEnabled),
        }
    }
}
