use tracing::{debug, info};

use crate::database::postgres::{
    client::{PostgresClient, PostgresConnectionError, PostgresError},
    generate::generate_tables_sql,
};

#[derive(thiserror::Error, Debug)]
pub enum SetupPostgresError {
    #[error("{0}")]
    PostgresConnection(#[from] PostgresConnectionError),

    #[error("Error creating tables: {0}")]
    CreatingTables(#[from] PostgresError),
}

/// Connects using `DATABASE_URL` and creates the fuelwatch tables in `schema` if they
/// are missing.
pub async fn setup_postgres(schema: &str) -> Result<PostgresClient, SetupPostgresError> {
    info!("Setting up postgres");
    let client = PostgresClient::new().await?;

    info!("Creating tables in schema {}", schema);
    let sql = generate_tables_sql(schema);
    debug!("{}", sql);
    client.batch_execute(sql.as_str()).await?;
    info!("Created tables in schema {}", schema);

    Ok(client)
}
