use std::{env, time::Duration};

use bb8::{Pool, RunError};
use bb8_postgres::PostgresConnectionManager;
use dotenv::dotenv;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio::{task, time::timeout};
pub use tokio_postgres::types::ToSql;
use tokio_postgres::{config::SslMode, Config, Error as PgError, Row, ToStatement};
use tracing::{debug, error};

use crate::database::sql_type_wrapper::SqlValue;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn connection_string() -> Result<String, env::VarError> {
    dotenv().ok();
    let connection = env::var(DATABASE_URL_ENV)?;
    Ok(connection)
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresConnectionError {
    #[error("The database connection string is wrong please check your environment: {0}")]
    DatabaseConnectionConfigWrong(#[from] env::VarError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] tokio_postgres::Error),

    #[error("Can not connect to the database please make sure your connection string is correct")]
    CanNotConnectToDatabase,

    #[error("Could not parse connection string make sure it is correctly formatted")]
    CouldNotParseConnectionString,

    #[error("Could not create tls connector")]
    CouldNotCreateTlsConnector,
}

#[derive(thiserror::Error, Debug)]
pub enum PostgresError {
    #[error("PgError {0}")]
    PgError(#[from] PgError),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(#[from] RunError<tokio_postgres::Error>),
}

impl PostgresError {
    /// The native database error, when the failure came from the server.
    pub fn as_db_error(&self) -> Option<&tokio_postgres::error::DbError> {
        match self {
            PostgresError::PgError(e) => e.as_db_error(),
            PostgresError::ConnectionPoolError(RunError::User(e)) => e.as_db_error(),
            PostgresError::ConnectionPoolError(RunError::TimedOut) => None,
        }
    }
}

/// A statement plus the owned values bound to it.
pub struct BoundStatement {
    pub query: String,
    pub params: Vec<SqlValue>,
}

pub struct PostgresClient {
    pool: Pool<PostgresConnectionManager<MakeTlsConnector>>,
}

fn tls_connector() -> Result<MakeTlsConnector, PostgresConnectionError> {
    let connector = TlsConnector::builder()
        .build()
        .map_err(|_| PostgresConnectionError::CouldNotCreateTlsConnector)?;
    Ok(MakeTlsConnector::new(connector))
}

fn parse_config(connection_str: &str) -> Result<Config, PostgresConnectionError> {
    connection_str.parse().map_err(|_| PostgresConnectionError::CouldNotParseConnectionString)
}

/// Opens one connection, runs `SELECT 1` and closes it again.
async fn check_connection(config: &Config, tls: MakeTlsConnector) -> Result<(), String> {
    let (client, connection) = timeout(CONNECT_TIMEOUT, config.connect(tls))
        .await
        .map_err(|_| "timed out".to_string())?
        .map_err(|e| e.to_string())?;

    let connection_handle = task::spawn(connection);
    client.query_one("SELECT 1", &[]).await.map_err(|e| e.to_string())?;

    drop(client);
    match connection_handle.await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

impl PostgresClient {
    /// Connects using `DATABASE_URL` (a `.env` file is honoured).
    pub async fn new() -> Result<Self, PostgresConnectionError> {
        let connection_str = connection_string()?;
        Self::connect(&connection_str).await
    }

    /// Checks the database answers before building the pool. When TLS fails and the
    /// connection string does not insist on it, the check is retried without TLS.
    pub async fn connect(connection_str: &str) -> Result<Self, PostgresConnectionError> {
        let mut config = parse_config(connection_str)?;
        let tls = tls_connector()?;

        if let Err(e) = check_connection(&config, tls.clone()).await {
            let may_drop_tls = config.get_ssl_mode() != SslMode::Disable &&
                !connection_str.contains("sslmode=require");
            if !may_drop_tls {
                error!("Error connecting to database: {}", e);
                return Err(PostgresConnectionError::CanNotConnectToDatabase);
            }

            debug!("Connecting with tls failed ({}), retrying without", e);
            config.ssl_mode(SslMode::Disable);
            check_connection(&config, tls.clone()).await.map_err(|e| {
                error!("Error connecting to database: {}", e);
                PostgresConnectionError::CanNotConnectToDatabase
            })?;
        }

        let pool = Pool::builder().build(PostgresConnectionManager::new(config, tls)).await?;

        Ok(PostgresClient { pool })
    }

    /// Builds a client without opening any connection. Connections are made on first use.
    pub fn lazy(connection_str: &str) -> Result<Self, PostgresConnectionError> {
        let config = parse_config(connection_str)?;

        let manager = PostgresConnectionManager::new(config, tls_connector()?);
        let pool = Pool::builder().connection_timeout(CONNECT_TIMEOUT).build_unchecked(manager);

        Ok(PostgresClient { pool })
    }

    pub async fn batch_execute(&self, sql: &str) -> Result<(), PostgresError> {
        let conn = self.pool.get().await?;
        conn.batch_execute(sql).await.map_err(PostgresError::PgError)
    }

    /// Runs every statement inside one transaction and commits once. Any failure drops
    /// the transaction, which rolls it back.
    pub async fn execute_in_transaction(
        &self,
        statements: &[BoundStatement],
    ) -> Result<u64, PostgresError> {
        let mut conn = self.pool.get().await?;
        let transaction = conn.transaction().await.map_err(PostgresError::PgError)?;

        let mut affected = 0;
        for statement in statements {
            let params: Vec<&(dyn ToSql + Sync)> =
                statement.params.iter().map(|param| param as &(dyn ToSql + Sync)).collect();

            debug!("Executing in transaction: {}", statement.query);
            affected += transaction
                .execute(statement.query.as_str(), &params)
                .await
                .map_err(PostgresError::PgError)?;
        }

        transaction.commit().await.map_err(PostgresError::PgError)?;

        Ok(affected)
    }

    pub async fn query<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let rows = conn.query(query, params).await.map_err(PostgresError::PgError)?;
        Ok(rows)
    }

    pub async fn query_one_or_none<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, PostgresError>
    where
        T: ?Sized + ToStatement,
    {
        let conn = self.pool.get().await?;
        let row = conn.query_opt(query, params).await.map_err(PostgresError::PgError)?;
        Ok(row)
    }
}
