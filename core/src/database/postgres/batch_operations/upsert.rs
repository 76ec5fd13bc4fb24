//! Upsert and insert-if-absent keyed on a caller supplied unique key.

use tokio_postgres::error::SqlState;
use tracing::{debug, error};

use super::query_builder::{build_insert_on_conflict, format_table_name};
use crate::database::{
    batch_operations::{update_columns, BatchError, BatchOperationType, RowBatch},
    catalog::{qualified_name, TableCatalog, TableNotFoundError, TableSchema, DEFAULT_SCHEMA},
    postgres::client::{BoundStatement, PostgresClient, PostgresError},
};

/// Upper bound on rows bound to one statement.
pub const MAX_ROWS_PER_STATEMENT: usize = 1000;

const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;

#[derive(thiserror::Error, Debug)]
pub enum BatchWriteError {
    #[error("{0}")]
    TableNotFound(#[from] TableNotFoundError),

    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("{0}")]
    PostgresError(#[from] PostgresError),
}

/// Inserts every row of `batch`, overwriting the non-key columns of rows whose
/// `unique_key` already exists. The whole batch commits or rolls back together.
pub async fn upsert_batch(
    database: &PostgresClient,
    catalog: &TableCatalog,
    batch: &RowBatch,
    unique_key: &[&str],
    table_name: &str,
    schema: Option<&str>,
) -> Result<(), BatchWriteError> {
    execute_batch_write(
        database,
        catalog,
        batch,
        unique_key,
        table_name,
        schema,
        BatchOperationType::Upsert,
    )
    .await
}

/// Inserts the rows of `batch` whose `unique_key` does not exist yet; existing rows
/// are left untouched.
pub async fn insert_batch_if_absent(
    database: &PostgresClient,
    catalog: &TableCatalog,
    batch: &RowBatch,
    unique_key: &[&str],
    table_name: &str,
    schema: Option<&str>,
) -> Result<(), BatchWriteError> {
    execute_batch_write(
        database,
        catalog,
        batch,
        unique_key,
        table_name,
        schema,
        BatchOperationType::InsertIfAbsent,
    )
    .await
}

async fn execute_batch_write(
    database: &PostgresClient,
    catalog: &TableCatalog,
    batch: &RowBatch,
    unique_key: &[&str],
    table_name: &str,
    schema: Option<&str>,
    op_type: BatchOperationType,
) -> Result<(), BatchWriteError> {
    let table = catalog.lookup(table_name, schema)?;

    if batch.is_empty() {
        return Ok(());
    }

    let statements = build_batch_statements(table, batch, unique_key, op_type)?;

    let affected = database.execute_in_transaction(&statements).await.map_err(|e| {
        if is_missing_relation(&e) {
            return BatchWriteError::TableNotFound(TableNotFoundError(qualified_name(
                schema.unwrap_or(DEFAULT_SCHEMA),
                table_name,
            )));
        }
        error!("{:?} into {} failed: {}", op_type, table.qualified_name(), e);
        BatchWriteError::PostgresError(e)
    })?;

    debug!(
        "{:?} into {} wrote {} rows from a batch of {}",
        op_type,
        table.qualified_name(),
        affected,
        batch.len()
    );

    Ok(())
}

fn is_missing_relation(error: &PostgresError) -> bool {
    error.as_db_error().is_some_and(|db_error| {
        *db_error.code() == SqlState::UNDEFINED_TABLE ||
            *db_error.code() == SqlState::INVALID_SCHEMA_NAME
    })
}

/// Validates the batch and renders the statements for one write. Pure, no database
/// access.
pub fn build_batch_statements(
    table: &TableSchema,
    batch: &RowBatch,
    unique_key: &[&str],
    op_type: BatchOperationType,
) -> Result<Vec<BoundStatement>, BatchError> {
    let column_types = batch.validate(table, unique_key)?;
    let column_names = batch.column_names();

    let updates = match op_type {
        BatchOperationType::Upsert => update_columns(&column_names, unique_key),
        BatchOperationType::InsertIfAbsent => Vec::new(),
    };

    let rows = batch.dedupe_by_key(unique_key, op_type);
    let formatted_table_name = format_table_name(&table.schema, &table.name);
    let rows_per_statement =
        MAX_ROWS_PER_STATEMENT.min(MAX_BIND_PARAMETERS / column_names.len().max(1)).max(1);

    let statements = rows
        .chunks(rows_per_statement)
        .map(|chunk| BoundStatement {
            query: build_insert_on_conflict(
                &formatted_table_name,
                &column_names,
                &column_types,
                chunk.len(),
                unique_key,
                &updates,
            ),
            params: chunk.iter().flat_map(|row| row.iter().cloned()).collect(),
        })
        .collect();

    Ok(statements)
}
