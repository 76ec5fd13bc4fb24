use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use csv::{Reader, Writer};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::database::{
    batch_operations::{BatchError, BatchOperationType, RowBatch},
    catalog::{TableCatalog, TableNotFoundError, TableSchema, DEFAULT_SCHEMA},
    sql_type_wrapper::SqlValue,
};

#[derive(thiserror::Error, Debug)]
pub enum CsvStoreError {
    #[error("{0}")]
    TableNotFound(#[from] TableNotFoundError),

    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("{path} has header {found:?} but table expects {expected:?}")]
    HeaderMismatch { path: String, expected: Vec<String>, found: Vec<String> },

    #[error("{path} line {line} column {column}: {reason}")]
    InvalidCell { path: String, line: u64, column: String, reason: String },

    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not replace csv file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Csv task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Keeps one CSV file per table and applies keyed writes to it.
///
/// Each write reads the whole file, merges the batch in memory and atomically replaces
/// the file, so a failed write leaves the previous content intact.
pub struct CsvTableStore {
    directory: Arc<Path>,
    writer_lock: Arc<Mutex<()>>,
}

impl CsvTableStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        CsvTableStore {
            directory: Arc::from(directory.as_ref().to_path_buf()),
            writer_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn table_path(&self, table: &TableSchema) -> PathBuf {
        if table.schema == DEFAULT_SCHEMA {
            self.directory.join(format!("{}.csv", table.name))
        } else {
            self.directory.join(format!("{}.{}.csv", table.schema, table.name))
        }
    }

    pub async fn upsert(
        &self,
        catalog: &TableCatalog,
        batch: &RowBatch,
        unique_key: &[&str],
        table_name: &str,
        schema: Option<&str>,
    ) -> Result<(), CsvStoreError> {
        self.write(catalog, batch, unique_key, table_name, schema, BatchOperationType::Upsert)
            .await
    }

    pub async fn insert_if_absent(
        &self,
        catalog: &TableCatalog,
        batch: &RowBatch,
        unique_key: &[&str],
        table_name: &str,
        schema: Option<&str>,
    ) -> Result<(), CsvStoreError> {
        self.write(
            catalog,
            batch,
            unique_key,
            table_name,
            schema,
            BatchOperationType::InsertIfAbsent,
        )
        .await
    }

    /// Reads every row of a table, in table column order. A missing file is an empty table.
    pub async fn read_rows(
        &self,
        catalog: &TableCatalog,
        table_name: &str,
        schema: Option<&str>,
    ) -> Result<RowBatch, CsvStoreError> {
        let table = catalog.lookup(table_name, schema)?.clone();
        let path = self.table_path(&table);

        let _guard = self.writer_lock.lock().await;
        tokio::task::spawn_blocking(move || -> Result<RowBatch, CsvStoreError> {
            let mut batch = RowBatch::new(table.column_names())?;
            for row in read_table_file(&path, &table)? {
                batch.push_row(row)?;
            }
            Ok(batch)
        })
        .await?
    }

    async fn write(
        &self,
        catalog: &TableCatalog,
        batch: &RowBatch,
        unique_key: &[&str],
        table_name: &str,
        schema: Option<&str>,
        op_type: BatchOperationType,
    ) -> Result<(), CsvStoreError> {
        let table = catalog.lookup(table_name, schema)?.clone();

        if batch.is_empty() {
            return Ok(());
        }

        batch.validate(&table, unique_key)?;

        // Positions of batch columns and key columns within the table's column order.
        let batch_to_table: Vec<usize> = batch
            .columns()
            .iter()
            .filter_map(|column| table.columns.iter().position(|c| c.name == *column))
            .collect();
        let key_positions: Vec<usize> = unique_key
            .iter()
            .filter_map(|key| table.columns.iter().position(|c| c.name == *key))
            .collect();

        let incoming: Vec<Vec<SqlValue>> =
            batch.dedupe_by_key(unique_key, op_type).into_iter().cloned().collect();
        let path = self.table_path(&table);
        let directory = Arc::clone(&self.directory);

        let _guard = self.writer_lock.lock().await;
        tokio::task::spawn_blocking(move || -> Result<(), CsvStoreError> {
            let mut rows = read_table_file(&path, &table)?;
            merge_rows(
                &mut rows,
                incoming,
                &batch_to_table,
                &key_positions,
                table.columns.len(),
                op_type,
            );

            fs::create_dir_all(&directory)?;
            let mut temp = NamedTempFile::new_in(&directory)?;
            {
                let mut writer = Writer::from_writer(temp.as_file_mut());
                writer.write_record(table.column_names())?;
                for row in &rows {
                    writer.write_record(row.iter().map(SqlValue::to_cell))?;
                }
                writer.flush()?;
            }
            temp.as_file_mut().flush()?;
            temp.persist(&path)?;

            debug!("Wrote {} rows to {}", rows.len(), path.display());
            Ok(())
        })
        .await?
    }
}

fn key_of(row: &[SqlValue], key_positions: &[usize]) -> Option<Vec<SqlValue>> {
    let key: Vec<SqlValue> = key_positions.iter().map(|i| row[*i].key_form()).collect();
    if key.iter().any(SqlValue::is_null) {
        None
    } else {
        Some(key)
    }
}

/// Applies incoming rows (in batch column order) onto existing rows (in table column order).
fn merge_rows(
    rows: &mut Vec<Vec<SqlValue>>,
    incoming: Vec<Vec<SqlValue>>,
    batch_to_table: &[usize],
    key_positions: &[usize],
    table_width: usize,
    op_type: BatchOperationType,
) {
    let mut index: HashMap<Vec<SqlValue>, usize> = HashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(key) = key_of(row, key_positions) {
            index.entry(key).or_insert(position);
        }
    }

    for values in incoming {
        let mut row = vec![SqlValue::Null; table_width];
        for (value, table_position) in values.into_iter().zip(batch_to_table) {
            row[*table_position] = value;
        }

        let existing = key_of(&row, key_positions).and_then(|key| index.get(&key).copied());
        match (existing, op_type) {
            (Some(position), BatchOperationType::Upsert) => {
                for table_position in batch_to_table {
                    if !key_positions.contains(table_position) {
                        rows[position][*table_position] = row[*table_position].clone();
                    }
                }
            }
            (Some(_), BatchOperationType::InsertIfAbsent) => {}
            (None, _) => {
                if let Some(key) = key_of(&row, key_positions) {
                    index.insert(key, rows.len());
                }
                rows.push(row);
            }
        }
    }
}

fn read_table_file(path: &Path, table: &TableSchema) -> Result<Vec<Vec<SqlValue>>, CsvStoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = Reader::from_reader(File::open(path)?);
    let expected: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
    let found: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if found != expected {
        return Err(CsvStoreError::HeaderMismatch {
            path: path.display().to_string(),
            expected,
            found,
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let mut row = Vec::with_capacity(table.columns.len());
        for (cell, column) in record.iter().zip(&table.columns) {
            let value = column.column_type.parse_cell(cell).map_err(|reason| {
                CsvStoreError::InvalidCell {
                    path: path.display().to_string(),
                    line,
                    column: column.name.clone(),
                    reason,
                }
            })?;
            row.push(value);
        }
        rows.push(row);
    }

    Ok(rows)
}
