use std::collections::{HashMap, HashSet};

use crate::database::{
    catalog::TableSchema,
    sql_type_wrapper::{ColumnType, SqlValue},
};

/// What happens to an incoming row whose unique key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperationType {
    /// Overwrite every non-key column with the incoming value.
    Upsert,
    /// Leave the existing row untouched and drop the incoming one.
    InsertIfAbsent,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BatchError {
    #[error("Column {0} is listed more than once in the batch")]
    DuplicateColumn(String),

    #[error("Row {row} has {actual} values but the batch has {expected} columns")]
    RowWidthMismatch { row: usize, expected: usize, actual: usize },

    #[error("Record {record} does not have the same columns as the first record (column {column})")]
    HeterogeneousRecord { record: usize, column: String },

    #[error("Column {column} does not exist in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("The unique key must name at least one column")]
    EmptyUniqueKey,

    #[error("Unique key column {0} is not present in the batch")]
    KeyColumnNotInBatch(String),

    #[error("Column {column} is {expected} but row {row} holds a {actual} value")]
    TypeMismatch { row: usize, column: String, expected: ColumnType, actual: &'static str },
}

/// A single record: ordered column name to value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Column-homogeneous rows destined for one table in one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl RowBatch {
    pub fn new<I, S>(columns: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(BatchError::DuplicateColumn(column.clone()));
            }
        }

        Ok(RowBatch { columns, rows: Vec::new() })
    }

    /// Builds a batch from records. Every record must carry exactly the columns of the
    /// first record; a missing or extra column fails the whole batch.
    pub fn from_records(records: Vec<Record>) -> Result<Self, BatchError> {
        let Some(first) = records.first() else {
            return Ok(RowBatch::default());
        };

        let mut batch = RowBatch::new(first.columns().map(str::to_string))?;

        for (index, record) in records.iter().enumerate() {
            if let Some(extra) =
                record.columns().find(|column| !batch.columns.iter().any(|c| c == column))
            {
                return Err(BatchError::HeterogeneousRecord {
                    record: index,
                    column: extra.to_string(),
                });
            }

            let mut row = Vec::with_capacity(batch.columns.len());
            for column in &batch.columns {
                match record.get(column) {
                    Some(value) => row.push(value.clone()),
                    None => {
                        return Err(BatchError::HeterogeneousRecord {
                            record: index,
                            column: column.clone(),
                        })
                    }
                }
            }
            batch.rows.push(row);
        }

        Ok(batch)
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) -> Result<(), BatchError> {
        if row.len() != self.columns.len() {
            return Err(BatchError::RowWidthMismatch {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Checks the batch against the table descriptor and unique key, returning the
    /// declared type of every batch column in batch order.
    pub fn validate(
        &self,
        table: &TableSchema,
        unique_key: &[&str],
    ) -> Result<Vec<ColumnType>, BatchError> {
        if unique_key.is_empty() {
            return Err(BatchError::EmptyUniqueKey);
        }

        let mut column_types = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let definition = table.column(column).ok_or_else(|| BatchError::UnknownColumn {
                table: table.qualified_name(),
                column: column.clone(),
            })?;
            column_types.push(definition.column_type);
        }

        for key in unique_key {
            if self.column_index(key).is_none() {
                return Err(BatchError::KeyColumnNotInBatch(key.to_string()));
            }
        }

        for (row_index, row) in self.rows.iter().enumerate() {
            for ((value, column), column_type) in row.iter().zip(&self.columns).zip(&column_types)
            {
                if !column_type.accepts(value) {
                    return Err(BatchError::TypeMismatch {
                        row: row_index,
                        column: column.clone(),
                        expected: *column_type,
                        actual: value.raw_name(),
                    });
                }
            }
        }

        Ok(column_types)
    }

    /// Collapses rows sharing a key tuple: `Upsert` keeps the last one supplied,
    /// `InsertIfAbsent` the first. Rows with a null key part never collide.
    pub fn dedupe_by_key(
        &self,
        unique_key: &[&str],
        op_type: BatchOperationType,
    ) -> Vec<&Vec<SqlValue>> {
        let key_indexes: Vec<usize> =
            unique_key.iter().filter_map(|key| self.column_index(key)).collect();

        let key_of = |row: &Vec<SqlValue>| -> Option<Vec<SqlValue>> {
            let key: Vec<SqlValue> = key_indexes.iter().map(|i| row[*i].key_form()).collect();
            if key.iter().any(SqlValue::is_null) {
                None
            } else {
                Some(key)
            }
        };

        let mut winner: HashMap<Vec<SqlValue>, usize> = HashMap::new();
        for (index, row) in self.rows.iter().enumerate() {
            if let Some(key) = key_of(row) {
                match op_type {
                    BatchOperationType::Upsert => {
                        winner.insert(key, index);
                    }
                    BatchOperationType::InsertIfAbsent => {
                        winner.entry(key).or_insert(index);
                    }
                }
            }
        }

        self.rows
            .iter()
            .enumerate()
            .filter(|(index, row)| match key_of(*row) {
                Some(key) => winner.get(&key) == Some(index),
                None => true,
            })
            .map(|(_, row)| row)
            .collect()
    }
}

/// Every batch column that is not part of the unique key, in batch order.
pub fn update_columns<'a>(all_columns: &[&'a str], key_columns: &[&str]) -> Vec<&'a str> {
    all_columns.iter().filter(|column| !key_columns.contains(column)).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::{fuel_prices_table, DEFAULT_SCHEMA};

    fn price(station: &str, fuel: &str, price: f64) -> Record {
        Record::new().with("station_id", station).with("fuel_type", fuel).with("price", price)
    }

    #[test]
    fn test_update_columns_excludes_key() {
        let all = ["station_id", "brand", "fuel_type", "price"];
        assert_eq!(update_columns(&all, &["station_id", "fuel_type"]), vec!["brand", "price"]);
        assert!(update_columns(&["station_id"], &["station_id"]).is_empty());
    }

    #[test]
    fn test_from_records_rejects_missing_column() {
        let records = vec![price("A1", "91", 2.5), Record::new().with("station_id", "B2").with("fuel_type", "91")];
        assert_eq!(
            RowBatch::from_records(records).unwrap_err(),
            BatchError::HeterogeneousRecord { record: 1, column: "price".to_string() }
        );
    }

    #[test]
    fn test_from_records_rejects_extra_column() {
        let records = vec![price("A1", "91", 2.5), price("B2", "91", 2.6).with("brand", "Z")];
        assert_eq!(
            RowBatch::from_records(records).unwrap_err(),
            BatchError::HeterogeneousRecord { record: 1, column: "brand".to_string() }
        );
    }

    #[test]
    fn test_from_records_reorders_to_first_record() {
        let second = Record::new().with("price", 2.6).with("fuel_type", "95").with("station_id", "B2");
        let batch = RowBatch::from_records(vec![price("A1", "91", 2.5), second]).unwrap();
        assert_eq!(batch.column_names(), vec!["station_id", "fuel_type", "price"]);
        assert_eq!(batch.rows()[1], vec![SqlValue::from("B2"), SqlValue::from("95"), SqlValue::Float(2.6)]);
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut batch = RowBatch::new(["a", "b"]).unwrap();
        assert!(batch.push_row(vec![SqlValue::Null]).is_err());
        assert!(RowBatch::new(["a", "a"]).is_err());
    }

    #[test]
    fn test_validate() {
        let table = fuel_prices_table(DEFAULT_SCHEMA);
        let batch = RowBatch::from_records(vec![price("A1", "91", 2.5)]).unwrap();

        let types = batch.validate(&table, &["station_id", "fuel_type"]).unwrap();
        assert_eq!(types, vec![ColumnType::Text, ColumnType::Text, ColumnType::Numeric]);

        assert_eq!(batch.validate(&table, &[]).unwrap_err(), BatchError::EmptyUniqueKey);
        assert_eq!(
            batch.validate(&table, &["station_id", "update_time"]).unwrap_err(),
            BatchError::KeyColumnNotInBatch("update_time".to_string())
        );

        let unknown = RowBatch::from_records(vec![price("A1", "91", 2.5).with("octane", 91i64)]).unwrap();
        assert!(matches!(
            unknown.validate(&table, &["station_id"]),
            Err(BatchError::UnknownColumn { column, .. }) if column == "octane"
        ));

        let wrong = RowBatch::from_records(vec![price("A1", "91", 2.5).with("latitude", "south")]).unwrap();
        assert!(matches!(
            wrong.validate(&table, &["station_id"]),
            Err(BatchError::TypeMismatch { column, .. }) if column == "latitude"
        ));
    }

    #[test]
    fn test_dedupe_keeps_last_for_upsert_and_first_for_insert() {
        let batch = RowBatch::from_records(vec![
            price("A1", "91", 2.5),
            price("B2", "91", 2.6),
            price("A1", "91", 2.75),
        ])
        .unwrap();
        let key = ["station_id", "fuel_type"];

        let upserted = batch.dedupe_by_key(&key, BatchOperationType::Upsert);
        assert_eq!(upserted.len(), 2);
        assert_eq!(upserted[0][0], SqlValue::from("B2"));
        assert_eq!(upserted[1][2], SqlValue::Float(2.75));

        let inserted = batch.dedupe_by_key(&key, BatchOperationType::InsertIfAbsent);
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0][2], SqlValue::Float(2.5));
    }

    #[test]
    fn test_dedupe_never_collapses_null_keys() {
        let batch = RowBatch::from_records(vec![
            Record::new().with("station_id", SqlValue::Null).with("price", 1.0),
            Record::new().with("station_id", SqlValue::Null).with("price", 2.0),
        ])
        .unwrap();
        assert_eq!(batch.dedupe_by_key(&["station_id"], BatchOperationType::Upsert).len(), 2);
    }

    #[test]
    fn test_dedupe_treats_whole_float_and_integer_keys_as_one() {
        let batch = RowBatch::from_records(vec![
            Record::new().with("octane", 91i64).with("price", 2.5),
            Record::new().with("octane", 91.0).with("price", 2.6),
        ])
        .unwrap();

        let upserted = batch.dedupe_by_key(&["octane"], BatchOperationType::Upsert);
        assert_eq!(upserted.len(), 1);
        assert_eq!(upserted[0][1], SqlValue::Float(2.6));
    }
}
