use std::{
    fmt,
    hash::{Hash, Hasher},
};

use bytes::BytesMut;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type as PgType};

/// Semantic type of a table column, as declared by the caller's table descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Float,
    Numeric,
    Integer,
    Timestamp,
    TimestampNaive,
    Boolean,
}

impl ColumnType {
    /// The PostgreSQL type string used for placeholder casts and DDL.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Integer => "BIGINT",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::TimestampNaive => "TIMESTAMP",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    /// Maps an `information_schema.columns.data_type` value onto a column type.
    pub fn from_information_schema(data_type: &str) -> Option<ColumnType> {
        match data_type {
            "text" | "character varying" | "character" | "uuid" => Some(ColumnType::Text),
            "double precision" | "real" => Some(ColumnType::Float),
            "numeric" => Some(ColumnType::Numeric),
            "bigint" | "integer" | "smallint" => Some(ColumnType::Integer),
            "timestamp with time zone" => Some(ColumnType::Timestamp),
            "timestamp without time zone" => Some(ColumnType::TimestampNaive),
            "boolean" => Some(ColumnType::Boolean),
            _ => None,
        }
    }

    /// Whether a value of this kind can be written into a column of this type.
    pub fn accepts(&self, value: &SqlValue) -> bool {
        matches!(
            (self, value),
            (_, SqlValue::Null) |
                (ColumnType::Text, SqlValue::Text(_)) |
                (ColumnType::Float | ColumnType::Numeric, SqlValue::Float(_)) |
                (ColumnType::Float | ColumnType::Numeric, SqlValue::Integer(_)) |
                (ColumnType::Integer, SqlValue::Integer(_)) |
                (ColumnType::Timestamp | ColumnType::TimestampNaive, SqlValue::Timestamp(_)) |
                (ColumnType::Boolean, SqlValue::Boolean(_))
        )
    }

    /// Parses a CSV cell back into a value. Empty cells are null.
    pub fn parse_cell(&self, cell: &str) -> Result<SqlValue, String> {
        if cell.is_empty() {
            return Ok(SqlValue::Null);
        }

        match self {
            ColumnType::Text => Ok(SqlValue::Text(cell.to_string())),
            ColumnType::Float | ColumnType::Numeric => cell
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|e| format!("invalid number '{}': {}", cell, e)),
            ColumnType::Integer => cell
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|e| format!("invalid integer '{}': {}", cell, e)),
            ColumnType::Timestamp | ColumnType::TimestampNaive => {
                DateTime::parse_from_rfc3339(cell)
                    .map(|value| SqlValue::Timestamp(value.with_timezone(&Utc)))
                    .map_err(|e| format!("invalid timestamp '{}': {}", cell, e))
            }
            ColumnType::Boolean => cell
                .parse::<bool>()
                .map(SqlValue::Boolean)
                .map_err(|e| format!("invalid boolean '{}': {}", cell, e)),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single scalar cell of a row batch.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Text(String),
    Float(f64),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    Boolean(bool),
}

impl SqlValue {
    pub fn raw_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "Null",
            SqlValue::Text(_) => "Text",
            SqlValue::Float(_) => "Float",
            SqlValue::Integer(_) => "Integer",
            SqlValue::Timestamp(_) => "Timestamp",
            SqlValue::Boolean(_) => "Boolean",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The value as it takes part in a key tuple. Whole floats compare equal to the
    /// matching integer, as they do in a postgres numeric column.
    pub fn key_form(&self) -> SqlValue {
        match self {
            SqlValue::Float(value)
                if value.fract() == 0.0 &&
                    *value >= i64::MIN as f64 &&
                    *value < i64::MAX as f64 =>
            {
                SqlValue::Integer(*value as i64)
            }
            other => other.clone(),
        }
    }

    /// Renders the value as a CSV cell. Null becomes an empty cell.
    pub fn to_cell(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Text(value) => value.clone(),
            SqlValue::Float(value) => value.to_string(),
            SqlValue::Integer(value) => value.to_string(),
            SqlValue::Timestamp(value) => value.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            SqlValue::Boolean(value) => value.to_string(),
        }
    }
}

// Floats compare by bit pattern so values can take part in key tuples.
impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Float(a), SqlValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Integer(a), SqlValue::Integer(b)) => a == b,
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a == b,
            (SqlValue::Boolean(a), SqlValue::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Text(value) => value.hash(state),
            SqlValue::Float(value) => value.to_bits().hash(state),
            SqlValue::Integer(value) => value.hash(state),
            SqlValue::Timestamp(value) => value.hash(state),
            SqlValue::Boolean(value) => value.hash(state),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &PgType,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Text(value) => value.to_sql(ty, out),
            SqlValue::Float(value) => {
                if *ty == PgType::NUMERIC {
                    let decimal = Decimal::from_f64(*value)
                        .ok_or_else(|| format!("{} can not be stored as NUMERIC", value))?;
                    decimal.to_sql(ty, out)
                } else {
                    value.to_sql(ty, out)
                }
            }
            SqlValue::Integer(value) => {
                if *ty == PgType::NUMERIC {
                    Decimal::from(*value).to_sql(ty, out)
                } else if *ty == PgType::FLOAT8 {
                    (*value as f64).to_sql(ty, out)
                } else {
                    value.to_sql(ty, out)
                }
            }
            SqlValue::Timestamp(value) => {
                if *ty == PgType::TIMESTAMP {
                    value.naive_utc().to_sql(ty, out)
                } else {
                    value.to_sql(ty, out)
                }
            }
            SqlValue::Boolean(value) => value.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &PgType) -> bool {
        true
    }

    to_sql_checked!();
}
