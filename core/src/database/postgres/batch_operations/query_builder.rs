//! SQL generation for the batch write operations.
//!
//! Every identifier is quoted and every value is a cast placeholder, so nothing
//! supplied by the caller is ever spliced into the statement text.

use crate::database::sql_type_wrapper::ColumnType;

/// Quotes an identifier, doubling any embedded quote.
#[inline]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Formats a schema qualified table name.
pub fn format_table_name(schema: &str, table_name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table_name))
}

pub fn format_column_list(columns: &[&str]) -> String {
    columns.iter().map(|col| quote_identifier(col)).collect::<Vec<_>>().join(", ")
}

/// Builds `($1::TEXT, $2::NUMERIC), ($3::TEXT, $4::NUMERIC)` for `row_count` rows.
pub fn build_values_placeholders(row_count: usize, column_types: &[ColumnType]) -> String {
    let width = column_types.len();

    (0..row_count)
        .map(|i| {
            let base = i * width + 1;
            let placeholder = column_types
                .iter()
                .enumerate()
                .map(|(j, column_type)| format!("${}::{}", base + j, column_type.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", placeholder)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds an upsert SET clause taking the incoming value.
pub fn build_upsert_set_clause(col: &str) -> String {
    let column_name = quote_identifier(col);
    format!("{} = EXCLUDED.{}", column_name, column_name)
}

/// Builds the `ON CONFLICT` tail.
///
/// With no update columns the conflict action is `DO NOTHING`, which is also what an
/// upsert degenerates to when every column is part of the key.
pub fn build_on_conflict_clause(conflict_columns: &[&str], update_columns: &[&str]) -> String {
    let mut clause = format!("\nON CONFLICT ({})", format_column_list(conflict_columns));

    if update_columns.is_empty() {
        clause.push_str("\nDO NOTHING");
    } else {
        let set_clauses = update_columns
            .iter()
            .map(|col| build_upsert_set_clause(col))
            .collect::<Vec<_>>()
            .join(", ");
        clause.push_str(&format!("\nDO UPDATE SET {}", set_clauses));
    }

    clause
}

/// Builds the full `INSERT ... VALUES ... ON CONFLICT` statement.
///
/// # Arguments
/// * `formatted_table_name` - The quoted, schema qualified table name
/// * `all_columns` - Columns in the order values are bound
/// * `column_types` - Declared type of each column, used for placeholder casts
/// * `row_count` - Number of rows bound to this statement
/// * `conflict_columns` - The unique key used for conflict detection
/// * `update_columns` - Columns overwritten on conflict, empty for `DO NOTHING`
pub fn build_insert_on_conflict(
    formatted_table_name: &str,
    all_columns: &[&str],
    column_types: &[ColumnType],
    row_count: usize,
    conflict_columns: &[&str],
    update_columns: &[&str],
) -> String {
    let mut query = format!(
        "INSERT INTO {} ({})\nVALUES {}",
        formatted_table_name,
        format_column_list(all_columns),
        build_values_placeholders(row_count, column_types)
    );

    query.push_str(&build_on_conflict_clause(conflict_columns, update_columns));

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("price"), "\"price\"");
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_format_table_name() {
        assert_eq!(format_table_name("public", "fuel_prices"), "\"public\".\"fuel_prices\"");
    }

    #[test]
    fn test_values_placeholders() {
        assert_eq!(
            build_values_placeholders(2, &[ColumnType::Text, ColumnType::Numeric]),
            "($1::TEXT, $2::NUMERIC), ($3::TEXT, $4::NUMERIC)"
        );
    }

    #[test]
    fn test_timestamp_placeholders_keep_zone_kind() {
        assert_eq!(
            build_values_placeholders(1, &[ColumnType::Timestamp, ColumnType::TimestampNaive]),
            "($1::TIMESTAMPTZ, $2::TIMESTAMP)"
        );
    }

    #[test]
    fn test_upsert_statement() {
        let query = build_insert_on_conflict(
            &format_table_name("public", "fuel_prices"),
            &["station_id", "fuel_type", "price"],
            &[ColumnType::Text, ColumnType::Text, ColumnType::Numeric],
            1,
            &["station_id", "fuel_type"],
            &["price"],
        );

        assert_eq!(
            query,
            "INSERT INTO \"public\".\"fuel_prices\" (\"station_id\", \"fuel_type\", \"price\")\n\
             VALUES ($1::TEXT, $2::TEXT, $3::NUMERIC)\n\
             ON CONFLICT (\"station_id\", \"fuel_type\")\n\
             DO UPDATE SET \"price\" = EXCLUDED.\"price\""
        );
    }

    #[test]
    fn test_insert_if_absent_statement() {
        let query = build_insert_on_conflict(
            &format_table_name("public", "stations"),
            &["station_id", "name"],
            &[ColumnType::Text, ColumnType::Text],
            2,
            &["station_id"],
            &[],
        );

        assert!(query.ends_with("ON CONFLICT (\"station_id\")\nDO NOTHING"));
        assert!(query.contains("VALUES ($1::TEXT, $2::TEXT), ($3::TEXT, $4::TEXT)"));
    }
}
