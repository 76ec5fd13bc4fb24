use tracing::{debug, warn};

use crate::database::{
    catalog::{ColumnDefinition, TableCatalog, TableSchema},
    postgres::client::{PostgresClient, PostgresError},
    sql_type_wrapper::ColumnType,
};

const REFLECT_COLUMNS_SQL: &str = "
    SELECT table_name, column_name, data_type
    FROM information_schema.columns
    WHERE table_schema = $1
    ORDER BY table_name, ordinal_position
";

/// Builds a catalog from the live database for every table of `schema`.
///
/// Columns whose type has no `ColumnType` counterpart are left out, so batches naming
/// them fail validation instead of being sent.
pub async fn reflect_schema(
    database: &PostgresClient,
    schema: &str,
) -> Result<TableCatalog, PostgresError> {
    let rows = database.query(REFLECT_COLUMNS_SQL, &[&schema]).await?;

    let mut catalog = TableCatalog::new();
    let mut current: Option<TableSchema> = None;

    for row in rows {
        let table_name: String = row.get("table_name");
        let column_name: String = row.get("column_name");
        let data_type: String = row.get("data_type");

        if current.as_ref().map(|table| table.name != table_name).unwrap_or(true) {
            if let Some(table) = current.take() {
                catalog.register(table);
            }
            current = Some(TableSchema::new(schema, table_name.as_str()));
        }

        let Some(column_type) = ColumnType::from_information_schema(&data_type) else {
            warn!(
                "Skipping column {}.{}.{} with unsupported type {}",
                schema, table_name, column_name, data_type
            );
            continue;
        };

        if let Some(table) = current.as_mut() {
            table.columns.push(ColumnDefinition::new(column_name, column_type));
        }
    }

    if let Some(table) = current.take() {
        catalog.register(table);
    }

    debug!("Reflected {} tables from schema {}", catalog.len(), schema);

    Ok(catalog)
}
