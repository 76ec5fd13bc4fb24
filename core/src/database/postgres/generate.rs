use crate::database::{
    catalog::{
        fuel_prices_table, stations_table, TableSchema, FUEL_PRICES_UNIQUE_KEY,
        STATIONS_UNIQUE_KEY,
    },
    postgres::batch_operations::{format_table_name, quote_identifier},
};

/// How the unique key of a generated table is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyConstraint {
    PrimaryKey,
    Unique,
}

pub fn generate_create_table_sql(
    table: &TableSchema,
    unique_key: &[&str],
    constraint: KeyConstraint,
) -> String {
    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let not_null = if unique_key.contains(&column.name.as_str()) { " NOT NULL" } else { "" };
            format!("{} {}{}", quote_identifier(&column.name), column.column_type, not_null)
        })
        .collect();

    let key_columns =
        unique_key.iter().map(|col| quote_identifier(col)).collect::<Vec<_>>().join(", ");
    definitions.push(match constraint {
        KeyConstraint::PrimaryKey => format!("PRIMARY KEY ({})", key_columns),
        KeyConstraint::Unique => format!("UNIQUE ({})", key_columns),
    });

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        format_table_name(&table.schema, &table.name),
        definitions.join(",\n    ")
    )
}

/// SQL creating the schema plus the `stations` and `fuel_prices` tables if missing.
pub fn generate_tables_sql(schema: &str) -> String {
    let mut sql = format!("CREATE SCHEMA IF NOT EXISTS {};\n", quote_identifier(schema));

    sql.push_str(&generate_create_table_sql(
        &stations_table(schema),
        STATIONS_UNIQUE_KEY,
        KeyConstraint::PrimaryKey,
    ));
    sql.push('\n');
    sql.push_str(&generate_create_table_sql(
        &fuel_prices_table(schema),
        FUEL_PRICES_UNIQUE_KEY,
        KeyConstraint::Unique,
    ));
    sql.push_str(&format!(
        "\nCREATE INDEX IF NOT EXISTS fuel_prices_fuel_type_idx ON {} ({}, {});",
        format_table_name(schema, "fuel_prices"),
        quote_identifier("fuel_type"),
        quote_identifier("update_time")
    ));

    sql
}
