//! Runs against a real database when `FUELWATCH_TEST_DATABASE_URL` is set, otherwise
//! every test returns early.

use std::{env, str::FromStr};

use chrono::TimeZone;
use fuelwatch::{
    format_table_name, fuelwatch_catalog, generate_create_table_sql, generate_tables_sql,
    insert_batch_if_absent, quote_identifier, reflect_schema, upsert_batch, BatchWriteError,
    ColumnType, KeyConstraint, PostgresClient, Record, RowBatch, SqlValue, TableCatalog,
    TableSchema, FUEL_PRICES_TABLE, FUEL_PRICES_UNIQUE_KEY,
};
use rust_decimal::Decimal;

const TEST_DATABASE_URL_ENV: &str = "FUELWATCH_TEST_DATABASE_URL";
const KEY: &[&str] = &["station_id", "fuel_type"];

struct TestDatabase {
    client: PostgresClient,
    schema: String,
}

impl TestDatabase {
    async fn new() -> Option<Self> {
        let url = env::var(TEST_DATABASE_URL_ENV).ok()?;
        let client = PostgresClient::connect(&url).await.expect("test database connects");
        let schema = format!("fuelwatch_test_{}", rand::random::<u32>());

        client.batch_execute(&generate_tables_sql(&schema)).await.expect("tables created");
        client
            .batch_execute(&generate_create_table_sql(
                &prices_table(&schema),
                KEY,
                KeyConstraint::Unique,
            ))
            .await
            .expect("prices table created");

        Some(TestDatabase { client, schema })
    }

    fn catalog(&self) -> TableCatalog {
        fuelwatch_catalog(&self.schema).with_table(prices_table(&self.schema))
    }

    async fn prices(&self) -> Vec<(String, String, Decimal)> {
        let sql = format!(
            "SELECT station_id, fuel_type, price FROM {} ORDER BY station_id, fuel_type",
            format_table_name(&self.schema, "prices")
        );
        self.client
            .query(sql.as_str(), &[])
            .await
            .expect("prices readable")
            .iter()
            .map(|row| (row.get("station_id"), row.get("fuel_type"), row.get("price")))
            .collect()
    }

    async fn teardown(self) {
        let sql = format!("DROP SCHEMA {} CASCADE", quote_identifier(&self.schema));
        self.client.batch_execute(&sql).await.expect("schema dropped");
    }
}

fn prices_table(schema: &str) -> TableSchema {
    TableSchema::new(schema, "prices")
        .with_column("station_id", ColumnType::Text)
        .with_column("fuel_type", ColumnType::Text)
        .with_column("price", ColumnType::Numeric)
}

fn price_batch(rows: &[(&str, &str, f64)]) -> RowBatch {
    RowBatch::from_records(
        rows.iter()
            .map(|(station_id, fuel_type, price)| {
                Record::new()
                    .with("station_id", *station_id)
                    .with("fuel_type", *fuel_type)
                    .with("price", *price)
            })
            .collect(),
    )
    .unwrap()
}

fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[tokio::test]
async fn test_upsert_overwrites_existing_price() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());

    upsert_batch(&db.client, &catalog, &price_batch(&[("A1", "91", 2.50)]), KEY, "prices", schema)
        .await
        .unwrap();
    upsert_batch(&db.client, &catalog, &price_batch(&[("A1", "91", 2.75)]), KEY, "prices", schema)
        .await
        .unwrap();

    assert_eq!(db.prices().await, vec![("A1".into(), "91".into(), decimal("2.75"))]);
    db.teardown().await;
}

#[tokio::test]
async fn test_insert_if_absent_keeps_existing_price() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());

    for price in [2.50, 2.75] {
        insert_batch_if_absent(
            &db.client,
            &catalog,
            &price_batch(&[("A1", "91", price)]),
            KEY,
            "prices",
            schema,
        )
        .await
        .unwrap();
    }

    assert_eq!(db.prices().await, vec![("A1".into(), "91".into(), decimal("2.5"))]);
    db.teardown().await;
}

#[tokio::test]
async fn test_insert_if_absent_adds_only_new_keys() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());

    insert_batch_if_absent(
        &db.client,
        &catalog,
        &price_batch(&[("A1", "91", 2.50)]),
        KEY,
        "prices",
        schema,
    )
    .await
    .unwrap();

    let mixed = price_batch(&[("A1", "91", 2.75), ("B2", "91", 2.60), ("B2", "91", 2.90)]);
    for _ in 0..2 {
        insert_batch_if_absent(&db.client, &catalog, &mixed, KEY, "prices", schema).await.unwrap();
    }

    assert_eq!(
        db.prices().await,
        vec![
            ("A1".into(), "91".into(), decimal("2.5")),
            ("B2".into(), "91".into(), decimal("2.6")),
        ]
    );
    db.teardown().await;
}

#[tokio::test]
async fn test_upsert_keeps_last_row_per_key_and_is_idempotent() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());
    let batch = price_batch(&[("A1", "91", 2.1), ("A2", "91", 2.2), ("A1", "91", 2.3)]);

    for _ in 0..2 {
        upsert_batch(&db.client, &catalog, &batch, KEY, "prices", schema).await.unwrap();
    }

    assert_eq!(
        db.prices().await,
        vec![
            ("A1".into(), "91".into(), decimal("2.3")),
            ("A2".into(), "91".into(), decimal("2.2")),
        ]
    );
    db.teardown().await;
}

#[tokio::test]
async fn test_large_batch_spans_statements_in_one_transaction() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());

    let ids: Vec<String> = (0..2500).map(|i| format!("S{}", i)).collect();
    let rows: Vec<(&str, &str, f64)> = ids.iter().map(|id| (id.as_str(), "D", 1.9)).collect();
    upsert_batch(&db.client, &catalog, &price_batch(&rows), KEY, "prices", schema)
        .await
        .unwrap();

    assert_eq!(db.prices().await.len(), 2500);
    db.teardown().await;
}

#[tokio::test]
async fn test_constraint_violation_rolls_back_whole_batch() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = db.catalog();
    let schema = Some(db.schema.as_str());

    let mut batch = RowBatch::new(["station_id", "fuel_type", "price"]).unwrap();
    batch.push_row(vec!["A1".into(), "91".into(), SqlValue::from(2.0_f64)]).unwrap();
    batch.push_row(vec!["A2".into(), SqlValue::Null, SqlValue::from(2.0_f64)]).unwrap();

    let result = upsert_batch(&db.client, &catalog, &batch, KEY, "prices", schema).await;

    assert!(matches!(result, Err(BatchWriteError::PostgresError(_))));
    assert!(db.prices().await.is_empty());
    db.teardown().await;
}

#[tokio::test]
async fn test_stale_catalog_table_is_not_found() {
    let Some(db) = TestDatabase::new().await else { return };
    let catalog = fuelwatch_catalog("fuelwatch_missing_schema");

    let mut batch = RowBatch::new(["station_id", "fuel_type", "update_time"]).unwrap();
    batch
        .push_row(vec!["A1".into(), "91".into(), chrono::Utc::now().into()])
        .unwrap();

    let result = upsert_batch(
        &db.client,
        &catalog,
        &batch,
        FUEL_PRICES_UNIQUE_KEY,
        FUEL_PRICES_TABLE,
        Some("fuelwatch_missing_schema"),
    )
    .await;

    assert!(matches!(result, Err(BatchWriteError::TableNotFound(_))));
    db.teardown().await;
}

#[tokio::test]
async fn test_reflected_naive_timestamp_is_stored_as_utc_wall_time() {
    let Some(db) = TestDatabase::new().await else { return };
    let table = format_table_name(&db.schema, "readings");
    db.client
        .batch_execute(&format!(
            "CREATE TABLE {} (station_id TEXT PRIMARY KEY, read_at TIMESTAMP)",
            table
        ))
        .await
        .unwrap();
    let catalog = reflect_schema(&db.client, &db.schema).await.unwrap();
    let readings = catalog.lookup("readings", Some(&db.schema)).unwrap();
    assert_eq!(readings.column("read_at").unwrap().column_type, ColumnType::TimestampNaive);

    let read_at = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap();
    let batch = RowBatch::from_records(vec![Record::new()
        .with("station_id", "A1")
        .with("read_at", read_at)])
    .unwrap();
    upsert_batch(&db.client, &catalog, &batch, &["station_id"], "readings", Some(&db.schema))
        .await
        .unwrap();

    let row = db
        .client
        .query_one_or_none(format!("SELECT read_at::TEXT AS read_at FROM {}", table).as_str(), &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<_, String>("read_at"), "2025-03-01 06:30:00");
    db.teardown().await;
}
