// public
pub mod manifest;
pub mod scraper;
pub mod stations;

mod database;
pub use database::{
    batch_operations::{update_columns, BatchError, BatchOperationType, Record, RowBatch},
    catalog::{
        fuel_prices_table, fuelwatch_catalog, stations_table, ColumnDefinition, TableCatalog,
        TableNotFoundError, TableSchema, DEFAULT_SCHEMA, FUEL_PRICES_TABLE,
        FUEL_PRICES_UNIQUE_KEY, STATIONS_TABLE, STATIONS_UNIQUE_KEY,
    },
    postgres::{
        batch_operations::{
            build_batch_statements, format_table_name, insert_batch_if_absent, quote_identifier,
            upsert_batch, BatchWriteError, MAX_ROWS_PER_STATEMENT,
        },
        client::{BoundStatement, PostgresClient, PostgresConnectionError, PostgresError},
        generate::{generate_create_table_sql, generate_tables_sql, KeyConstraint},
        queries::{HistoricalPrice, LatestPrice, PriceQueries, UNKNOWN_STATION},
        reflect::reflect_schema,
        setup::{setup_postgres, SetupPostgresError},
    },
    sql_type_wrapper::{ColumnType, SqlValue},
};

mod simple_file_formatters;
pub use simple_file_formatters::csv::{CsvStoreError, CsvTableStore};

mod helpers;
pub use helpers::{format_duration, load_env_from_project_path, natural_cmp};

mod logger;
pub use logger::{log_level_from_verbosity, setup_info_logger, setup_logger};

mod start;
pub use start::{
    client_settings, import_stations, scrape_prices, start_scrape, ImportStationsError,
    ImportSummary, ScrapeResult, ScrapeSummary, StartScrapeError,
};

mod storage;
pub use storage::{PriceStorage, PriceStorageError};
