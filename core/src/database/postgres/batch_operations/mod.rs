//! PostgreSQL batch writes keyed on a unique key.
//!
//! Both operations validate against the caller's table descriptor, render one
//! `INSERT ... ON CONFLICT` statement per chunk of rows, and run every chunk
//! inside a single transaction.

mod query_builder;
mod upsert;

pub use query_builder::{format_table_name, quote_identifier};
pub use upsert::{
    build_batch_statements, insert_batch_if_absent, upsert_batch, BatchWriteError,
    MAX_ROWS_PER_STATEMENT,
};
