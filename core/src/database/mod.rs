pub mod batch_operations;
pub mod catalog;
pub mod postgres;
pub mod sql_type_wrapper;
