pub mod batch_operations;
pub mod client;
pub mod generate;
pub mod queries;
pub mod reflect;
pub mod setup;
