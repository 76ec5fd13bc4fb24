pub mod core;
pub mod scrape;
pub mod storage;
pub mod yaml;
