pub mod init;
pub mod prices;
pub mod scrape;
pub mod stations;
