mod client;
mod prices;

pub use client::{
    read_headers_file, BlockQueryError, GaspyClient, GaspyClientError, GaspyClientSettings,
    LoginDetails, DEFAULT_BASE_URL,
};
pub use prices::{
    dedupe_prices, extract_prices, parse_update_time, prices_to_batch, FuelPrice,
    FUEL_PRICE_COLUMNS,
};
