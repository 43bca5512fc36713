pub mod alerts;
pub mod export;
pub mod scrape;
pub mod sources;
pub mod stats;
