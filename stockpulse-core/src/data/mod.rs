//! Data ingestion: raw YAML extraction, per-ticker CSV loading, sector reference.

pub mod extract;
pub mod loader;
pub mod schema;
pub mod sector;

pub use extract::{extract_yaml_dir, ExtractError, ExtractSummary};
pub use loader::{
    close_prices, dataset_hash, load_close_prices, load_file, load_price_series, ClosePrices,
    LoadError, LoadReport, SeriesMap,
};
pub use schema::RecordSchema;
pub use sector::{normalize_symbol, SectorMap};
