//! Domain types for StockPulse.

pub mod artifact;
pub mod record;
pub mod table;

pub use artifact::Artifact;
pub use record::{month_key, PriceRecord, PriceSeries};
pub use table::{ColumnType, DerivedTable, TableError, Value};
