//! Metric calculators: pure functions over loaded price series.
//!
//! Each calculator consumes the loaded series (borrowed, never mutated) and
//! returns typed rows plus a `*_table` builder for its output artifact.

pub mod combined;
pub mod correlation;
pub mod cumulative;
pub mod monthly;
pub mod sector;
pub mod stats;
pub mod volatility;

use serde::{Deserialize, Serialize};

pub use combined::combined_table;
pub use correlation::{correlation_matrix, correlation_table, CorrelationMatrix, CorrelationPair};
pub use cumulative::{
    cumulative_return_table, cumulative_returns, CumulativeReturn, CumulativeReturns,
};
pub use monthly::{
    monthly_movers, monthly_movers_table, representative_monthly_returns, split_counts,
    MonthlyMover, MoverCategory, TOP_N,
};
pub use sector::{sector_return_table, sector_returns, SectorReturn, SectorReturns};
pub use volatility::{volatility, volatility_table, Volatility};

/// A ticker excluded from a computation because its series is too short.
///
/// Not an error: the computation continues without the ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientData {
    pub ticker: String,
    pub computation: String,
    pub required: usize,
    pub actual: usize,
}

impl std::fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "not enough data for {} to calculate {}: need {} records, have {}",
            self.ticker, self.computation, self.required, self.actual
        )
    }
}
