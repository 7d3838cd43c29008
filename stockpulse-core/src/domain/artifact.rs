//! Named output artifacts and their column contracts.

use serde::{Deserialize, Serialize};

/// One of the six derived datasets the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Artifact {
    Volatility,
    CumulativeReturn,
    SectorReturn,
    Correlation,
    MonthlyMovers,
    Combined,
}

impl Artifact {
    pub const ALL: [Artifact; 6] = [
        Artifact::Volatility,
        Artifact::CumulativeReturn,
        Artifact::SectorReturn,
        Artifact::Correlation,
        Artifact::MonthlyMovers,
        Artifact::Combined,
    ];

    /// Artifact name, also the CSV file stem.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Volatility => "Volatility_Analysis",
            Self::CumulativeReturn => "Cumulative_Return_Analysis",
            Self::SectorReturn => "Sector_Wise_Yearly_Return",
            Self::Correlation => "Stock_Correlation_Long",
            Self::MonthlyMovers => "Top_Gainers_Losers_Monthly",
            Self::Combined => "Nifty_50_Combined",
        }
    }

    /// Header row, in order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Volatility => &["Ticker", "Yearly Volatility"],
            Self::CumulativeReturn => &["Ticker", "Cumulative Return"],
            Self::SectorReturn => &["sector", "Average Yearly Return (%)"],
            Self::Correlation => &["Stock_1", "Stock_2", "Correlation"],
            Self::MonthlyMovers => &["month", "ticker", "monthly_return", "category"],
            Self::Combined => &[
                "date", "open", "close", "high", "low", "volume", "month", "Ticker",
            ],
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name())
    }

    /// Look up an artifact by its name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for artifact in Artifact::ALL {
            assert_eq!(Artifact::from_name(artifact.name()), Some(artifact));
        }
        assert_eq!(
            Artifact::from_name("stock_correlation_long"),
            Some(Artifact::Correlation)
        );
        assert_eq!(Artifact::from_name("unknown"), None);
    }

    #[test]
    fn combined_keeps_fixed_column_subset() {
        assert_eq!(Artifact::Combined.columns().len(), 8);
        assert_eq!(Artifact::Combined.columns().last(), Some(&"Ticker"));
    }
}
