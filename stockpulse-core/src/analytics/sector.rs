//! Sector Return Aggregator.

use super::cumulative::CumulativeReturn;
use super::stats::mean;
use crate::data::SectorMap;
use crate::domain::{Artifact, ColumnType, DerivedTable, TableError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorReturn {
    pub sector: String,
    /// Arithmetic mean of member cumulative returns (percent).
    pub average_return: f64,
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorReturns {
    /// Sorted by sector name.
    pub rows: Vec<SectorReturn>,
    /// Tickers with a return but no sector assignment.
    pub unmatched: Vec<String>,
}

pub fn sector_returns(returns: &[CumulativeReturn], sectors: &SectorMap) -> SectorReturns {
    let mut members: BTreeMap<&str, Vec<&CumulativeReturn>> = BTreeMap::new();
    let mut unmatched = Vec::new();

    for r in returns {
        match sectors.sector_for(&r.ticker) {
            Some(sector) => members.entry(sector).or_default().push(r),
            None => unmatched.push(r.ticker.clone()),
        }
    }

    if !unmatched.is_empty() {
        unmatched.sort();
        log::warn!(
            "{} ticker(s) have no sector assignment: {}",
            unmatched.len(),
            unmatched.join(", ")
        );
    }

    let rows = members
        .into_iter()
        .filter_map(|(sector, rs)| {
            let values: Vec<f64> = rs.iter().map(|r| r.cumulative_return).collect();
            let mut tickers: Vec<String> = rs.iter().map(|r| r.ticker.clone()).collect();
            tickers.sort();
            mean(&values).map(|average_return| SectorReturn {
                sector: sector.to_string(),
                average_return,
                tickers,
            })
        })
        .collect();

    SectorReturns { rows, unmatched }
}

pub fn sector_return_table(rows: &[SectorReturn]) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::SectorReturn.name(),
        &[
            ("sector", ColumnType::Text),
            ("Average Yearly Return (%)", ColumnType::Float),
        ],
    );
    for row in rows {
        table.push_row(vec![
            Value::text(&row.sector),
            Value::float(row.average_return),
        ])?;
    }
    Ok(table)
}
