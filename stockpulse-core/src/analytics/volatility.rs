//! Volatility Calculator.
//!
//! "Yearly volatility" is the sample standard deviation of day-over-day
//! close-price changes over whatever window was loaded. It is not annualized.

use super::stats::{pct_change, sample_std_dev};
use crate::data::SeriesMap;
use crate::domain::{Artifact, ColumnType, DerivedTable, TableError, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volatility {
    pub ticker: String,
    /// `None` when fewer than two returns exist.
    pub volatility: Option<f64>,
}

pub fn volatility(series: &SeriesMap) -> Vec<Volatility> {
    series
        .iter()
        .map(|(ticker, s)| {
            let returns: Vec<f64> = pct_change(&s.closes()).into_iter().flatten().collect();
            let volatility = sample_std_dev(&returns);
            if volatility.is_none() {
                log::debug!("volatility undefined for {ticker}: {} return(s)", returns.len());
            }
            Volatility {
                ticker: ticker.clone(),
                volatility,
            }
        })
        .collect()
}

pub fn volatility_table(rows: &[Volatility]) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::Volatility.name(),
        &[
            ("Ticker", ColumnType::Text),
            ("Yearly Volatility", ColumnType::Float),
        ],
    );
    for row in rows {
        table.push_row(vec![Value::text(&row.ticker), Value::opt_float(row.volatility)])?;
    }
    Ok(table)
}
