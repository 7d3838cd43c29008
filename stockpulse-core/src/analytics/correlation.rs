//! Correlation Calculator.
//!
//! Close prices are aligned on the union of all trading dates. A ticker with
//! no record on a date carries its previous close forward, so the gap day
//! shows a zero return; dates before its first record stay missing. Daily
//! returns are then correlated pairwise over the dates where both tickers
//! have a return.

use super::stats::{forward_fill, pct_change, pearson};
use crate::data::ClosePrices;
use crate::domain::{Artifact, ColumnType, DerivedTable, TableError, Value};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Symmetric ticker × ticker correlation of daily returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    tickers: Vec<String>,
    /// Row-major, `tickers.len()²` cells. `None` where undefined.
    values: Vec<Option<f64>>,
}

/// One cell of the long-form correlation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub stock_1: String,
    pub stock_2: String,
    pub correlation: f64,
}

impl CorrelationMatrix {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.tickers.iter().position(|t| t == a)?;
        let j = self.tickers.iter().position(|t| t == b)?;
        self.values[i * self.tickers.len() + j]
    }

    /// Every defined (ordered) pair, diagonal included. Undefined cells are dropped.
    pub fn to_long(&self) -> Vec<CorrelationPair> {
        let n = self.tickers.len();
        let mut out = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if let Some(r) = self.values[i * n + j] {
                    out.push(CorrelationPair {
                        stock_1: self.tickers[i].clone(),
                        stock_2: self.tickers[j].clone(),
                        correlation: r,
                    });
                }
            }
        }
        out
    }
}

pub fn correlation_matrix(closes: &ClosePrices) -> CorrelationMatrix {
    let dates: Vec<NaiveDate> = closes
        .values()
        .flat_map(|by_date| by_date.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let tickers: Vec<String> = closes.keys().cloned().collect();
    let returns: Vec<Vec<Option<f64>>> = closes
        .values()
        .map(|by_date| {
            let aligned: Vec<f64> = dates
                .iter()
                .map(|d| by_date.get(d).copied().unwrap_or(f64::NAN))
                .collect();
            pct_change(&forward_fill(&aligned))
        })
        .collect();

    let n = tickers.len();
    let mut values = vec![None; n * n];
    for i in 0..n {
        for j in i..n {
            let r = if i == j {
                // Defined for any ticker with two or more returns, even flat ones.
                let observed = returns[i].iter().flatten().count();
                (observed >= 2).then_some(1.0)
            } else {
                pearson(&returns[i], &returns[j])
            };
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }

    let undefined = values.iter().filter(|v| v.is_none()).count();
    if undefined > 0 {
        log::debug!("correlation: {undefined} of {} cell(s) undefined", n * n);
    }

    CorrelationMatrix { tickers, values }
}

pub fn correlation_table(pairs: &[CorrelationPair]) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::Correlation.name(),
        &[
            ("Stock_1", ColumnType::Text),
            ("Stock_2", ColumnType::Text),
            ("Correlation", ColumnType::Float),
        ],
    );
    for pair in pairs {
        table.push_row(vec![
            Value::text(&pair.stock_1),
            Value::text(&pair.stock_2),
            Value::float(pair.correlation),
        ])?;
    }
    Ok(table)
}
