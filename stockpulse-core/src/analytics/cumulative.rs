//! Cumulative Return Calculator.

use super::InsufficientData;
use crate::data::SeriesMap;
use crate::domain::{Artifact, ColumnType, DerivedTable, TableError, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeReturn {
    pub ticker: String,
    /// Percent: `(last_close - first_close) / first_close * 100`.
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CumulativeReturns {
    /// Sorted by return, descending.
    pub rows: Vec<CumulativeReturn>,
    pub insufficient: Vec<InsufficientData>,
}

pub fn cumulative_returns(series: &SeriesMap) -> CumulativeReturns {
    let mut out = CumulativeReturns::default();

    for (ticker, s) in series {
        let (Some(first), Some(last)) = (s.first(), s.last()) else {
            continue;
        };
        if s.len() < 2 {
            let warning = InsufficientData {
                ticker: ticker.clone(),
                computation: "cumulative return".into(),
                required: 2,
                actual: s.len(),
            };
            log::warn!("{warning}");
            out.insufficient.push(warning);
            continue;
        }
        if first.close == 0.0 || !first.close.is_finite() || !last.close.is_finite() {
            log::warn!("cumulative return undefined for {ticker}: first close {}", first.close);
            continue;
        }
        out.rows.push(CumulativeReturn {
            ticker: ticker.clone(),
            cumulative_return: (last.close - first.close) / first.close * 100.0,
        });
    }

    out.rows.sort_by(|a, b| {
        b.cumulative_return
            .total_cmp(&a.cumulative_return)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    out
}

pub fn cumulative_return_table(rows: &[CumulativeReturn]) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::CumulativeReturn.name(),
        &[
            ("Ticker", ColumnType::Text),
            ("Cumulative Return", ColumnType::Float),
        ],
    );
    for row in rows {
        table.push_row(vec![
            Value::text(&row.ticker),
            Value::float(row.cumulative_return),
        ])?;
    }
    Ok(table)
}
