//! Daily movers: a read-time view over the combined dataset.
//!
//! Takes each ticker's latest record on or before an optional as-of date and
//! ranks tickers by intraday change `(close - open) / open * 100`. Nothing
//! here is persisted; the result depends on when it is asked.

use crate::analytics::split_counts;
use crate::domain::{DerivedTable, TableError};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("combined dataset has no '{0}' column")]
    MissingColumn(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMover {
    pub ticker: String,
    pub date: String,
    pub open: f64,
    pub close: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMovers {
    /// Highest change first.
    pub gainers: Vec<DailyMover>,
    /// Lowest change first.
    pub losers: Vec<DailyMover>,
    /// Latest date among the selected records.
    pub as_of: Option<String>,
}

const REQUIRED: [&str; 4] = ["Ticker", "date", "open", "close"];

/// Lazily scan a combined dataset CSV artifact.
pub fn scan_combined_csv(path: &Path) -> Result<LazyFrame, ViewError> {
    Ok(LazyCsvReader::new(path).with_has_header(true).finish()?)
}

/// Lazy frame over an in-memory combined table.
pub fn combined_frame(table: &DerivedTable) -> Result<LazyFrame, ViewError> {
    Ok(table.to_dataframe()?.lazy())
}

/// One row per ticker: its latest record (on or before `as_of`) and the
/// intraday change, sorted by change descending.
pub fn latest_day_changes(
    lf: LazyFrame,
    as_of: Option<NaiveDate>,
) -> Result<DataFrame, ViewError> {
    let mut lf = lf;
    let schema = lf.collect_schema()?;
    for name in REQUIRED {
        if !schema.contains(name) {
            return Err(ViewError::MissingColumn(name.to_string()));
        }
    }

    let mut lf = lf.select([
        col("Ticker").cast(DataType::String),
        col("date").cast(DataType::String),
        col("open").cast(DataType::Float64),
        col("close").cast(DataType::Float64),
    ]);
    if let Some(day) = as_of {
        // ISO dates order lexically.
        lf = lf.filter(col("date").lt_eq(lit(day.format("%Y-%m-%d").to_string())));
    }

    let df = lf
        .sort(
            ["Ticker", "date"],
            SortMultipleOptions::default()
                .with_order_descending_multi([false, false])
                .with_maintain_order(true),
        )
        .group_by_stable([col("Ticker")])
        .agg([
            col("date").last(),
            col("open").last(),
            col("close").last(),
        ])
        .with_column(
            ((col("close") - col("open")) / col("open") * lit(100.0)).alias("change_pct"),
        )
        .sort(
            ["change_pct"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?;
    Ok(df)
}

/// Top-`top_n` gainers and losers by latest intraday change.
///
/// Rows with a missing or non-finite change are skipped. The two sets never
/// share a ticker.
pub fn daily_movers(
    lf: LazyFrame,
    as_of: Option<NaiveDate>,
    top_n: usize,
) -> Result<DailyMovers, ViewError> {
    let df = latest_day_changes(lf, as_of)?;

    let tickers = df.column("Ticker")?.as_materialized_series().str()?.clone();
    let dates = df.column("date")?.as_materialized_series().str()?.clone();
    let opens = df.column("open")?.as_materialized_series().f64()?.clone();
    let closes = df.column("close")?.as_materialized_series().f64()?.clone();
    let changes = df.column("change_pct")?.as_materialized_series().f64()?.clone();

    let mut ranked = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(ticker), Some(date), Some(open), Some(close), Some(change_pct)) = (
            tickers.get(i),
            dates.get(i),
            opens.get(i),
            closes.get(i),
            changes.get(i),
        ) else {
            continue;
        };
        if !change_pct.is_finite() {
            log::debug!("daily movers: skipping {ticker} on {date}, open {open}");
            continue;
        }
        ranked.push(DailyMover {
            ticker: ticker.to_string(),
            date: date.to_string(),
            open,
            close,
            change_pct,
        });
    }
    ranked.sort_by(|a, b| {
        b.change_pct
            .total_cmp(&a.change_pct)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let as_of = ranked.iter().map(|m| m.date.clone()).max();
    let (gainers, losers) = split_counts(ranked.len(), top_n);
    let mut movers = DailyMovers {
        gainers: ranked[..gainers].to_vec(),
        losers: ranked[ranked.len() - losers..].to_vec(),
        as_of,
    };
    movers.losers.reverse();
    Ok(movers)
}
