//! Record Loader: per-ticker CSV files into date-ordered series.
//!
//! One file per ticker, file stem = ticker symbol. Files with other
//! extensions are ignored. A file that cannot be read, lacks a required
//! column, holds malformed rows, or repeats a date is logged and excluded;
//! the remaining files still load.

use super::schema::RecordSchema;
use crate::domain::{PriceRecord, PriceSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Loaded series keyed by ticker (sorted by ticker).
pub type SeriesMap = BTreeMap<String, PriceSeries>;

/// Close prices keyed by ticker, then by date.
pub type ClosePrices = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read input directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unreadable: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: String, column: String },

    #[error("{path}: row {row}: {reason}")]
    Malformed {
        path: String,
        row: usize,
        reason: String,
    },

    #[error("{path}: file has no records")]
    Empty { path: String },

    #[error("{path}: duplicate date {date} for {ticker}")]
    DuplicateDate {
        path: String,
        ticker: String,
        date: NaiveDate,
    },
}

/// Outcome of a directory load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Tickers that loaded successfully.
    pub loaded: Vec<String>,
    /// `(file, error)` for every excluded file.
    pub failures: Vec<(String, String)>,
    /// Files ignored because of their extension.
    pub ignored: usize,
}

impl LoadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Load every `*.csv` file under `dir` into a ticker → series map.
///
/// Only a missing or unreadable directory is an error; per-file failures are
/// recorded in the report.
pub fn load_price_series(dir: &Path) -> Result<(SeriesMap, LoadReport), LoadError> {
    let mut report = LoadReport::default();
    let mut series = SeriesMap::new();

    for path in list_files(dir)? {
        let Some(ticker) = ticker_for(&path) else {
            log::debug!("ignoring non-csv file {}", path.display());
            report.ignored += 1;
            continue;
        };

        match load_file(&path, &ticker) {
            Ok(s) => {
                report.loaded.push(ticker.clone());
                series.insert(ticker, s);
            }
            Err(e) => {
                log::warn!("skipping {}: {e}", path.display());
                report
                    .failures
                    .push((path.display().to_string(), e.to_string()));
            }
        }
    }

    log::info!(
        "loaded {} ticker(s) from {} ({} failed)",
        report.loaded.len(),
        dir.display(),
        report.failures.len()
    );
    Ok((series, report))
}

/// Close-only mode: ticker → (date → close).
pub fn load_close_prices(dir: &Path) -> Result<(ClosePrices, LoadReport), LoadError> {
    let (series, report) = load_price_series(dir)?;
    Ok((close_prices(&series), report))
}

/// Project loaded series onto their close prices indexed by date.
pub fn close_prices(series: &SeriesMap) -> ClosePrices {
    series
        .iter()
        .map(|(ticker, s)| {
            let by_date = s.records().iter().map(|r| (r.date, r.close)).collect();
            (ticker.clone(), by_date)
        })
        .collect()
}

/// Deterministic BLAKE3 fingerprint over every loaded record.
///
/// Covers tickers, dates and OHLCV in ticker order, so it does not depend on
/// directory iteration order.
pub fn dataset_hash(series: &SeriesMap) -> String {
    let mut hasher = blake3::Hasher::new();
    for (ticker, s) in series {
        hasher.update(ticker.as_bytes());
        for r in s.records() {
            hasher.update(r.date.to_string().as_bytes());
            hasher.update(&r.open.to_le_bytes());
            hasher.update(&r.close.to_le_bytes());
            hasher.update(&r.high.to_le_bytes());
            hasher.update(&r.low.to_le_bytes());
            hasher.update(&r.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let dir_err = |source| LoadError::Directory {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn ticker_for(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("csv") {
        return None;
    }
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}

/// Load and validate a single per-ticker file.
pub fn load_file(path: &Path, ticker: &str) -> Result<PriceSeries, LoadError> {
    let display = path.display().to_string();
    let unreadable = |e: csv::Error| LoadError::Unreadable {
        path: display.clone(),
        reason: e.to_string(),
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(unreadable)?;
    let headers = rdr.headers().map_err(unreadable)?.clone();
    let header_refs: Vec<&str> = headers.iter().collect();
    let cols = RecordSchema::locate(&header_refs).map_err(|column| LoadError::MissingColumn {
        path: display.clone(),
        column,
    })?;

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row_no = i + 1;
        let row = row.map_err(unreadable)?;
        let malformed = |reason: String| LoadError::Malformed {
            path: display.clone(),
            row: row_no,
            reason,
        };
        let cell = |name: &str| row.get(cols[name]).unwrap_or("").trim();
        let price = |name: &str| {
            cell(name)
                .parse::<f64>()
                .map_err(|_| malformed(format!("invalid {name} '{}'", cell(name))))
        };

        let date = RecordSchema::parse_date(cell("date"))
            .ok_or_else(|| malformed(format!("invalid date '{}'", cell("date"))))?;
        records.push(PriceRecord {
            ticker: ticker.to_string(),
            date,
            open: price("open")?,
            close: price("close")?,
            high: price("high")?,
            low: price("low")?,
            volume: parse_volume(cell("volume"))
                .ok_or_else(|| malformed(format!("invalid volume '{}'", cell("volume"))))?,
        });
    }

    if records.is_empty() {
        return Err(LoadError::Empty { path: display });
    }

    let series = PriceSeries::new(ticker, records);
    if let Some(date) = series.first_duplicate_date() {
        return Err(LoadError::DuplicateDate {
            path: display,
            ticker: ticker.to_string(),
            date,
        });
    }
    Ok(series)
}

/// Volume is an integer; whole-valued floats such as `1200.0` are accepted.
fn parse_volume(raw: &str) -> Option<u64> {
    if let Ok(v) = raw.parse::<u64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0).then_some(v as u64)
}
