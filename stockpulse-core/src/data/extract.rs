//! Raw YAML extraction: monthly YAML dumps into one CSV per ticker.
//!
//! The raw layout is a directory tree of `.yaml`/`.yml` files, each a
//! sequence of daily records for many tickers. Extraction regroups them by
//! ticker, sorts by date, and writes `<TICKER>.csv` files that the record
//! loader reads.

use super::schema::RecordSchema;
use crate::domain::month_key;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ticker used for records that do not name one.
pub const UNKNOWN_TICKER: &str = "UNKNOWN";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot read raw directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("cannot write {path}: {reason}")]
    Write { path: String, reason: String },
}

/// What an extraction pass did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractSummary {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub records: usize,
    pub records_skipped: usize,
    pub tickers_written: usize,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Ticker")]
    ticker: Option<String>,
    date: Option<String>,
    open: Option<f64>,
    close: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    volume: Option<f64>,
    month: Option<String>,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    date: String,
    open: f64,
    close: f64,
    high: f64,
    low: f64,
    volume: u64,
    month: String,
}

/// Extract every YAML file under `raw_dir` into per-ticker CSVs in `out_dir`.
pub fn extract_yaml_dir(raw_dir: &Path, out_dir: &Path) -> Result<ExtractSummary, ExtractError> {
    let mut files = Vec::new();
    collect_yaml_files(raw_dir, &mut files)?;
    files.sort();
    log::info!("found {} YAML file(s) under {}", files.len(), raw_dir.display());

    let mut summary = ExtractSummary {
        files_scanned: files.len(),
        ..Default::default()
    };
    let mut by_ticker: BTreeMap<String, Vec<(NaiveDate, CsvRow)>> = BTreeMap::new();

    for path in &files {
        let records = match parse_file(path) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("error processing file {}: {e}", path.display());
                summary.files_failed += 1;
                continue;
            }
        };
        for record in records {
            match to_row(record) {
                Some((ticker, _, _)) if !is_safe_file_stem(&ticker) => {
                    log::warn!("{}: rejecting record with ticker {ticker:?}", path.display());
                    summary.records_skipped += 1;
                }
                Some((ticker, date, row)) => {
                    summary.records += 1;
                    by_ticker.entry(ticker).or_default().push((date, row));
                }
                None => summary.records_skipped += 1,
            }
        }
    }

    fs::create_dir_all(out_dir).map_err(|e| ExtractError::Write {
        path: out_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    for (ticker, mut rows) in by_ticker {
        rows.sort_by_key(|(date, _)| *date);
        let path = out_dir.join(format!("{ticker}.csv"));
        write_ticker_csv(&path, rows.into_iter().map(|(_, row)| row))?;
        log::debug!("saved {}", path.display());
        summary.tickers_written += 1;
    }

    if summary.records_skipped > 0 {
        log::warn!(
            "skipped {} record(s) with a missing field or unusable ticker",
            summary.records_skipped
        );
    }
    log::info!(
        "extraction complete: {} record(s) for {} ticker(s)",
        summary.records,
        summary.tickers_written
    );
    Ok(summary)
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ExtractError> {
    let dir_err = |source| ExtractError::Directory {
        path: dir.display().to_string(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn parse_file(path: &Path) -> Result<Vec<RawRecord>, ExtractError> {
    let parse_err = |reason: String| ExtractError::Parse {
        path: path.display().to_string(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| parse_err(e.to_string()))?;
    // A file that is not a sequence of records contributes nothing.
    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
    if !value.is_sequence() {
        log::debug!("{} is not a record list, skipping", path.display());
        return Ok(Vec::new());
    }
    serde_yaml::from_value(value).map_err(|e| parse_err(e.to_string()))
}

fn to_row(record: RawRecord) -> Option<(String, NaiveDate, CsvRow)> {
    let date = RecordSchema::parse_date(record.date.as_deref()?)?;
    let (open, close, high, low) = (record.open?, record.close?, record.high?, record.low?);
    let volume = record.volume.unwrap_or(0.0);
    let ticker = record
        .ticker
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            log::warn!("record dated {date} has no Ticker, grouping under {UNKNOWN_TICKER}");
            UNKNOWN_TICKER.to_string()
        });
    let row = CsvRow {
        date: date.format("%Y-%m-%d").to_string(),
        open,
        close,
        high,
        low,
        volume: if volume.is_finite() && volume > 0.0 {
            volume.round() as u64
        } else {
            0
        },
        month: record.month.unwrap_or_else(|| month_key(date)),
    };
    Some((ticker, date, row))
}

/// A ticker becomes `<ticker>.csv` directly under the output directory.
fn is_safe_file_stem(ticker: &str) -> bool {
    !ticker.starts_with('.')
        && !ticker
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

fn write_ticker_csv(path: &Path, rows: impl Iterator<Item = CsvRow>) -> Result<(), ExtractError> {
    let write_err = |reason: String| ExtractError::Write {
        path: path.display().to_string(),
        reason,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(|e| write_err(e.to_string()))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| write_err(e.to_string()))?;
    }
    wtr.flush().map_err(|e| write_err(e.to_string()))
}
