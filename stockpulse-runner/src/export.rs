//! Artifact export: CSV (always), Parquet (opt-in) and the JSON run manifest.
//!
//! The manifest carries a `schema_version`; unknown versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stockpulse_core::domain::DerivedTable;

use crate::pipeline::{RunReport, SCHEMA_VERSION};

pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Write `table` as `<name>.csv` (and `<name>.parquet`) under `dir`.
///
/// Returns the paths written.
pub fn export_table(table: &DerivedTable, dir: &Path, write_parquet: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let csv_path = dir.join(format!("{}.csv", table.name()));
    table
        .write_csv(&csv_path)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    written.push(csv_path);

    if write_parquet {
        let parquet_path = dir.join(format!("{}.parquet", table.name()));
        table
            .write_parquet(&parquet_path)
            .with_context(|| format!("failed to write {}", parquet_path.display()))?;
        written.push(parquet_path);
    }
    Ok(written)
}

/// Serialize a `RunReport` to pretty JSON.
pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write `run_manifest.json` into `dir`.
pub fn write_manifest(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, export_json(report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_manifest(dir: &Path) -> Result<RunReport> {
    let path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
