//! Named-stage pipeline.
//!
//! Loads the per-ticker files once, runs the selected stages (plus their
//! dependencies) in declaration order, exports each stage's table, and
//! optionally hands the tables to a sink. A failing stage does not stop the
//! run; stages that depend on it are skipped.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockpulse_core::analytics::{
    combined_table, correlation_matrix, correlation_table, cumulative_return_table,
    cumulative_returns, monthly_movers, monthly_movers_table, sector_return_table,
    sector_returns, volatility, volatility_table, CumulativeReturn, TOP_N,
};
use stockpulse_core::data::{
    close_prices, dataset_hash, load_price_series, LoadError, SectorMap, SeriesMap,
};
use stockpulse_core::domain::{Artifact, DerivedTable, TableError};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::export::{export_table, write_manifest};
use crate::sink::{persist_all, PersistOutcome, SqliteSink, TableSink};

/// Current schema version of the run manifest.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("cannot load input: {0}")]
    Input(#[source] LoadError),

    #[error("cannot load sector reference: {0}")]
    Sectors(#[source] LoadError),

    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("export failed: {0}")]
    Export(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Volatility,
    CumulativeReturn,
    SectorReturn,
    Correlation,
    MonthlyMovers,
    Combined,
}

impl StageName {
    /// Declaration order; also the execution order.
    pub const ALL: [StageName; 6] = [
        StageName::Volatility,
        StageName::CumulativeReturn,
        StageName::SectorReturn,
        StageName::Correlation,
        StageName::MonthlyMovers,
        StageName::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volatility => "volatility",
            Self::CumulativeReturn => "cumulative_return",
            Self::SectorReturn => "sector_return",
            Self::Correlation => "correlation",
            Self::MonthlyMovers => "monthly_movers",
            Self::Combined => "combined",
        }
    }

    pub fn artifact(&self) -> Artifact {
        match self {
            Self::Volatility => Artifact::Volatility,
            Self::CumulativeReturn => Artifact::CumulativeReturn,
            Self::SectorReturn => Artifact::SectorReturn,
            Self::Correlation => Artifact::Correlation,
            Self::MonthlyMovers => Artifact::MonthlyMovers,
            Self::Combined => Artifact::Combined,
        }
    }

    pub fn dependencies(&self) -> &'static [StageName] {
        match self {
            Self::SectorReturn => &[StageName::CumulativeReturn],
            _ => &[],
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| StageError::UnknownStage(s.to_string()))
    }
}

/// Stages to run for `selection`: the selection plus transitive dependencies,
/// in declaration order. An empty selection means every stage.
pub fn resolve_stages(selection: &[StageName]) -> Vec<StageName> {
    if selection.is_empty() {
        return StageName::ALL.to_vec();
    }
    let mut wanted: Vec<StageName> = selection.to_vec();
    let mut i = 0;
    while i < wanted.len() {
        for dep in wanted[i].dependencies() {
            if !wanted.contains(dep) {
                wanted.push(*dep);
            }
        }
        i += 1;
    }
    StageName::ALL
        .into_iter()
        .filter(|s| wanted.contains(s))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed { rows: usize },
    Failed { reason: String },
    Skipped { reason: String },
}

impl StageStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageName,
    pub artifact: String,
    #[serde(flatten)]
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Everything a run did, written as `run_manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// BLAKE3 fingerprint of the loaded records.
    pub dataset_hash: String,
    pub tickers_loaded: usize,
    /// `(file, reason)` for every input file that failed to load.
    #[serde(default)]
    pub load_failures: Vec<(String, String)>,
    pub stages: Vec<StageReport>,
    #[serde(default)]
    pub persistence: Vec<PersistOutcome>,
    /// Set when the store could not be reached at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunReport {
    pub fn new(dataset_hash: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            started_at: Utc::now(),
            finished_at: None,
            dataset_hash,
            tickers_loaded: 0,
            load_failures: Vec::new(),
            stages: Vec::new(),
            persistence: Vec::new(),
            persistence_error: None,
        }
    }

    pub fn stage(&self, stage: StageName) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn failed_stages(&self) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|s| matches!(s.status, StageStatus::Failed { .. }))
            .map(|s| s.stage)
            .collect()
    }
}

/// Result of a run: the report and the tables that completed.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: RunReport,
    pub tables: Vec<DerivedTable>,
}

/// Values produced by earlier stages that later stages read.
#[derive(Default)]
struct StageContext {
    cumulative: Option<Vec<CumulativeReturn>>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `selection` and persist into the configured store when `persist`
    /// is set. A connection failure is recorded in the report; the computed
    /// artifacts are still exported.
    pub fn run(&self, selection: &[StageName], persist: bool) -> Result<PipelineOutput, StageError> {
        if !persist {
            return self.run_with_sink(selection, None);
        }
        match SqliteSink::connect(&self.config.connection_string) {
            Ok(mut sink) => self.run_with_sink(selection, Some(&mut sink as &mut dyn TableSink)),
            Err(e) => {
                log::error!("persistence disabled for this run: {e}");
                let mut output = self.run_with_sink(selection, None)?;
                output.report.persistence_error = Some(e.to_string());
                self.finish(&mut output.report);
                Ok(output)
            }
        }
    }

    /// Run `selection` and hand completed tables to `sink`, if any.
    ///
    /// Only an unreadable input directory or output directory aborts the run.
    pub fn run_with_sink(
        &self,
        selection: &[StageName],
        sink: Option<&mut dyn TableSink>,
    ) -> Result<PipelineOutput, StageError> {
        let output_dir = &self.config.output_path;
        std::fs::create_dir_all(output_dir).map_err(|source| StageError::OutputDir {
            path: output_dir.display().to_string(),
            source,
        })?;

        let (series, load_report) =
            load_price_series(&self.config.input_path).map_err(StageError::Input)?;
        let mut report = RunReport::new(dataset_hash(&series));
        report.tickers_loaded = series.len();
        report.load_failures = load_report.failures;

        let stages = resolve_stages(selection);
        log::info!(
            "running {} stage(s) over {} ticker(s): {}",
            stages.len(),
            series.len(),
            stages
                .iter()
                .map(StageName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut ctx = StageContext::default();
        let mut tables = Vec::new();

        for stage in stages {
            let blocked = stage.dependencies().iter().find(|dep| {
                !report
                    .stage(**dep)
                    .is_some_and(|r| r.status.is_completed())
            });

            let mut warnings = Vec::new();
            let status = if let Some(dep) = blocked {
                let reason = format!("dependency {dep} did not complete");
                log::warn!("skipping stage {stage}: {reason}");
                StageStatus::Skipped { reason }
            } else {
                match self.execute(stage, &series, &mut ctx, &mut warnings) {
                    Ok(table) => {
                        let rows = table.row_count();
                        log::info!("stage {stage}: {rows} row(s) -> {}", table.name());
                        tables.push(table);
                        StageStatus::Completed { rows }
                    }
                    Err(e) => {
                        log::error!("stage {stage} failed: {e}");
                        StageStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            };

            report.stages.push(StageReport {
                stage,
                artifact: stage.artifact().name().to_string(),
                status,
                warnings,
            });
        }

        if let Some(sink) = sink {
            report.persistence = persist_all(sink, &tables);
        }

        self.finish(&mut report);
        Ok(PipelineOutput { report, tables })
    }

    fn finish(&self, report: &mut RunReport) {
        report.finished_at = Some(Utc::now());
        if let Err(e) = write_manifest(report, &self.config.output_path) {
            log::error!("{e:#}");
        }
    }

    fn execute(
        &self,
        stage: StageName,
        series: &SeriesMap,
        ctx: &mut StageContext,
        warnings: &mut Vec<String>,
    ) -> Result<DerivedTable, StageError> {
        let table = match stage {
            StageName::Volatility => {
                let rows = volatility(series);
                for row in rows.iter().filter(|r| r.volatility.is_none()) {
                    warnings.push(format!("volatility undefined for {}", row.ticker));
                }
                volatility_table(&rows)?
            }
            StageName::CumulativeReturn => {
                let out = cumulative_returns(series);
                warnings.extend(out.insufficient.iter().map(ToString::to_string));
                let table = cumulative_return_table(&out.rows)?;
                ctx.cumulative = Some(out.rows);
                table
            }
            StageName::SectorReturn => {
                let sectors = self.sectors()?;
                let returns = ctx.cumulative.as_deref().unwrap_or_default();
                let out = sector_returns(returns, &sectors);
                if !out.unmatched.is_empty() {
                    warnings.push(format!(
                        "no sector for {} ticker(s): {}",
                        out.unmatched.len(),
                        out.unmatched.join(", ")
                    ));
                }
                sector_return_table(&out.rows)?
            }
            StageName::Correlation => {
                let matrix = correlation_matrix(&close_prices(series));
                correlation_table(&matrix.to_long())?
            }
            StageName::MonthlyMovers => monthly_movers_table(&monthly_movers(series, TOP_N))?,
            StageName::Combined => combined_table(series)?,
        };

        export_table(&table, &self.config.output_path, self.config.write_parquet)
            .map_err(|e| StageError::Export(format!("{e:#}")))?;
        Ok(table)
    }

    fn sectors(&self) -> Result<SectorMap, StageError> {
        SectorMap::from_file(&self.config.sector_reference_path).map_err(StageError::Sectors)
    }
}

/// Stage listing for display: `(name, artifact, dependencies)`.
pub fn describe_stages() -> Vec<(StageName, Artifact, &'static [StageName])> {
    StageName::ALL
        .into_iter()
        .map(|s| (s, s.artifact(), s.dependencies()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip() {
        for stage in StageName::ALL {
            assert_eq!(stage.as_str().parse::<StageName>().unwrap(), stage);
        }
        assert_eq!("Sector-Return".parse::<StageName>().unwrap(), StageName::SectorReturn);
        assert!(matches!(
            "sharpe".parse::<StageName>(),
            Err(StageError::UnknownStage(_))
        ));
    }

    #[test]
    fn dependencies_are_pulled_in() {
        assert_eq!(
            resolve_stages(&[StageName::SectorReturn]),
            vec![StageName::CumulativeReturn, StageName::SectorReturn]
        );
        assert_eq!(
            resolve_stages(&[StageName::Combined, StageName::Volatility]),
            vec![StageName::Volatility, StageName::Combined]
        );
        assert_eq!(resolve_stages(&[]).len(), StageName::ALL.len());
    }

    #[test]
    fn every_stage_has_its_own_artifact() {
        let artifacts: std::collections::BTreeSet<_> =
            StageName::ALL.iter().map(|s| s.artifact().name()).collect();
        assert_eq!(artifacts.len(), StageName::ALL.len());
    }
}
