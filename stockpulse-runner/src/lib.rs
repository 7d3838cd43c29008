//! StockPulse Runner: pipeline orchestration, artifact export, persistence.
//!
//! This crate builds on `stockpulse-core` to provide:
//! - TOML configuration with per-field overrides
//! - The named-stage pipeline and its JSON run manifest
//! - CSV / Parquet artifact export
//! - The SQLite persistence sink and a standalone `load` mode
//! - Read-only presentation queries over the persisted tables

pub mod config;
pub mod export;
pub mod pipeline;
pub mod query;
pub mod sink;

pub use config::{ConfigError, PartialConfig, PipelineConfig};
pub use export::{export_table, read_manifest, write_manifest, MANIFEST_FILE};
pub use pipeline::{
    describe_stages, resolve_stages, Pipeline, PipelineOutput, RunReport, StageError, StageName,
    StageReport, StageStatus, SCHEMA_VERSION,
};
pub use query::{MarketSummary, QueryError, ReportQueries, SectorRow, SortOrder, VolatilityRow};
pub use sink::{
    load_csv_dir, persist_all, ConnectionError, PersistOutcome, PersistStatus, PersistenceError,
    SqliteSink, SqliteTarget, TableSink,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_report_is_send_sync() {
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
    }

    #[test]
    fn pipeline_config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn sqlite_sink_is_send() {
        assert_send::<SqliteSink>();
    }
}
