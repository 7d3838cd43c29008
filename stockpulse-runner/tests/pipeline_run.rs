//! Integration tests for the full pipeline: CSV files in, artifacts, manifest
//! and SQLite tables out.

use std::fs;
use std::path::{Path, PathBuf};
use stockpulse_runner::{
    load_csv_dir, read_manifest, Pipeline, PersistStatus, PipelineConfig, ReportQueries,
    SortOrder, SqliteSink, StageName, StageStatus, TableSink,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    config: PipelineConfig,
}

fn write_ticker(dir: &Path, ticker: &str, rows: &[(&str, f64, f64)]) {
    let mut body = String::from("date,open,close,high,low,volume,month\n");
    for (date, open, close) in rows {
        body.push_str(&format!(
            "{date},{open},{close},{},{},5000,{}\n",
            open.max(*close) + 1.0,
            open.min(*close) - 1.0,
            &date[..7]
        ));
    }
    fs::write(dir.join(format!("{ticker}.csv")), body).unwrap();
}

fn fixture(connection: impl FnOnce(&Path) -> String) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stocks");
    fs::create_dir_all(&input).unwrap();

    write_ticker(
        &input,
        "TCS",
        &[
            ("2024-01-30", 100.0, 101.0),
            ("2024-01-31", 101.0, 104.0),
            ("2024-02-01", 104.0, 103.0),
            ("2024-02-02", 103.0, 108.0),
        ],
    );
    write_ticker(
        &input,
        "INFY",
        &[
            ("2024-01-30", 50.0, 49.0),
            ("2024-01-31", 49.0, 47.5),
            ("2024-02-01", 47.5, 48.0),
            ("2024-02-02", 48.0, 46.0),
        ],
    );
    write_ticker(
        &input,
        "HDFCBANK",
        &[
            ("2024-01-30", 10.0, 10.2),
            ("2024-01-31", 10.2, 10.1),
            ("2024-02-01", 10.1, 10.4),
            ("2024-02-02", 10.4, 10.3),
        ],
    );

    let sectors = dir.path().join("sectors.csv");
    fs::write(
        &sectors,
        "COMPANY,sector,Symbol\nTata,IT,TCS: TCS\nInfosys,IT,INFY: INFY\nHDFC,BANKING,HDFCBANK: HDFCBANK\n",
    )
    .unwrap();

    let config = PipelineConfig {
        input_path: input,
        output_path: dir.path().join("out"),
        sector_reference_path: sectors,
        connection_string: connection(dir.path()),
        raw_path: None,
        write_parquet: false,
    };
    Fixture { _dir: dir, config }
}

fn db_path(root: &Path) -> PathBuf {
    root.join("stocks.db")
}

#[test]
fn full_run_exports_and_persists_every_stage() {
    let fx = fixture(|root| format!("sqlite://{}", db_path(root).display()));
    let output = Pipeline::new(fx.config.clone()).run(&[], true).unwrap();
    let report = &output.report;

    assert_eq!(report.tickers_loaded, 3);
    assert_eq!(report.stages.len(), 6);
    assert!(report.stages.iter().all(|s| s.status.is_completed()), "{report:#?}");
    assert!(report.persistence_error.is_none());
    assert_eq!(report.dataset_hash.len(), 64);

    for stage in StageName::ALL {
        let csv = fx
            .config
            .output_path
            .join(format!("{}.csv", stage.artifact().name()));
        assert!(csv.exists(), "missing {}", csv.display());
    }

    // Round trip: stored row counts equal computed row counts.
    let sink = SqliteSink::connect(&fx.config.connection_string).unwrap();
    for table in &output.tables {
        let stored = sink.row_count(&table.sql_table_name()).unwrap();
        assert_eq!(stored, Some(table.row_count()), "{}", table.name());
    }

    let manifest = read_manifest(&fx.config.output_path).unwrap();
    assert_eq!(manifest.dataset_hash, report.dataset_hash);
    assert!(manifest.finished_at.is_some());
    assert_eq!(manifest.persistence.len(), output.tables.len());

    let queries = ReportQueries::new(sink.connection());
    let best = queries.top_sectors(10, SortOrder::Descending).unwrap();
    // BANKING: +0.98%; IT: mean of +6.93% and -6.12%.
    assert_eq!(best.len(), 2);
    assert_eq!(best[0].sector, "BANKING");
    assert_eq!(best[1].sector, "IT");
}

#[test]
fn sector_failure_skips_nothing_else() {
    let mut fx = fixture(|_| "sqlite::memory:".into());
    fx.config.sector_reference_path = fx.config.input_path.join("missing.csv");

    let output = Pipeline::new(fx.config.clone()).run(&[], false).unwrap();
    let report = &output.report;

    let sector = report.stage(StageName::SectorReturn).unwrap();
    assert!(matches!(sector.status, StageStatus::Failed { .. }));
    assert_eq!(report.failed_stages(), vec![StageName::SectorReturn]);
    assert_eq!(output.tables.len(), 5);
    assert!(report.persistence.is_empty());
}

#[test]
fn selection_pulls_in_dependencies() {
    let fx = fixture(|_| "sqlite::memory:".into());
    let output = Pipeline::new(fx.config.clone())
        .run(&[StageName::SectorReturn], false)
        .unwrap();
    let ran: Vec<StageName> = output.report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(ran, vec![StageName::CumulativeReturn, StageName::SectorReturn]);
}

#[test]
fn bad_connection_keeps_artifacts() {
    let fx = fixture(|_| "mysql://root@localhost/stocks".into());
    let output = Pipeline::new(fx.config.clone()).run(&[], true).unwrap();

    assert!(output.report.persistence_error.is_some());
    assert!(output.report.stages.iter().all(|s| s.status.is_completed()));
    assert!(fx
        .config
        .output_path
        .join("Nifty_50_Combined.csv")
        .exists());
}

#[test]
fn load_mode_persists_existing_artifacts() {
    let fx = fixture(|_| "sqlite::memory:".into());
    let output = Pipeline::new(fx.config.clone()).run(&[], false).unwrap();

    let mut sink = SqliteSink::connect("sqlite::memory:").unwrap();
    let outcomes = load_csv_dir(&mut sink, &fx.config.output_path).unwrap();
    assert_eq!(outcomes.len(), 6);

    for table in &output.tables {
        let outcome = outcomes
            .iter()
            .find(|o| o.table == table.sql_table_name())
            .unwrap();
        assert_eq!(
            outcome.status,
            PersistStatus::Written {
                rows: table.row_count()
            }
        );
    }
}
