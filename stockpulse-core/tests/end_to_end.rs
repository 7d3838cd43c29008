//! End-to-end: per-ticker CSV files on disk through every calculator.

use std::fs;
use std::path::Path;
use stockpulse_core::analytics::{
    combined_table, correlation_matrix, cumulative_returns, monthly_movers, sector_returns,
    volatility, MoverCategory, TOP_N,
};
use stockpulse_core::data::{close_prices, load_price_series, LoadError, SectorMap};

const DATES: [&str; 3] = ["2024-01-02", "2024-01-03", "2024-01-04"];

fn write_ticker(dir: &Path, ticker: &str, closes: &[f64]) {
    let mut body = String::from("Ticker,close,date,high,low,month,open,volume\n");
    for (date, close) in DATES.iter().zip(closes) {
        body.push_str(&format!(
            "{ticker},{close},{date} 05:30:00,{},{},2024-01,{close},1000\n",
            close + 1.0,
            close - 1.0
        ));
    }
    fs::write(dir.join(format!("{ticker}.csv")), body).unwrap();
}

#[test]
fn two_ticker_example() {
    let dir = tempfile::tempdir().unwrap();
    write_ticker(dir.path(), "A", &[100.0, 110.0, 121.0]);
    write_ticker(dir.path(), "B", &[50.0, 45.0, 40.0]);

    let (series, report) = load_price_series(dir.path()).unwrap();
    assert!(report.all_succeeded());
    assert_eq!(series.len(), 2);

    let cumulative = cumulative_returns(&series);
    assert_eq!(cumulative.rows.len(), 2);
    assert_eq!(cumulative.rows[0].ticker, "A");
    assert!((cumulative.rows[0].cumulative_return - 21.0).abs() < 1e-9);
    assert!((cumulative.rows[1].cumulative_return + 20.0).abs() < 1e-9);

    let sectors = SectorMap::from_pairs([("NSE: A", "IT"), ("NSE: B", "IT")]);
    let by_sector = sector_returns(&cumulative.rows, &sectors);
    assert_eq!(by_sector.rows.len(), 1);
    assert!((by_sector.rows[0].average_return - 0.5).abs() < 1e-9);

    let combined = combined_table(&series).unwrap();
    assert_eq!(combined.row_count(), 6);
}

#[test]
fn inverse_trends_are_volatile_and_anti_correlated() {
    // A rises by a non-constant rate so its returns have variance.
    let dir = tempfile::tempdir().unwrap();
    write_ticker(dir.path(), "A", &[100.0, 110.0, 125.0]);
    write_ticker(dir.path(), "B", &[50.0, 45.0, 38.0]);

    let (series, _) = load_price_series(dir.path()).unwrap();

    let vol = volatility(&series);
    assert!(vol.iter().all(|v| v.volatility.unwrap() > 0.0));

    let matrix = correlation_matrix(&close_prices(&series));
    let r = matrix.get("A", "B").unwrap();
    assert!((r + 1.0).abs() < 1e-9, "got {r}");
    assert_eq!(matrix.get("B", "A"), Some(r));
    assert_eq!(matrix.to_long().len(), 4);

    let movers = monthly_movers(&series, TOP_N);
    assert_eq!(movers.len(), 2);
    assert_eq!(movers[0].category, MoverCategory::Gainer);
    assert_eq!(movers[0].ticker, "A");
    assert_eq!(movers[1].category, MoverCategory::Loser);
}

#[test]
fn broken_files_do_not_stop_the_load() {
    let dir = tempfile::tempdir().unwrap();
    write_ticker(dir.path(), "GOOD", &[10.0, 11.0, 12.0]);
    fs::write(dir.path().join("BAD.csv"), "date,open\n2024-01-02,1.0\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "not a ticker").unwrap();

    let (series, report) = load_price_series(dir.path()).unwrap();
    assert_eq!(series.len(), 1);
    assert!(series.contains_key("GOOD"));
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].0.ends_with("BAD.csv"));
    assert!(!report.all_succeeded());
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_price_series(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, LoadError::Directory { .. }));
}
