//! Combined Dataset Builder: every loaded record in one flat table.

use crate::data::SeriesMap;
use crate::domain::{Artifact, ColumnType, DerivedTable, TableError, Value};

/// Rows ordered by ticker, then date. `month` is derived from the date.
pub fn combined_table(series: &SeriesMap) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::Combined.name(),
        &[
            ("date", ColumnType::Text),
            ("open", ColumnType::Float),
            ("close", ColumnType::Float),
            ("high", ColumnType::Float),
            ("low", ColumnType::Float),
            ("volume", ColumnType::Integer),
            ("month", ColumnType::Text),
            ("Ticker", ColumnType::Text),
        ],
    );
    for (ticker, s) in series {
        for r in s.records() {
            let volume = i64::try_from(r.volume).map_err(|_| TableError::TypeMismatch {
                column: "volume".into(),
                expected: ColumnType::Integer,
                value: Value::Text(r.volume.to_string()),
            })?;
            table.push_row(vec![
                Value::text(r.date.format("%Y-%m-%d").to_string()),
                Value::float(r.open),
                Value::float(r.close),
                Value::float(r.high),
                Value::float(r.low),
                Value::Integer(volume),
                Value::text(r.month()),
                Value::text(ticker),
            ])?;
        }
    }
    Ok(table)
}
