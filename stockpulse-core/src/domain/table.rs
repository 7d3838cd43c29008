//! DerivedTable: a named, typed, rectangular result.
//!
//! Calculators produce one table each; the runner exports it as CSV (and
//! optionally Parquet) and hands it to the persistence sink. Cells are
//! nullable; NaN floats are stored as null so "undefined" never leaks into
//! downstream files as the string `NaN`.

use polars::prelude::{Column as PlColumn, DataFrame, ParquetWriter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Float cell; NaN and infinities become null.
    pub fn float(v: f64) -> Self {
        if v.is_finite() {
            Value::Float(v)
        } else {
            Value::Null
        }
    }

    pub fn opt_float(v: Option<f64>) -> Self {
        v.map(Value::float).unwrap_or(Value::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// CSV cell text. Floats always carry a decimal point or exponent so a
    /// re-read infers the same column type.
    fn to_csv_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => {
                let s = v.to_string();
                if s.contains(['.', 'e', 'E']) {
                    s
                } else {
                    format!("{s}.0")
                }
            }
            Value::Text(s) => s.clone(),
        }
    }
}

/// In-memory column type; drives the relational type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Float,
    Integer,
    Text,
}

impl ColumnType {
    /// floating → numeric, integer → integer, everything else → text.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Float => "REAL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnType::Float, Value::Float(_))
                | (ColumnType::Float, Value::Integer(_))
                | (ColumnType::Integer, Value::Integer(_))
                | (ColumnType::Text, Value::Text(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table '{table}' expects {expected} values per row, got {actual}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{column}' is {expected:?}, got {value:?}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: Value,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("polars error: {0}")]
    Polars(String),

    #[error("csv file {0} has no header row")]
    MissingHeader(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TableColumn {
    name: String,
    column_type: ColumnType,
    values: Vec<Value>,
}

/// Named rectangular result, stored column-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTable {
    name: String,
    columns: Vec<TableColumn>,
}

impl DerivedTable {
    /// Empty table with the given `(column, type)` schema.
    pub fn new(name: impl Into<String>, schema: &[(&str, ColumnType)]) -> Self {
        Self {
            name: name.into(),
            columns: schema
                .iter()
                .map(|(col, ty)| TableColumn {
                    name: col.to_string(),
                    column_type: *ty,
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    /// Append one row. Integers widen into float columns.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::Arity {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&row) {
            if !column.column_type.accepts(value) {
                return Err(TableError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.column_type,
                    value: value.clone(),
                });
            }
        }
        for (column, value) in self.columns.iter_mut().zip(row) {
            let value = match (column.column_type, value) {
                (ColumnType::Float, Value::Integer(v)) => Value::Float(v as f64),
                (ColumnType::Float, Value::Float(v)) => Value::float(v),
                (_, v) => v,
            };
            column.values.push(value);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.column_type).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Row `i` as borrowed cells.
    pub fn row(&self, i: usize) -> Option<Vec<&Value>> {
        if i >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[i]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count()).map(move |i| self.columns.iter().map(|c| &c.values[i]).collect())
    }

    /// Relational table name: the lower-cased table name.
    pub fn sql_table_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Relational column names: spaces and hyphens become underscores.
    pub fn sql_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| sql_column_name(&c.name))
            .collect()
    }

    // ── CSV ─────────────────────────────────────────────────────────

    pub fn to_csv_string(&self) -> Result<String, TableError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(self.column_names())?;
        for row in self.rows() {
            wtr.write_record(row.iter().map(|v| v.to_csv_field()))?;
        }
        let data = wtr
            .into_inner()
            .map_err(|e| TableError::Io(e.into_error()))?;
        String::from_utf8(data)
            .map_err(|e| TableError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        fs::write(path, self.to_csv_string()?)?;
        Ok(())
    }

    /// Read a CSV file back into a table named after the file stem.
    ///
    /// Column types are inferred: every non-empty cell an integer → Integer,
    /// every non-empty cell numeric → Float, otherwise Text. Empty cells are null.
    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(TableError::MissingHeader(path.display().to_string()));
        }

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (i, cells) in raw.iter_mut().enumerate() {
                cells.push(record.get(i).unwrap_or("").to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| {
                let column_type = infer_type(&cells);
                let values = cells
                    .into_iter()
                    .map(|cell| parse_cell(cell, column_type))
                    .collect();
                TableColumn {
                    name,
                    column_type,
                    values,
                }
            })
            .collect();

        Ok(Self { name, columns })
    }

    // ── Polars ──────────────────────────────────────────────────────

    /// Convert to a Polars DataFrame (Float64 / Int64 / String columns).
    pub fn to_dataframe(&self) -> Result<DataFrame, TableError> {
        let columns: Vec<PlColumn> = self
            .columns
            .iter()
            .map(|c| {
                let name = c.name.as_str().into();
                match c.column_type {
                    ColumnType::Float => PlColumn::new(
                        name,
                        c.values.iter().map(Value::as_f64).collect::<Vec<_>>(),
                    ),
                    ColumnType::Integer => PlColumn::new(
                        name,
                        c.values.iter().map(Value::as_i64).collect::<Vec<_>>(),
                    ),
                    ColumnType::Text => PlColumn::new(
                        name,
                        c.values
                            .iter()
                            .map(|v| v.as_str().map(str::to_string))
                            .collect::<Vec<Option<String>>>(),
                    ),
                }
            })
            .collect();
        DataFrame::new(columns).map_err(|e| TableError::Polars(format!("dataframe creation: {e}")))
    }

    pub fn write_parquet(&self, path: &Path) -> Result<(), TableError> {
        let mut df = self.to_dataframe()?;
        let file = fs::File::create(path)?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| TableError::Polars(format!("write parquet: {e}")))?;
        Ok(())
    }
}

/// Spaces and hyphens replaced with underscores.
pub fn sql_column_name(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

fn infer_type(cells: &[String]) -> ColumnType {
    let present: Vec<&str> = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if present.is_empty() {
        return ColumnType::Float;
    }
    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

fn parse_cell(cell: String, column_type: ColumnType) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match column_type {
        ColumnType::Integer => trimmed.parse().map(Value::Integer).unwrap_or(Value::Null),
        ColumnType::Float => trimmed.parse().map(Value::float).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DerivedTable {
        let mut t = DerivedTable::new(
            "Cumulative_Return_Analysis",
            &[("Ticker", ColumnType::Text), ("Cumulative Return", ColumnType::Float)],
        );
        t.push_row(vec![Value::text("TCS"), Value::Float(21.0)]).unwrap();
        t.push_row(vec![Value::text("INFY"), Value::Float(-20.5)]).unwrap();
        t
    }

    #[test]
    fn push_row_checks_arity() {
        let mut t = sample();
        let err = t.push_row(vec![Value::text("X")]).unwrap_err();
        assert!(matches!(err, TableError::Arity { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn push_row_checks_types() {
        let mut t = sample();
        let err = t
            .push_row(vec![Value::Float(1.0), Value::Float(1.0)])
            .unwrap_err();
        assert!(matches!(err, TableError::TypeMismatch { .. }));
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn nan_becomes_null() {
        let mut t = sample();
        t.push_row(vec![Value::text("NAN"), Value::Float(f64::NAN)])
            .unwrap();
        assert!(t.column("Cumulative Return").unwrap()[2].is_null());
    }

    #[test]
    fn sql_names_follow_naming_rules() {
        let t = sample();
        assert_eq!(t.sql_table_name(), "cumulative_return_analysis");
        assert_eq!(t.sql_column_names(), vec!["Ticker", "Cumulative_Return"]);
        assert_eq!(
            sql_column_name("Average Yearly Return (%)"),
            "Average_Yearly_Return_(%)"
        );
        assert_eq!(sql_column_name("a-b c"), "a_b_c");
    }

    #[test]
    fn csv_keeps_float_columns_float() {
        let csv = sample().to_csv_string().unwrap();
        assert_eq!(
            csv,
            "Ticker,Cumulative Return\nTCS,21.0\nINFY,-20.5\n"
        );
    }

    #[test]
    fn read_csv_infers_column_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Mixed.csv");
        fs::write(&path, "name,count,ratio,note\na,1,1.5,\nb,2,2,x\n").unwrap();

        let t = DerivedTable::read_csv(&path).unwrap();
        assert_eq!(t.name(), "Mixed");
        assert_eq!(
            t.column_types(),
            vec![
                ColumnType::Text,
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Text
            ]
        );
        assert_eq!(t.column("ratio").unwrap()[1], Value::Float(2.0));
        assert!(t.column("note").unwrap()[0].is_null());
    }

    #[test]
    fn csv_write_then_read_preserves_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cumulative_Return_Analysis.csv");
        let original = sample();
        original.write_csv(&path).unwrap();

        let reread = DerivedTable::read_csv(&path).unwrap();
        assert_eq!(reread.row_count(), original.row_count());
        assert_eq!(reread.column_types(), original.column_types());
    }

    #[test]
    fn dataframe_conversion_keeps_height_and_nulls() {
        let mut t = sample();
        t.push_row(vec![Value::text("NULL"), Value::Null]).unwrap();
        let df = t.to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 2);
        assert_eq!(df.column("Cumulative Return").unwrap().null_count(), 1);
    }
}
