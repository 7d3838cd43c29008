//! Read-only presentation queries over the persisted tables.
//!
//! These are the aggregates the dashboard issues; column names follow the
//! SQL naming of the sink (spaces and hyphens become underscores).

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use stockpulse_core::analytics::{CorrelationPair, MonthlyMover, MoverCategory};
use thiserror::Error;

use crate::sink::quote_ident;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("table {0} has not been persisted")]
    MissingTable(String),

    #[error("query on {table} failed: {source}")]
    Sql {
        table: &'static str,
        source: rusqlite::Error,
    },

    #[error("unknown mover category '{0}'")]
    BadCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Best first.
    Descending,
    /// Worst first.
    Ascending,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            Self::Descending => "DESC",
            Self::Ascending => "ASC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRow {
    pub sector: String,
    pub average_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    /// Sectors with a positive average return.
    pub green_sectors: usize,
    /// Sectors at or below zero.
    pub red_sectors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRow {
    pub ticker: String,
    pub volatility: f64,
}

const SECTORS: &str = "sector_wise_yearly_return";
const VOLATILITY: &str = "volatility_analysis";
const CORRELATION: &str = "stock_correlation_long";
const MOVERS: &str = "top_gainers_losers_monthly";

pub struct ReportQueries<'a> {
    conn: &'a Connection,
}

impl<'a> ReportQueries<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Top `n` sectors by average return.
    pub fn top_sectors(&self, n: usize, order: SortOrder) -> Result<Vec<SectorRow>, QueryError> {
        self.require(SECTORS)?;
        let sql = format!(
            "SELECT sector, {col} FROM {SECTORS} WHERE {col} IS NOT NULL ORDER BY {col} {} LIMIT ?1",
            order.sql(),
            col = quote_ident("Average_Yearly_Return_(%)"),
        );
        self.collect(SECTORS, &sql, [n as i64], |row| {
            Ok(SectorRow {
                sector: row.get(0)?,
                average_return: row.get(1)?,
            })
        })
    }

    pub fn market_summary(&self) -> Result<MarketSummary, QueryError> {
        self.require(SECTORS)?;
        let sql = format!(
            "SELECT \
               COALESCE(SUM(CASE WHEN {col} > 0 THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN {col} <= 0 THEN 1 ELSE 0 END), 0) \
             FROM {SECTORS}",
            col = quote_ident("Average_Yearly_Return_(%)"),
        );
        self.conn
            .query_row(&sql, [], |row| {
                Ok(MarketSummary {
                    green_sectors: row.get::<_, i64>(0)? as usize,
                    red_sectors: row.get::<_, i64>(1)? as usize,
                })
            })
            .map_err(|source| QueryError::Sql {
                table: SECTORS,
                source,
            })
    }

    /// Top `n` tickers by volatility. Undefined volatilities are left out.
    pub fn most_volatile(&self, n: usize) -> Result<Vec<VolatilityRow>, QueryError> {
        self.require(VOLATILITY)?;
        let sql = format!(
            "SELECT Ticker, Yearly_Volatility FROM {VOLATILITY} \
             WHERE Yearly_Volatility IS NOT NULL \
             ORDER BY Yearly_Volatility DESC, Ticker LIMIT ?1"
        );
        self.collect(VOLATILITY, &sql, [n as i64], |row| {
            Ok(VolatilityRow {
                ticker: row.get(0)?,
                volatility: row.get(1)?,
            })
        })
    }

    pub fn correlation_pairs(&self) -> Result<Vec<CorrelationPair>, QueryError> {
        self.require(CORRELATION)?;
        let sql = format!(
            "SELECT Stock_1, Stock_2, Correlation FROM {CORRELATION} ORDER BY Stock_1, Stock_2"
        );
        self.collect(CORRELATION, &sql, [], |row| {
            Ok(CorrelationPair {
                stock_1: row.get(0)?,
                stock_2: row.get(1)?,
                correlation: row.get(2)?,
            })
        })
    }

    /// Month by month: gainers best first, then losers worst first.
    pub fn monthly_movers(&self) -> Result<Vec<MonthlyMover>, QueryError> {
        self.require(MOVERS)?;
        let sql = format!(
            "SELECT month, ticker, monthly_return, category FROM {MOVERS} \
             ORDER BY month, category, \
               CASE WHEN category = 'Gainer' THEN -monthly_return ELSE monthly_return END, \
               ticker"
        );
        let raw = self.collect(MOVERS, &sql, [], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        raw.into_iter()
            .map(|(month, ticker, monthly_return, category)| {
                let category = match category.as_str() {
                    "Gainer" => Some(MoverCategory::Gainer),
                    "Loser" => Some(MoverCategory::Loser),
                    _ => None,
                }
                .ok_or_else(|| QueryError::BadCategory(category.clone()))?;
                Ok(MonthlyMover {
                    month,
                    ticker,
                    monthly_return,
                    category,
                })
            })
            .collect()
    }

    fn require(&self, table: &'static str) -> Result<(), QueryError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| QueryError::Sql { table, source })?;
        match found {
            Some(_) => Ok(()),
            None => Err(QueryError::MissingTable(table.to_string())),
        }
    }

    fn collect<T, P, F>(
        &self,
        table: &'static str,
        sql: &str,
        params: P,
        map: F,
    ) -> Result<Vec<T>, QueryError>
    where
        P: rusqlite::Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let sql_err = |source| QueryError::Sql { table, source };
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let rows = stmt
            .query_map(params, map)
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{SqliteSink, TableSink};
    use stockpulse_core::domain::{ColumnType, DerivedTable, Value};

    fn sink_with_sectors(rows: &[(&str, f64)]) -> SqliteSink {
        let mut table = DerivedTable::new(
            "Sector_Wise_Yearly_Return",
            &[
                ("sector", ColumnType::Text),
                ("Average Yearly Return (%)", ColumnType::Float),
            ],
        );
        for (s, r) in rows {
            table.push_row(vec![Value::text(*s), Value::float(*r)]).unwrap();
        }
        let mut sink = SqliteSink::connect("sqlite::memory:").unwrap();
        sink.write_table(&table).unwrap();
        sink
    }

    #[test]
    fn sector_queries() {
        let sink = sink_with_sectors(&[("IT", 12.0), ("BANKING", -3.0), ("FMCG", 0.0), ("AUTO", 4.5)]);
        let q = ReportQueries::new(sink.connection());

        let best = q.top_sectors(2, SortOrder::Descending).unwrap();
        assert_eq!(best[0].sector, "IT");
        assert_eq!(best[1].sector, "AUTO");

        let worst = q.top_sectors(10, SortOrder::Ascending).unwrap();
        assert_eq!(worst.len(), 4);
        assert_eq!(worst[0].sector, "BANKING");

        let summary = q.market_summary().unwrap();
        assert_eq!(summary, MarketSummary { green_sectors: 2, red_sectors: 2 });
    }

    #[test]
    fn missing_table_is_reported() {
        let sink = SqliteSink::connect("sqlite::memory:").unwrap();
        let q = ReportQueries::new(sink.connection());
        assert!(matches!(q.most_volatile(5), Err(QueryError::MissingTable(_))));
    }

    #[test]
    fn movers_come_back_typed() {
        let mut table = DerivedTable::new(
            "Top_Gainers_Losers_Monthly",
            &[
                ("month", ColumnType::Text),
                ("ticker", ColumnType::Text),
                ("monthly_return", ColumnType::Float),
                ("category", ColumnType::Text),
            ],
        );
        for (m, t, r, c) in [
            ("2024-01", "B", -2.0, "Loser"),
            ("2024-01", "A", 3.0, "Gainer"),
            ("2024-01", "C", 5.0, "Gainer"),
        ] {
            table
                .push_row(vec![Value::text(m), Value::text(t), Value::float(r), Value::text(c)])
                .unwrap();
        }
        let mut sink = SqliteSink::connect("sqlite::memory:").unwrap();
        sink.write_table(&table).unwrap();

        let movers = ReportQueries::new(sink.connection()).monthly_movers().unwrap();
        let order: Vec<&str> = movers.iter().map(|m| m.ticker.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(movers[2].category, MoverCategory::Loser);
    }
}
