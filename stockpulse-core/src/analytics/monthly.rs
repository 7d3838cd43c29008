//! Monthly Gainers/Losers Calculator.
//!
//! Each ticker's representative return for a month is the last daily return
//! observed in that month (percent). Per month, the highest returns are
//! tagged `Gainer` and the lowest `Loser`. When a month has fewer than
//! `2 * top_n` tickers the two sets are split so they never overlap: gainers
//! take the upper half (rounded up), losers the rest.

use super::stats::pct_change;
use crate::data::SeriesMap;
use crate::domain::{month_key, Artifact, ColumnType, DerivedTable, TableError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gainers and losers kept per month.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverCategory {
    Gainer,
    Loser,
}

impl MoverCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gainer => "Gainer",
            Self::Loser => "Loser",
        }
    }
}

impl std::fmt::Display for MoverCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMover {
    pub month: String,
    pub ticker: String,
    pub monthly_return: f64,
    pub category: MoverCategory,
}

/// `(gainers, losers)` to select from `n` candidates.
pub fn split_counts(n: usize, top_n: usize) -> (usize, usize) {
    let gainers = top_n.min(n.div_ceil(2));
    let losers = top_n.min(n - gainers);
    (gainers, losers)
}

/// month (`YYYY-MM`) → ticker → representative return in percent.
///
/// Months in which a ticker has no defined return are absent for that ticker.
pub fn representative_monthly_returns(series: &SeriesMap) -> BTreeMap<String, BTreeMap<String, f64>> {
    let mut out: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (ticker, s) in series {
        let returns = pct_change(&s.closes());
        for (record, ret) in s.records().iter().zip(returns) {
            if let Some(r) = ret {
                // Records are date-ordered, so later days overwrite earlier ones.
                out.entry(month_key(record.date))
                    .or_default()
                    .insert(ticker.clone(), r * 100.0);
            }
        }
    }
    out
}

pub fn monthly_movers(series: &SeriesMap, top_n: usize) -> Vec<MonthlyMover> {
    let mut out = Vec::new();
    for (month, by_ticker) in representative_monthly_returns(series) {
        let mut ranked: Vec<(&String, f64)> = by_ticker.iter().map(|(t, r)| (t, *r)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let (gainers, losers) = split_counts(ranked.len(), top_n);
        let mover = |(ticker, monthly_return): &(&String, f64), category| MonthlyMover {
            month: month.clone(),
            ticker: (*ticker).clone(),
            monthly_return: *monthly_return,
            category,
        };

        out.extend(ranked[..gainers].iter().map(|e| mover(e, MoverCategory::Gainer)));
        out.extend(
            ranked[ranked.len() - losers..]
                .iter()
                .rev()
                .map(|e| mover(e, MoverCategory::Loser)),
        );
    }
    log::debug!("monthly movers: {} row(s)", out.len());
    out
}

pub fn monthly_movers_table(rows: &[MonthlyMover]) -> Result<DerivedTable, TableError> {
    let mut table = DerivedTable::new(
        Artifact::MonthlyMovers.name(),
        &[
            ("month", ColumnType::Text),
            ("ticker", ColumnType::Text),
            ("monthly_return", ColumnType::Float),
            ("category", ColumnType::Text),
        ],
    );
    for row in rows {
        table.push_row(vec![
            Value::text(&row.month),
            Value::text(&row.ticker),
            Value::float(row.monthly_return),
            Value::text(row.category.as_str()),
        ])?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceSeries;
    use chrono::NaiveDate;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn insert(map: &mut SeriesMap, ticker: &str, points: &[(NaiveDate, f64)]) {
        map.insert(ticker.into(), PriceSeries::from_closes(ticker, points));
    }

    #[test]
    fn split_never_overlaps() {
        assert_eq!(split_counts(0, 5), (0, 0));
        assert_eq!(split_counts(1, 5), (1, 0));
        assert_eq!(split_counts(3, 5), (2, 1));
        assert_eq!(split_counts(10, 5), (5, 5));
        assert_eq!(split_counts(50, 5), (5, 5));
    }

    #[test]
    fn representative_is_last_return_of_month() {
        let mut map = SeriesMap::new();
        insert(
            &mut map,
            "A",
            &[(d(1, 30), 100.0), (d(1, 31), 110.0), (d(2, 1), 99.0), (d(2, 2), 108.9)],
        );
        let reps = representative_monthly_returns(&map);
        assert!((reps["2024-01"]["A"] - 10.0).abs() < 1e-9);
        assert!((reps["2024-02"]["A"] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn gainers_outrank_losers() {
        let mut map = SeriesMap::new();
        for (i, t) in ["A", "B", "C", "D", "E", "F", "G"].iter().enumerate() {
            let step = 1.0 + i as f64;
            insert(&mut map, t, &[(d(3, 1), 100.0), (d(3, 2), 100.0 + step)]);
        }
        let rows = monthly_movers(&map, 3);
        let gainers: Vec<&str> = rows
            .iter()
            .filter(|r| r.category == MoverCategory::Gainer)
            .map(|r| r.ticker.as_str())
            .collect();
        let losers: Vec<&str> = rows
            .iter()
            .filter(|r| r.category == MoverCategory::Loser)
            .map(|r| r.ticker.as_str())
            .collect();
        assert_eq!(gainers, vec!["G", "F", "E"]);
        assert_eq!(losers, vec!["A", "B", "C"]);
    }

    #[test]
    fn table_tags_category() {
        let mut map = SeriesMap::new();
        insert(&mut map, "A", &[(d(4, 1), 10.0), (d(4, 2), 11.0)]);
        insert(&mut map, "B", &[(d(4, 1), 10.0), (d(4, 2), 9.0)]);
        let table = monthly_movers_table(&monthly_movers(&map, TOP_N)).unwrap();
        assert_eq!(table.row_count(), 2);
        let cats = table.column("category").unwrap();
        assert_eq!(cats[0].as_str(), Some("Gainer"));
        assert_eq!(cats[1].as_str(), Some("Loser"));
    }
}
