//! PriceRecord and PriceSeries: the loaded market data units.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One daily OHLCV observation for a single ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

impl PriceRecord {
    /// Calendar month of the record as `YYYY-MM`.
    pub fn month(&self) -> String {
        month_key(self.date)
    }
}

/// `YYYY-MM` bucket key for a date.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Date-ordered records for one ticker.
///
/// Construction sorts ascending by date. Uniqueness of dates is checked by the
/// loader, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: String,
    records: Vec<PriceRecord>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, mut records: Vec<PriceRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Self {
            ticker: ticker.into(),
            records,
        }
    }

    /// Build a series from `(date, close)` pairs. Open/high/low mirror the close.
    pub fn from_closes(ticker: &str, closes: &[(NaiveDate, f64)]) -> Self {
        let records = closes
            .iter()
            .map(|&(date, close)| PriceRecord {
                ticker: ticker.to_string(),
                date,
                open: close,
                close,
                high: close,
                low: close,
                volume: 0,
            })
            .collect();
        Self::new(ticker, records)
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&PriceRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&PriceRecord> {
        self.records.last()
    }

    /// Close prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    /// First date that occurs more than once, if any.
    pub fn first_duplicate_date(&self) -> Option<NaiveDate> {
        self.records
            .windows(2)
            .find(|w| w[0].date == w[1].date)
            .map(|w| w[0].date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn series_sorts_by_date() {
        let series = PriceSeries::from_closes(
            "TCS",
            &[(d("2024-01-03"), 2.0), (d("2024-01-01"), 1.0), (d("2024-01-02"), 1.5)],
        );
        assert_eq!(series.closes(), vec![1.0, 1.5, 2.0]);
        assert_eq!(series.first().unwrap().date, d("2024-01-01"));
        assert_eq!(series.last().unwrap().date, d("2024-01-03"));
    }

    #[test]
    fn duplicate_dates_are_detected() {
        let series = PriceSeries::from_closes(
            "TCS",
            &[(d("2024-01-02"), 2.0), (d("2024-01-01"), 1.0), (d("2024-01-02"), 1.5)],
        );
        assert_eq!(series.first_duplicate_date(), Some(d("2024-01-02")));
    }

    #[test]
    fn month_key_is_zero_padded() {
        assert_eq!(month_key(d("2023-03-09")), "2023-03");
        assert_eq!(month_key(d("2024-11-30")), "2024-11");
    }
}
