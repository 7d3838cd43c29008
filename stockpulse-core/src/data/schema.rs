use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Expected layout of a per-ticker price file.
pub struct RecordSchema;

impl RecordSchema {
    /// Columns every per-ticker file must carry.
    pub const REQUIRED: [&'static str; 6] = ["date", "open", "close", "high", "low", "volume"];

    /// Map each required column to its index in `headers`.
    ///
    /// Returns the first missing column name on failure.
    pub fn locate(headers: &[&str]) -> Result<HashMap<&'static str, usize>, String> {
        let mut positions = HashMap::new();
        for required in Self::REQUIRED {
            let idx = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(required))
                .ok_or_else(|| required.to_string())?;
            positions.insert(required, idx);
        }
        Ok(positions)
    }

    /// Parse a date cell: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, or RFC 3339.
    pub fn parse_date(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.date());
        }
        DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
    }
}
