//! Sector reference: static ticker → sector mapping.
//!
//! Loaded once from a CSV file with a `Symbol` column and a `sector` column.
//! Symbols may carry an exchange prefix (`NSE: TCS`); the prefix is stripped
//! and the remainder trimmed and upper-cased before matching.

use super::loader::LoadError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Normalize a symbol for matching: drop any `PREFIX: `, trim, upper-case.
pub fn normalize_symbol(raw: &str) -> String {
    let symbol = raw.rsplit(": ").next().unwrap_or(raw);
    symbol.trim().to_uppercase()
}

/// Read-only ticker → sector mapping for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct SectorMap {
    sectors: BTreeMap<String, String>,
}

impl SectorMap {
    /// Build from `(symbol, sector)` pairs. The first entry for a symbol wins.
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        let mut sectors = BTreeMap::new();
        for (symbol, sector) in pairs {
            let key = normalize_symbol(symbol.as_ref());
            let sector = sector.into();
            match sectors.get(&key) {
                Some(existing) if existing != &sector => {
                    log::warn!(
                        "sector map: {key} listed as both '{existing}' and '{sector}', keeping '{existing}'"
                    );
                }
                Some(_) => {}
                None => {
                    sectors.insert(key, sector);
                }
            }
        }
        Self { sectors }
    }

    /// Load the reference file.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let display = path.display().to_string();
        let unreadable = |e: csv::Error| LoadError::Unreadable {
            path: display.clone(),
            reason: e.to_string(),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(unreadable)?;
        let headers = rdr.headers().map_err(unreadable)?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| LoadError::MissingColumn {
                    path: display.clone(),
                    column: name.to_string(),
                })
        };
        let symbol_idx = find("Symbol")?;
        let sector_idx = find("sector")?;

        let mut pairs = Vec::new();
        for row in rdr.records() {
            let row = row.map_err(unreadable)?;
            let symbol = row.get(symbol_idx).unwrap_or("");
            let sector = row.get(sector_idx).unwrap_or("").trim();
            if symbol.trim().is_empty() || sector.is_empty() {
                continue;
            }
            pairs.push((symbol.to_string(), sector.to_string()));
        }

        let map = Self::from_pairs(pairs);
        log::info!(
            "loaded {} sector mapping(s) across {} sector(s) from {display}",
            map.len(),
            map.sector_names().len()
        );
        Ok(map)
    }

    /// Sector for a ticker, matched on the normalized symbol.
    pub fn sector_for(&self, ticker: &str) -> Option<&str> {
        self.sectors
            .get(&normalize_symbol(ticker))
            .map(String::as_str)
    }

    pub fn sector_names(&self) -> BTreeSet<&str> {
        self.sectors.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalize_strips_exchange_prefix() {
        assert_eq!(normalize_symbol("NSE: tcs "), "TCS");
        assert_eq!(normalize_symbol("  infy"), "INFY");
        assert_eq!(normalize_symbol("BSE: NSE: M&M"), "M&M");
    }

    #[test]
    fn lookup_normalizes_ticker() {
        let map = SectorMap::from_pairs([("NSE: TCS", "IT"), ("HDFCBANK", "BANKING")]);
        assert_eq!(map.sector_for(" tcs"), Some("IT"));
        assert_eq!(map.sector_for("hdfcbank"), Some("BANKING"));
        assert_eq!(map.sector_for("UNKNOWN"), None);
    }

    #[test]
    fn first_duplicate_wins() {
        let map = SectorMap::from_pairs([("TCS", "IT"), ("NSE: TCS", "SOFTWARE")]);
        assert_eq!(map.sector_for("TCS"), Some("IT"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn loads_reference_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sectors.csv");
        fs::write(
            &path,
            "COMPANY,sector,Symbol\nTata Consultancy,IT,NSE: TCS\nInfosys,IT,INFY\nAxis Bank,BANKING,AXISBANK\n",
        )
        .unwrap();

        let map = SectorMap::from_file(&path).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.sector_names().len(), 2);
        assert_eq!(map.sector_for("TCS"), Some("IT"));
    }

    #[test]
    fn missing_sector_column_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sectors.csv");
        fs::write(&path, "COMPANY,Symbol\nInfosys,INFY\n").unwrap();

        let err = SectorMap::from_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { ref column, .. } if column == "sector"));
    }
}
