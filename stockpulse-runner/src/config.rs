//! Pipeline configuration.
//!
//! Read from a TOML file, then optionally overridden field by field (the CLI
//! does this with its flags). Passed explicitly into the pipeline, the sink
//! and each stage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required option '{0}'")]
    MissingField(&'static str),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory of per-ticker CSV files.
    pub input_path: PathBuf,
    /// Directory for artifacts and the run manifest.
    pub output_path: PathBuf,
    /// Sector reference CSV (`Symbol`, `sector`).
    pub sector_reference_path: PathBuf,
    /// `sqlite://path`, `sqlite::memory:` or a bare database path.
    pub connection_string: String,
    /// Raw YAML dump directory for the extraction stage.
    #[serde(default)]
    pub raw_path: Option<PathBuf>,
    /// Also write each artifact as Parquet.
    #[serde(default)]
    pub write_parquet: bool,
}

/// Every option optional: a config file, a set of CLI flags, or both merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub sector_reference_path: Option<PathBuf>,
    pub connection_string: Option<String>,
    pub raw_path: Option<PathBuf>,
    pub write_parquet: Option<bool>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Fields set in `overrides` replace ours.
    pub fn merge(self, overrides: PartialConfig) -> Self {
        Self {
            input_path: overrides.input_path.or(self.input_path),
            output_path: overrides.output_path.or(self.output_path),
            sector_reference_path: overrides
                .sector_reference_path
                .or(self.sector_reference_path),
            connection_string: overrides.connection_string.or(self.connection_string),
            raw_path: overrides.raw_path.or(self.raw_path),
            write_parquet: overrides.write_parquet.or(self.write_parquet),
        }
    }

    pub fn resolve(self) -> Result<PipelineConfig, ConfigError> {
        let config = PipelineConfig {
            input_path: self.input_path.ok_or(ConfigError::MissingField("input_path"))?,
            output_path: self
                .output_path
                .ok_or(ConfigError::MissingField("output_path"))?,
            sector_reference_path: self
                .sector_reference_path
                .ok_or(ConfigError::MissingField("sector_reference_path"))?,
            connection_string: self
                .connection_string
                .ok_or(ConfigError::MissingField("connection_string"))?,
            raw_path: self.raw_path,
            write_parquet: self.write_parquet.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        PartialConfig::from_file(path)?.resolve()
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        PartialConfig::from_toml(content)?.resolve()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let paths = [
            ("input_path", &self.input_path),
            ("output_path", &self.output_path),
            ("sector_reference_path", &self.sector_reference_path),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is empty")));
            }
        }
        if matches!(&self.raw_path, Some(p) if p.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid("raw_path is empty".into()));
        }
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::Invalid("connection_string is empty".into()));
        }
        Ok(())
    }

    /// `raw_path`, or an error naming it when unset.
    pub fn require_raw_path(&self) -> Result<&Path, ConfigError> {
        self.raw_path
            .as_deref()
            .ok_or(ConfigError::MissingField("raw_path"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
input_path = "data/stocks"
output_path = "data/out"
sector_reference_path = "data/sectors.csv"
connection_string = "sqlite://stocks.db"
"#;

    #[test]
    fn parses_full_file() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        assert_eq!(config.input_path, PathBuf::from("data/stocks"));
        assert_eq!(config.connection_string, "sqlite://stocks.db");
        assert!(config.raw_path.is_none());
        assert!(!config.write_parquet);
    }

    #[test]
    fn missing_option_is_named() {
        let err = PipelineConfig::from_toml("input_path = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("output_path")));
    }

    #[test]
    fn overrides_win() {
        let file = PartialConfig::from_toml(FULL).unwrap();
        let flags = PartialConfig {
            connection_string: Some("sqlite::memory:".into()),
            write_parquet: Some(true),
            ..Default::default()
        };
        let config = file.merge(flags).resolve().unwrap();
        assert_eq!(config.connection_string, "sqlite::memory:");
        assert_eq!(config.output_path, PathBuf::from("data/out"));
        assert!(config.write_parquet);
    }

    #[test]
    fn empty_values_are_rejected() {
        let toml = FULL.replace("sqlite://stocks.db", " ");
        let err = PipelineConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let toml = FULL.replace("data/stocks", "");
        let err = PipelineConfig::from_toml(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = PipelineConfig::from_toml("inputpath = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn raw_path_is_required_only_when_asked_for() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        assert!(matches!(
            config.require_raw_path(),
            Err(ConfigError::MissingField("raw_path"))
        ));
    }
}
