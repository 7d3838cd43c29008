//! StockPulse Core: domain types, record loading and the analytics calculators.
//!
//! This crate holds everything that does not touch a database or a terminal:
//! - Domain types (price records and series, derived tables, artifacts)
//! - Raw YAML extraction into per-ticker CSV files
//! - The record loader and the static sector reference
//! - Metric calculators (volatility, cumulative and sector returns,
//!   correlation, monthly movers) and the combined dataset builder
//! - The read-time daily movers view over the combined dataset

pub mod analytics;
pub mod data;
pub mod domain;
pub mod view;
