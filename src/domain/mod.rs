//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod indicator;
pub mod rolling;
pub mod oscillator;
pub mod pattern;
pub mod stage;
pub mod metric_row;
pub mod relative_strength;
pub mod breadth;
pub mod rrg;
pub mod index_returns;
pub mod screener;
pub mod run_report;
pub mod universe;
pub mod config_validation;
pub mod engine;
pub mod error;
