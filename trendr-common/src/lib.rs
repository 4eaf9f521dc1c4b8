//! # trendr Common Library
//!
//! Shared code for the trendr workspace:
//! - Error type and result alias
//! - Configuration loading (TOML) and config path resolution
//! - Timestamp helpers for display and retention windows
//! - SQLite initialization for the new-title baseline

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use config::TrendConfig;
pub use error::{Error, Result};
