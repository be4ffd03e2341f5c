//! # Parser Monitor Common Library
//!
//! Shared code for the parser monitor crates:
//! - Parser statistics, parse error and weekly report models and queries
//! - SQLite initialization and schema
//! - Bootstrap configuration loading
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
