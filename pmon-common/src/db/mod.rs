//! Database models and queries

pub mod init;
pub mod models;
pub mod parse_errors;
pub mod parsers;
pub mod reports;

pub use init::*;
pub use models::*;
