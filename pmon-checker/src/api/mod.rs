//! HTTP API handlers for pmon-checker

pub mod health;
pub mod parsers;
pub mod reports;
pub mod triggers;

pub use health::health_routes;
pub use parsers::parser_routes;
pub use reports::report_routes;
pub use triggers::trigger_routes;
