//! Application Layer
//!
//! Use cases orchestrating the domain: query execution and scrape handling.

mod exporter_service;
mod query_executor;

pub use exporter_service::ExporterService;
pub use query_executor::QueryExecutor;
