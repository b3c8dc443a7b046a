//! sql-metric-exporter Library
//!
//! Exposes the exporter components for use in integration tests and as a
//! library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::HttpServer;
pub use adapters::outbound::{ConnectionRegistry, DashMapMeasurementStore};
pub use application::{ExporterService, QueryExecutor};
pub use config::{load_config, Cli, Config, ConfigError};
pub use domain::entities::{CachedMetric, Measurement, MetricDefinition, QueryKind};
pub use domain::ports::{Clock, MeasurementStore, QueryError, QuerySource, SystemClock};
pub use infrastructure::{shutdown_signal, ShutdownController};
