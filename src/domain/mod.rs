//! Domain Layer
//!
//! Entities, value objects, ports and pure services of the exporter.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{CachedMetric, Labels, Measurement, MetricDefinition, QueryKind, RowSet};
pub use value_objects::{ListenAddr, Ttl, NULL_SENTINEL};
