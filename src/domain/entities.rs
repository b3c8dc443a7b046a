//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the exporter domain:
//! what to query, what came back, and what is cached between scrapes.

use crate::domain::value_objects::{Ttl, NULL_SENTINEL};
use serde::Deserialize;
use std::time::SystemTime;

/// How a metric's query result is shaped into measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Single row, the value collapses to one unlabeled measurement.
    #[default]
    Scalar,
    /// Many rows; every column but the last is a label, the last is the value.
    Grouped,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Scalar => "scalar",
            QueryKind::Grouped => "grouped",
        }
    }
}

/// A named metric, loaded once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    /// Metric name, also the exposition series name
    pub name: String,
    /// Name of the database in the connection registry
    pub database: String,
    /// SQL text sent verbatim to the database
    pub sql: String,
    /// Staleness window
    pub ttl: Ttl,
    /// Result shape
    pub kind: QueryKind,
}

/// Ordered label set. Order follows the column order returned by the driver.
///
/// A `None` value is a SQL NULL; it reads back as the `\N` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<(String, Option<String>)>);

impl Labels {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a label. A label with the same name replaces the value in place,
    /// keeping its original position.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name.into(), Some(value.into()));
    }

    /// Append a label whose value is SQL NULL.
    pub fn push_null(&mut self, name: impl Into<String>) {
        self.set(name.into(), None);
    }

    /// Append a nullable cell.
    pub fn push_cell(&mut self, name: impl Into<String>, cell: Option<String>) {
        self.set(name.into(), cell);
    }

    fn set(&mut self, name: String, value: Option<String>) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Look up a label value by name. NULL reads as `\N`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref().unwrap_or(NULL_SENTINEL))
    }

    /// Labels with NULL values shown as `\N`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_deref().unwrap_or(NULL_SENTINEL)))
    }

    /// Labels with NULL values kept as `None`.
    pub fn cells(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Labels::new();
        for (k, v) in iter {
            labels.push(k, v);
        }
        labels
    }
}

/// One measured value for a metric.
///
/// The value is kept as the text the driver produced; it is never re-typed
/// as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub value: String,
    pub labels: Labels,
}

impl Measurement {
    /// An unlabeled measurement (scalar queries).
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            labels: Labels::new(),
        }
    }

    pub fn labeled(value: impl Into<String>, labels: Labels) -> Self {
        Self {
            value: value.into(),
            labels,
        }
    }
}

/// Cache entry for one metric.
///
/// All measurements of a metric share one computed-at timestamp and are
/// replaced together.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedMetric {
    pub measurements: Vec<Measurement>,
    pub computed_at: SystemTime,
}

impl CachedMetric {
    pub fn new(measurements: Vec<Measurement>, computed_at: SystemTime) -> Self {
        Self {
            measurements,
            computed_at,
        }
    }

    /// Initial entry: a single `"0"` value computed at the Unix epoch, so the
    /// first staleness check always recomputes.
    pub fn placeholder() -> Self {
        Self {
            measurements: vec![Measurement::scalar("0")],
            computed_at: SystemTime::UNIX_EPOCH,
        }
    }
}

/// Driver-neutral query result. `None` cells are SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render a nullable cell, substituting the NULL sentinel.
pub fn cell_text(cell: &Option<String>) -> String {
    match cell {
        Some(v) => v.clone(),
        None => NULL_SENTINEL.to_string(),
    }
}
