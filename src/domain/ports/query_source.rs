//! Query Source Port
//!
//! Defines the interface for running SQL against one configured database.
//! Implementations may use MySQL, SQLite, or an in-memory fake.

use crate::domain::entities::RowSet;
use async_trait::async_trait;
use std::time::Duration;

/// Errors raised while computing a metric.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// The driver rejected the query or failed while reading rows
    #[error("database error: {0}")]
    Database(String),
    /// A scalar query returned no rows
    #[error("query returned no rows")]
    NoRows,
    /// The result set had no columns to take a value from
    #[error("query returned no columns")]
    NoColumns,
    /// A scalar query returned NULL as its value
    #[error("query returned NULL value")]
    NullValue,
    /// The query did not finish within the configured bound
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    /// The blocking worker running the query failed
    #[error("query task failed: {0}")]
    Task(String),
}

/// A live handle to one database.
///
/// This is an outbound port: the query executor calls it without knowing
/// which driver sits behind it. Handles are shared between concurrent
/// recomputations, so implementations must pool or serialize access.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Run `sql` and return every row with each cell in its textual form.
    async fn fetch(&self, sql: &str) -> Result<RowSet, QueryError>;

    /// Check the database is reachable.
    async fn ping(&self) -> Result<(), QueryError>;

    /// Driver name, used in logs.
    fn driver(&self) -> &'static str;
}
