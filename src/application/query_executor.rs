//! Query Executor
//!
//! Runs a metric's SQL against its source and normalizes the result into
//! measurements, for both scalar and grouped queries.

use crate::domain::entities::{cell_text, Labels, Measurement, MetricDefinition, QueryKind, RowSet};
use crate::domain::ports::{QueryError, QuerySource};
use crate::domain::services::DATABASE_LABEL;
use std::time::Duration;

/// Executes metric queries and shapes their results.
pub struct QueryExecutor {
    timeout: Option<Duration>,
}

impl QueryExecutor {
    /// Create an executor. `None` leaves query time unbounded.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Run `definition` against `source`.
    ///
    /// Scalar queries yield exactly one unlabeled measurement or an error.
    /// Grouped queries yield one measurement per row; zero rows is a valid
    /// empty result.
    pub async fn execute(
        &self,
        definition: &MetricDefinition,
        source: &dyn QuerySource,
    ) -> Result<Vec<Measurement>, QueryError> {
        let fetch = source.fetch(&definition.sql);
        let rows = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| QueryError::Timeout(limit))??,
            None => fetch.await?,
        };

        match definition.kind {
            QueryKind::Scalar => Self::shape_scalar(rows).map(|m| vec![m]),
            QueryKind::Grouped => Self::shape_grouped(rows),
        }
    }

    /// Collapse the first row to one value, taken from its last column.
    pub fn shape_scalar(rows: RowSet) -> Result<Measurement, QueryError> {
        let row = rows.rows.into_iter().next().ok_or(QueryError::NoRows)?;
        match row.into_iter().last() {
            Some(Some(value)) => Ok(Measurement::scalar(value)),
            Some(None) => Err(QueryError::NullValue),
            None => Err(QueryError::NoColumns),
        }
    }

    /// One measurement per row: leading columns are labels, the last column
    /// is the value. A NULL value becomes the `\N` sentinel, NULL labels stay
    /// NULL. A column named `database` is renamed to `exported_database` so
    /// it cannot clash with the label naming the source.
    pub fn shape_grouped(rows: RowSet) -> Result<Vec<Measurement>, QueryError> {
        if rows.rows.is_empty() {
            return Ok(Vec::new());
        }
        let Some((_, label_names)) = rows.columns.split_last() else {
            return Err(QueryError::NoColumns);
        };

        rows.rows
            .iter()
            .map(|row| {
                let (value, label_values) = row.split_last().ok_or(QueryError::NoColumns)?;
                if label_values.len() != label_names.len() {
                    return Err(QueryError::Database(format!(
                        "row has {} columns, expected {}",
                        row.len(),
                        rows.columns.len()
                    )));
                }
                let mut labels = Labels::new();
                for (name, cell) in label_names.iter().zip(label_values) {
                    labels.push_cell(label_name(name), cell.clone());
                }
                Ok(Measurement::labeled(cell_text(value), labels))
            })
            .collect()
    }
}

fn label_name(column: &str) -> String {
    if column == DATABASE_LABEL {
        format!("exported_{}", column)
    } else {
        column.to_string()
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(None)
    }
}
