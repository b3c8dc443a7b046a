//! Measurement Store Port
//!
//! Defines the interface of the measurement cache shared by all scrapes.

use crate::domain::entities::CachedMetric;
use std::sync::Arc;

/// Process-wide cache of the latest measurements per metric.
///
/// `put` replaces a metric's entry as a unit; a reader holding the result of
/// `get` keeps seeing one consistent batch.
pub trait MeasurementStore: Send + Sync {
    /// Current entry for a metric.
    fn get(&self, metric: &str) -> Option<Arc<CachedMetric>>;

    /// Replace the entry for a metric.
    fn put(&self, metric: &str, entry: CachedMetric);

    /// Insert the epoch placeholder unless an entry already exists.
    fn seed(&self, metric: &str);

    /// Number of metrics held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
