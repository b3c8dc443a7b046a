//! DashMap Measurement Store
//!
//! Implements MeasurementStore using DashMap for concurrent access.

use crate::domain::entities::CachedMetric;
use crate::domain::ports::MeasurementStore;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed measurement cache.
///
/// Each metric maps to an immutable `Arc<CachedMetric>`. Writers swap the
/// `Arc`, so readers always hold a complete batch.
pub struct DashMapMeasurementStore {
    entries: DashMap<String, Arc<CachedMetric>>,
}

impl DashMapMeasurementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for DashMapMeasurementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementStore for DashMapMeasurementStore {
    fn get(&self, metric: &str) -> Option<Arc<CachedMetric>> {
        self.entries.get(metric).map(|e| e.value().clone())
    }

    fn put(&self, metric: &str, entry: CachedMetric) {
        self.entries.insert(metric.to_string(), Arc::new(entry));
    }

    fn seed(&self, metric: &str) {
        self.entries
            .entry(metric.to_string())
            .or_insert_with(|| Arc::new(CachedMetric::placeholder()));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
