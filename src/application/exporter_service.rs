//! Exporter Service - Main application use case
//!
//! Owns the metric definitions, their database handles and the measurement
//! cache. On each scrape it refreshes stale metrics and renders every metric
//! into the exposition format.

use crate::adapters::outbound::ConnectionRegistry;
use crate::application::QueryExecutor;
use crate::domain::entities::{CachedMetric, MetricDefinition};
use crate::domain::ports::{Clock, MeasurementStore, QuerySource};
use crate::domain::services::{Exposition, Staleness};
use anyhow::bail;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-metric runtime state.
struct MetricSlot {
    definition: MetricDefinition,
    source: Arc<dyn QuerySource>,
    /// Held across check-then-recompute-then-store
    gate: Mutex<()>,
    /// Completed recomputation attempts, successful or not
    attempts: AtomicU64,
    consecutive_failures: AtomicU32,
}

/// Exporter service - main application use case.
///
/// This service orchestrates a scrape:
/// 1. Walks metrics in name order
/// 2. Recomputes each stale metric, at most once concurrently per metric
/// 3. Renders the cached measurements of every metric
pub struct ExporterService {
    slots: Vec<MetricSlot>,
    store: Arc<dyn MeasurementStore>,
    clock: Arc<dyn Clock>,
    executor: QueryExecutor,
}

impl ExporterService {
    /// Create the service and seed the cache with a placeholder per metric.
    ///
    /// Fails if a metric names a database missing from the registry, or if
    /// two definitions share a name.
    pub fn new(
        definitions: Vec<MetricDefinition>,
        registry: &ConnectionRegistry,
        store: Arc<dyn MeasurementStore>,
        clock: Arc<dyn Clock>,
        executor: QueryExecutor,
    ) -> anyhow::Result<Self> {
        let mut definitions = definitions;
        definitions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut slots: Vec<MetricSlot> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if slots.last().is_some_and(|s| s.definition.name == definition.name) {
                bail!("duplicate metric {}", definition.name);
            }
            let Some(source) = registry.get(&definition.database) else {
                bail!(
                    "metric {} references unknown database {}",
                    definition.name,
                    definition.database
                );
            };
            store.seed(&definition.name);
            slots.push(MetricSlot {
                definition,
                source,
                gate: Mutex::new(()),
                attempts: AtomicU64::new(0),
                consecutive_failures: AtomicU32::new(0),
            });
        }

        Ok(Self {
            slots,
            store,
            clock,
            executor,
        })
    }

    /// Refresh stale metrics and render all of them, in name order.
    pub async fn scrape(&self) -> String {
        let mut out = String::new();
        for slot in &self.slots {
            let entry = self.refresh(slot).await;
            Exposition::write_metric(
                &mut out,
                &slot.definition.name,
                &entry.measurements,
                &slot.definition.database,
            );
        }
        out
    }

    /// Refresh one metric by name. Returns `None` for unknown metrics.
    pub async fn refresh_metric(&self, name: &str) -> Option<Arc<CachedMetric>> {
        let slot = self.slot(name)?;
        Some(self.refresh(slot).await)
    }

    /// Cached entry for a metric, without refreshing it.
    pub fn cached(&self, name: &str) -> Option<Arc<CachedMetric>> {
        self.slot(name).map(|slot| self.current(slot))
    }

    /// Metric names in scrape order.
    pub fn metric_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .map(|s| s.definition.name.as_str())
            .collect()
    }

    /// Failed recomputations since the last success.
    pub fn consecutive_failures(&self, name: &str) -> Option<u32> {
        self.slot(name)
            .map(|s| s.consecutive_failures.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, name: &str) -> Option<&MetricSlot> {
        self.slots
            .binary_search_by(|s| s.definition.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.slots[i])
    }

    fn current(&self, slot: &MetricSlot) -> Arc<CachedMetric> {
        self.store
            .get(&slot.definition.name)
            .unwrap_or_else(|| Arc::new(CachedMetric::placeholder()))
    }

    fn is_stale(&self, slot: &MetricSlot, entry: &CachedMetric) -> bool {
        Staleness::is_stale(entry.computed_at, slot.definition.ttl, self.clock.now())
    }

    /// Serve the cached entry, recomputing it first if stale.
    ///
    /// A caller that finds another recomputation in flight waits for it and
    /// serves its outcome instead of querying again. On failure the previous
    /// entry stays in place, computed-at included.
    async fn refresh(&self, slot: &MetricSlot) -> Arc<CachedMetric> {
        let entry = self.current(slot);
        if !self.is_stale(slot, &entry) {
            return entry;
        }

        let observed = slot.attempts.load(Ordering::Acquire);
        let _guard = slot.gate.lock().await;
        if slot.attempts.load(Ordering::Acquire) != observed {
            return self.current(slot);
        }
        let entry = self.current(slot);
        if !self.is_stale(slot, &entry) {
            return entry;
        }

        let definition = &slot.definition;
        tracing::debug!("recalculating {}", definition.name);

        let result = self
            .executor
            .execute(definition, slot.source.as_ref())
            .await;
        let computed_at = self.clock.now();

        match result {
            Ok(measurements) => {
                slot.consecutive_failures.store(0, Ordering::Relaxed);
                tracing::debug!(
                    "recalculated {} ({} measurements)",
                    definition.name,
                    measurements.len()
                );
                self.store
                    .put(&definition.name, CachedMetric::new(measurements, computed_at));
            }
            Err(e) => {
                let failures = slot.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    "error recalculating {} on {} ({}): {} (consecutive failures: {})",
                    definition.name,
                    definition.database,
                    slot.source.driver(),
                    e,
                    failures
                );
            }
        }
        slot.attempts.fetch_add(1, Ordering::Release);

        self.current(slot)
    }
}
