//! Staleness Rule
//!
//! Pure domain logic deciding whether a cached entry must be recomputed.

use crate::domain::value_objects::Ttl;
use std::time::SystemTime;

/// Staleness policy for cached metrics.
///
/// An entry is stale when `now > computed_at + ttl`. A zero TTL is always
/// stale, so every scrape recomputes regardless of clock resolution.
pub struct Staleness;

impl Staleness {
    /// Check whether an entry computed at `computed_at` is stale at `now`.
    ///
    /// # Example
    /// ```
    /// use sql_metric_exporter::domain::services::Staleness;
    /// use sql_metric_exporter::domain::value_objects::Ttl;
    /// use std::time::{Duration, SystemTime};
    ///
    /// let computed = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
    /// let ttl = Ttl::from_secs(10);
    /// assert!(!Staleness::is_stale(computed, ttl, computed + Duration::from_secs(10)));
    /// assert!(Staleness::is_stale(computed, ttl, computed + Duration::from_secs(11)));
    /// ```
    pub fn is_stale(computed_at: SystemTime, ttl: Ttl, now: SystemTime) -> bool {
        if ttl.is_zero() {
            return true;
        }
        match computed_at.checked_add(ttl.as_duration()) {
            Some(expires_at) => now > expires_at,
            // Overflowing TTL never expires
            None => false,
        }
    }
}
