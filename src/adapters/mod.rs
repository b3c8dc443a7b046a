//! Adapters Layer
//!
//! Inbound adapters drive the application (HTTP scrape endpoint).
//! Outbound adapters implement the domain ports (databases, cache).

pub mod inbound;
pub mod outbound;
