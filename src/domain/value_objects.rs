//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use std::fmt;
use std::time::Duration;

/// Text emitted in place of a SQL NULL.
pub const NULL_SENTINEL: &str = "\\N";

/// Staleness window of a metric.
///
/// Parsed from a number of seconds written as text (`"60"`, `"1.5"`).
/// A zero TTL means every scrape recomputes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ttl(Duration);

impl Ttl {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn from_duration(d: Duration) -> Self {
        Self(d)
    }

    /// Parse a TTL given in seconds.
    ///
    /// # Examples
    /// ```
    /// use sql_metric_exporter::domain::value_objects::Ttl;
    /// use std::time::Duration;
    ///
    /// assert_eq!(Ttl::parse("60").unwrap().as_duration(), Duration::from_secs(60));
    /// assert_eq!(Ttl::parse("0.5").unwrap().as_duration(), Duration::from_millis(500));
    /// assert!(Ttl::parse("5m").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let secs: f64 = s.trim().parse().ok()?;
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(secs).ok().map(Self)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs_f64())
    }
}

/// Listen address for the scrape endpoint.
///
/// Accepts `host:port` and the port-only form `:port`, which binds on all
/// interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr(String);

impl ListenAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Address in a form `tokio::net::TcpListener::bind` accepts.
    pub fn bind_addr(&self) -> String {
        if self.0.starts_with(':') {
            format!("0.0.0.0{}", self.0)
        } else {
            self.0.clone()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ListenAddr {
    fn default() -> Self {
        Self(":7070".to_string())
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `name` is a valid exposition metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
