use crate::domain::entities::{MetricDefinition, QueryKind};
use crate::domain::value_objects::{is_valid_metric_name, ListenAddr, Ttl};
use clap::Parser;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line flags. Each flag can also be set from the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-metric-exporter",
    version,
    about = "Expose SQL query results as gauges for a metrics scraper"
)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SQL_EXPORTER_CONFIG", default_value = "config.toml")]
    pub config: PathBuf,

    /// Listen address, overrides `listen` from the file
    #[arg(long, env = "SQL_EXPORTER_LISTEN")]
    pub listen: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("metric {metric}: unknown database {database}")]
    UnknownDatabase { metric: String, database: String },
    #[error("metric {metric}: invalid ttl {value:?}, expected a non-negative number of seconds")]
    InvalidTtl { metric: String, value: String },
    #[error("metric {0}: empty sql")]
    EmptySql(String),
    #[error("invalid metric name {0:?}")]
    InvalidMetricName(String),
    #[error("database {0}: sqlite driver requires a path")]
    MissingSqlitePath(String),
}

/// Database driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Mysql,
    Sqlite,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Mysql => write!(f, "mysql"),
            Driver::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// One `[databases.<name>]` entry.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: Driver,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default)]
    pub database: String,
    /// SQLite database file, `:memory:` for a private in-memory database
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3306
}
fn default_max_connections() -> u32 {
    4
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            host: default_host(),
            port: default_port(),
            user: String::new(),
            pass: String::new(),
            database: String::new(),
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"***")
            .field("database", &self.database)
            .field("path", &self.path)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// TTL as written in the file: `"60"` or a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TtlSetting {
    Text(String),
    Number(f64),
}

impl TtlSetting {
    fn as_text(&self) -> String {
        match self {
            TtlSetting::Text(s) => s.clone(),
            TtlSetting::Number(n) => n.to_string(),
        }
    }
}

/// One `[metrics.<name>]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricConfig {
    pub db: String,
    pub sql: String,
    pub ttl: TtlSetting,
    #[serde(default)]
    pub kind: QueryKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Upper bound on a single recomputation, 0 disables it
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricConfig>,
}

fn default_listen() -> String {
    ListenAddr::default().as_str().to_string()
}
fn default_query_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            query_timeout_secs: default_query_timeout_secs(),
            databases: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every cross reference and value that can only fail at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, db) in &self.databases {
            if db.driver == Driver::Sqlite && db.path.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingSqlitePath(name.clone()));
            }
        }
        self.metric_definitions().map(|_| ())
    }

    /// Typed metric definitions, in name order.
    pub fn metric_definitions(&self) -> Result<Vec<MetricDefinition>, ConfigError> {
        self.metrics
            .iter()
            .map(|(name, m)| {
                if !is_valid_metric_name(name) {
                    return Err(ConfigError::InvalidMetricName(name.clone()));
                }
                if !self.databases.contains_key(&m.db) {
                    return Err(ConfigError::UnknownDatabase {
                        metric: name.clone(),
                        database: m.db.clone(),
                    });
                }
                if m.sql.trim().is_empty() {
                    return Err(ConfigError::EmptySql(name.clone()));
                }
                let raw = m.ttl.as_text();
                let ttl = Ttl::parse(&raw).ok_or_else(|| ConfigError::InvalidTtl {
                    metric: name.clone(),
                    value: raw.clone(),
                })?;
                Ok(MetricDefinition {
                    name: name.clone(),
                    database: m.db.clone(),
                    sql: m.sql.clone(),
                    ttl,
                    kind: m.kind,
                })
            })
            .collect()
    }

    pub fn listen_addr(&self) -> ListenAddr {
        ListenAddr::new(self.listen.clone())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_secs > 0).then(|| Duration::from_secs(self.query_timeout_secs))
    }
}

/// Read, parse and validate the configuration file, then apply CLI overrides.
pub fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = load_config_file(&cli.config)?;
    if let Some(listen) = &cli.listen {
        cfg.listen = listen.clone();
    }
    Ok(cfg)
}

pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&text)
}
