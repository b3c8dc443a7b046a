//! Connection Registry
//!
//! Maps database names to live query sources, built once at startup.

use crate::config::{DatabaseConfig, Driver};
use crate::domain::ports::QuerySource;
use anyhow::{anyhow, Context};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{MySqlSource, SqliteSource};

/// Registry of database handles keyed by configured name.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    sources: HashMap<String, Arc<dyn QuerySource>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Connect and ping every configured database, in name order.
    ///
    /// Any failure aborts with the database name in the error.
    pub async fn connect(databases: &BTreeMap<String, DatabaseConfig>) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        for (name, db) in databases {
            let source = Self::open(name, db)
                .await
                .with_context(|| format!("connecting to database {} ({})", name, db.driver))?;
            source
                .ping()
                .await
                .with_context(|| format!("pinging database {}", name))?;

            tracing::info!("{} => ok", name);
            registry.insert(name.clone(), source);
        }

        Ok(registry)
    }

    async fn open(name: &str, db: &DatabaseConfig) -> anyhow::Result<Arc<dyn QuerySource>> {
        match db.driver {
            Driver::Mysql => Ok(Arc::new(MySqlSource::connect(db).await?)),
            Driver::Sqlite => {
                let path = db
                    .path
                    .as_deref()
                    .ok_or_else(|| anyhow!("database {}: sqlite driver requires a path", name))?;
                Ok(Arc::new(SqliteSource::open(path)?))
            }
        }
    }

    /// Register a source under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, source: Arc<dyn QuerySource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn QuerySource>> {
        self.sources.get(name).cloned()
    }

    /// Registered database names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
