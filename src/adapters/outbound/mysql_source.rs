//! MySQL Query Source
//!
//! Implements QuerySource on a sqlx MySQL connection pool.

use crate::config::DatabaseConfig;
use crate::domain::entities::RowSet;
use crate::domain::ports::{QueryError, QuerySource};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Connection, Row, ValueRef};
use std::time::Duration;

/// How long to wait for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL-backed query source.
///
/// Queries go through the text protocol, so every cell arrives in the
/// server's own textual representation and is kept as is.
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Open a pool for `config` and establish the first connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, QueryError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(Self::connect_options(config))
            .await
            .map_err(db_error)?;
        Ok(Self { pool })
    }

    /// Build connection options from the database entry.
    pub fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user);
        if !config.pass.is_empty() {
            options = options.password(&config.pass);
        }
        if !config.database.is_empty() {
            options = options.database(&config.database);
        }
        options
    }

    fn row_to_cells(row: &MySqlRow) -> Result<Vec<Option<String>>, sqlx::Error> {
        (0..row.len())
            .map(|i| {
                if row.try_get_raw(i)?.is_null() {
                    return Ok(None);
                }
                let bytes: Vec<u8> = row.try_get_unchecked(i)?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            })
            .collect()
    }
}

fn db_error(e: sqlx::Error) -> QueryError {
    QueryError::Database(e.to_string())
}

#[async_trait]
impl QuerySource for MySqlSource {
    async fn fetch(&self, sql: &str) -> Result<RowSet, QueryError> {
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let cells = rows
            .iter()
            .map(Self::row_to_cells)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;

        Ok(RowSet::new(columns, cells))
    }

    async fn ping(&self) -> Result<(), QueryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        conn.ping().await.map_err(db_error)
    }

    fn driver(&self) -> &'static str {
        "mysql"
    }
}
