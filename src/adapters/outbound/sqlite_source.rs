//! SQLite Query Source
//!
//! Implements QuerySource on a single rusqlite connection.
//! Queries run on the blocking pool, one at a time per database. Dropping a
//! fetch (on timeout) interrupts its statement and frees the connection.

use crate::domain::entities::RowSet;
use crate::domain::ports::{QueryError, QuerySource};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

// Lifecycle of one fetch, shared between the caller and the blocking task
const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;

/// SQLite-backed query source.
///
/// The connection is not shareable between threads, so access is
/// serialized through a mutex.
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl SqliteSource {
    /// Open a database file (`:memory:` for a private in-memory database).
    pub fn open(path: &str) -> Result<Self, QueryError> {
        let conn = Connection::open(path).map_err(|e| QueryError::Database(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Run a query and read every cell as text.
    fn fetch_blocking(conn: &Connection, sql: &str) -> rusqlite::Result<RowSet> {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let cells = (0..width)
                .map(|i| row.get_ref(i).map(Self::cell_to_text))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(cells);
        }

        Ok(RowSet::new(columns, out))
    }

    /// Convert a SQLite value to its textual form.
    fn cell_to_text(value: ValueRef<'_>) -> Option<String> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(f) => Some(real_to_text(f)),
            ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// Render a real the way SQLite casts it to text (`%!.15g`): 15 significant
/// digits, always with a fractional part, exponent form outside 1e-4..1e15.
fn real_to_text(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return "0.0".to_string();
    }

    let sci = format!("{:.14e}", f);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return f.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return f.to_string();
    };
    let sign = if f < 0.0 { "-" } else { "" };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');

    if !(-4..15).contains(&exp) {
        let (head, tail) = digits.split_at(1);
        let tail = if tail.is_empty() { "0" } else { tail };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{}{}.{}e{}{:02}", sign, head, tail, exp_sign, exp.abs())
    } else if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!("{}0.{}{}", sign, zeros, digits)
    } else {
        let point = exp as usize + 1;
        if digits.len() > point {
            format!("{}{}.{}", sign, &digits[..point], &digits[point..])
        } else {
            let zeros = "0".repeat(point - digits.len());
            format!("{}{}{}.0", sign, digits, zeros)
        }
    }
}

#[async_trait]
impl QuerySource for SqliteSource {
    async fn fetch(&self, sql: &str) -> Result<RowSet, QueryError> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let state = Arc::new(AtomicU8::new(QUEUED));
        let _cancel = CancelOnDrop {
            state: state.clone(),
            interrupt: self.interrupt.clone(),
        };

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            if state
                .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return Err(QueryError::Task("query cancelled before start".to_string()));
            }
            let result = Self::fetch_blocking(&guard, &sql);
            state.store(FINISHED, Ordering::Release);
            result.map_err(|e| QueryError::Database(e.to_string()))
        })
        .await
        .map_err(|e| QueryError::Task(e.to_string()))?
    }

    async fn ping(&self) -> Result<(), QueryError> {
        self.fetch("SELECT 1").await.map(|_| ())
    }

    fn driver(&self) -> &'static str {
        "sqlite"
    }
}

/// Cancels the blocking task of a fetch that is dropped before it finishes:
/// a queued task is skipped, a running statement is interrupted.
struct CancelOnDrop {
    state: Arc<AtomicU8>,
    interrupt: Arc<InterruptHandle>,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.state.swap(FINISHED, Ordering::AcqRel) == RUNNING {
            tracing::debug!("interrupting abandoned sqlite query");
            self.interrupt.interrupt();
        }
    }
}
