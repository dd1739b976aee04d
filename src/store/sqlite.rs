//! SQLite Record Store
//!
//! One table holds every observation, keyed by an auto-incrementing `ID`.
//! The merge routine is an upsert on the `UNIQUE_TOKEN` column.
//!
//! rusqlite connections are blocking, so every call is moved onto the
//! blocking pool with `spawn_blocking`.

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{DataRecord, NewRecord};
use crate::store::{Connector, StoreHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS fmiacp (
        ID INTEGER PRIMARY KEY AUTOINCREMENT,
        MACHINE_NAME TEXT NOT NULL,
        START_TIME TEXT,
        CATEGORY TEXT,
        TYPE TEXT NOT NULL,
        MEASUREMENT TEXT,
        VALUE TEXT,
        UNIQUE_TOKEN TEXT NOT NULL UNIQUE,
        LAST_UPDATE TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_fmiacp_key ON fmiacp(MACHINE_NAME, TYPE);
";

const SELECT_ALL: &str = "
    SELECT ID, MACHINE_NAME, START_TIME, CATEGORY, TYPE, MEASUREMENT, VALUE, LAST_UPDATE
    FROM fmiacp
    ORDER BY ID DESC
";

const MERGE: &str = "
    INSERT INTO fmiacp
        (MACHINE_NAME, START_TIME, CATEGORY, TYPE, MEASUREMENT, VALUE, UNIQUE_TOKEN, LAST_UPDATE)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(UNIQUE_TOKEN) DO UPDATE SET
        MACHINE_NAME = excluded.MACHINE_NAME,
        START_TIME = excluded.START_TIME,
        CATEGORY = excluded.CATEGORY,
        TYPE = excluded.TYPE,
        MEASUREMENT = excluded.MEASUREMENT,
        VALUE = excluded.VALUE,
        LAST_UPDATE = excluded.LAST_UPDATE
";

/// Opens SQLite connections to a database file
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_millis(5000),
        }
    }

    /// Builder method: how long to wait on a locked database
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {:?}: {}", parent, e))
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        conn.execute_batch(SCHEMA)?;

        Ok(conn)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> StoreResult<Arc<dyn StoreHandle>> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;

        let conn = tokio::task::spawn_blocking(move || Self::open(&path, busy_timeout)).await??;

        Ok(Arc::new(SqliteHandle::new(conn)))
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// An open SQLite connection
pub struct SqliteHandle {
    /// `None` once closed
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteHandle {
    fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Run a blocking closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("connection lock poisoned: {}", e)))?;
            match guard.as_mut() {
                Some(conn) => f(conn),
                None => Err(StoreError::Unavailable("connection closed".to_string())),
            }
        })
        .await?
    }
}

#[async_trait]
impl StoreHandle for SqliteHandle {
    async fn fetch_all(&self) -> StoreResult<Vec<DataRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(SELECT_ALL)
                .map_err(|e| StoreError::Query(e.to_string()))?;
            let rows = stmt
                .query_map([], read_row)
                .map_err(|e| StoreError::Query(e.to_string()))?;

            let records = rows
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Query(e.to_string()))?;
            Ok(records)
        })
        .await
    }

    async fn merge(&self, record: &NewRecord, unique_token: &str) -> StoreResult<u64> {
        let record = record.clone();
        let unique_token = unique_token.to_string();

        let affected = self
            .with_conn(move |conn| {
                conn.execute(
                    MERGE,
                    params![
                        record.machine_name,
                        record.start_time.map(|t| t.to_rfc3339()),
                        record.category,
                        record.signal_type,
                        record.measurement,
                        record.value,
                        unique_token,
                        Utc::now().to_rfc3339(),
                    ],
                )
                .map_err(|e| StoreError::Merge(e.to_string()))
            })
            .await?;

        Ok(affected as u64)
    }

    async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let taken = conn.lock().ok().and_then(|mut guard| guard.take());
            if let Some(conn) = taken {
                if let Err((_, e)) = conn.close() {
                    tracing::warn!(error = %e, "Error closing SQLite connection");
                }
            }
        })
        .await;

        if let Err(e) = closed {
            tracing::warn!(error = %e, "SQLite close task failed");
        }
    }
}

/// Map one result row onto a DataRecord
fn read_row(row: &Row<'_>) -> rusqlite::Result<DataRecord> {
    let start_time: Option<String> = row.get(2)?;
    let last_update: Option<String> = row.get(7)?;

    Ok(DataRecord {
        id: Some(row.get(0)?),
        machine_name: row.get(1)?,
        start_time: start_time.and_then(|s| parse_timestamp(&s)),
        category: row.get(3)?,
        signal_type: row.get(4)?,
        measurement: row.get(5)?,
        value: row.get(6)?,
        last_update: last_update
            .and_then(|s| parse_timestamp(&s))
            .map(|t| t.with_timezone(&Utc)),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<chrono::FixedOffset>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "Unparseable timestamp in store row");
            None
        }
    }
}
