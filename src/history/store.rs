//! Storage engine for the query history.
//!
//! A single SQLite connection behind a mutex, with every statement run on
//! the blocking thread pool so handlers never stall the async runtime.
//! Reports are stored as JSON text; rows written by earlier versions of the
//! schema (or by hand) are normalized on the way out rather than rejected.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::advisor::TravelReport;
use crate::error::{Result, WayfarerError};
use crate::history::QueryRecord;

/// Persistent store for queries and the reports generated for them.
pub struct HistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryStore {
    /// Open (or create) the store at `path`, creating parent directories
    /// as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init_schema(&conn)?;

        info!(path = %path.display(), "History store ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a throwaway in-memory store. Nothing survives drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS travel_queries (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                query       TEXT NOT NULL,
                destination TEXT NOT NULL,
                origin      TEXT,
                response    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_travel_queries_created_at
                ON travel_queries(created_at);",
        )?;
        Ok(())
    }

    /// Persist a query and its report, returning the stored record.
    pub async fn insert(
        &self,
        query: &str,
        destination: &str,
        origin: Option<&str>,
        report: &TravelReport,
    ) -> Result<QueryRecord> {
        let conn = self.conn.clone();
        let query = query.to_string();
        let destination = destination.to_string();
        let origin = origin.map(String::from);
        let response = serde_json::to_string(report)
            .map_err(|e| WayfarerError::Internal(format!("report serialization: {e}")))?;
        let report = report.clone();

        tokio::task::spawn_blocking(move || -> Result<QueryRecord> {
            let conn = conn.lock();
            let created_at = Utc::now().to_rfc3339();

            conn.execute(
                "INSERT INTO travel_queries (query, destination, origin, response, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![query, destination, origin, response, created_at],
            )?;
            let id = conn.last_insert_rowid();

            debug!(id, destination = %destination, "Stored travel query");

            Ok(QueryRecord {
                id,
                query,
                destination,
                origin,
                response: report,
                created_at,
            })
        })
        .await
        .map_err(|e| WayfarerError::Internal(e.to_string()))?
    }

    /// List stored queries, newest first. `limit` of `None` returns
    /// everything.
    pub async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<QueryRecord>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<QueryRecord>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, query, destination, origin, response, created_at
                 FROM travel_queries
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )?;

            // SQLite treats a negative LIMIT as unbounded.
            let limit = limit.map_or(-1i64, i64::from);
            let rows = stmt.query_map(params![limit], row_to_record)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(|e| WayfarerError::Internal(e.to_string()))?
    }

    /// Fetch a single record by id.
    pub async fn get(&self, id: i64) -> Result<Option<QueryRecord>> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<QueryRecord>> {
            let conn = conn.lock();
            let record = conn
                .query_row(
                    "SELECT id, query, destination, origin, response, created_at
                     FROM travel_queries
                     WHERE id = ?1",
                    params![id],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
        .map_err(|e| WayfarerError::Internal(e.to_string()))?
    }

    /// Delete a record by id. Returns whether a row existed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<bool> {
            let conn = conn.lock();
            let affected = conn.execute("DELETE FROM travel_queries WHERE id = ?1", params![id])?;
            if affected > 0 {
                debug!(id, "Deleted travel query");
            }
            Ok(affected > 0)
        })
        .await
        .map_err(|e| WayfarerError::Internal(e.to_string()))?
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<usize> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let conn = conn.lock();
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM travel_queries", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
        .map_err(|e| WayfarerError::Internal(e.to_string()))?
    }
}

/// Map a row to a record, tolerating reports that no longer (or never did)
/// match the current schema.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueryRecord> {
    let id: i64 = row.get(0)?;
    let query: String = row.get(1)?;
    let destination: String = row.get(2)?;
    let origin: Option<String> = row.get(3)?;
    let raw: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    let value: serde_json::Value =
        serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
    let response = match serde_json::from_value::<TravelReport>(value.clone()) {
        Ok(mut report) => {
            // A missing timestamp deserializes as "" and skips the fallback path
            if report.timestamp.is_empty() {
                report.normalize_timestamp();
            }
            report
        }
        Err(_) => TravelReport::from_stored(&value, &destination, origin.as_deref()),
    };

    Ok(QueryRecord {
        id,
        query,
        destination,
        origin,
        response,
        created_at,
    })
}
