//! Persisted prompt history.
//!
//! Entries are append-only: created after a generation with at least one
//! successful image, removed one at a time or all at once, never edited.
//! Every storage fault is logged and reported to the caller as an empty or
//! no-op result so the front end keeps working without history.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use r2d2_sqlite::rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::json;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::task::spawn_blocking;

use crate::db::DbPool;
use crate::errors::GenerationError;
use crate::logging::{emit, log_event, Event, EventLevel};

const MODULE: &str = "history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub prompt: String,
    pub images: BTreeMap<String, String>,
    /// UTC, ISO-8601 with fixed microsecond precision so that text order is
    /// chronological order.
    pub timestamp: String,
}

pub fn format_timestamp(at: OffsetDateTime) -> Result<String> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    Ok(at.to_offset(time::UtcOffset::UTC).format(&format)?)
}

struct StoredRow {
    id: i64,
    prompt: String,
    images: String,
    timestamp: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        prompt: row.get(1)?,
        images: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

/// Rows whose image set does not parse, or is empty, are logged and skipped.
fn decode_row(row: StoredRow) -> Option<HistoryEntry> {
    match serde_json::from_str::<BTreeMap<String, String>>(&row.images) {
        Ok(images) if !images.is_empty() => Some(HistoryEntry {
            id: row.id,
            prompt: row.prompt,
            images,
            timestamp: row.timestamp,
        }),
        Ok(_) => {
            log::warn!("history entry {} has no images; skipping", row.id);
            None
        }
        Err(err) => {
            log::warn!("history entry {} has unreadable images: {err}; skipping", row.id);
            None
        }
    }
}

pub fn insert_entry(
    conn: &Connection,
    prompt: &str,
    images: &BTreeMap<String, String>,
    at: OffsetDateTime,
) -> Result<i64> {
    let images_json = serde_json::to_string(images)?;
    conn.execute(
        "INSERT INTO prompt_history (prompt, images, timestamp) VALUES (?1, ?2, ?3)",
        params![prompt, images_json, format_timestamp(at)?],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_entries(conn: &Connection) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, prompt, images, timestamp FROM prompt_history ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt.query_map([], map_row)?;
    let mut entries = Vec::new();
    for row in rows {
        if let Some(entry) = decode_row(row?) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<HistoryEntry>> {
    let row = conn
        .query_row(
            "SELECT id, prompt, images, timestamp FROM prompt_history WHERE id = ?1",
            params![id],
            map_row,
        )
        .optional()?;
    Ok(row.and_then(decode_row))
}

pub fn delete_entry(conn: &Connection, id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM prompt_history WHERE id = ?1", params![id])?)
}

pub fn clear_entries(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM prompt_history", [])?)
}

/// Async, failure-swallowing facade over the `prompt_history` table.
#[derive(Clone)]
pub struct HistoryStore {
    pool: DbPool,
}

impl HistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, GenerationError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn)
        })
        .await
        .map_err(|err| anyhow!(err.to_string()))
        .and_then(|res| res)
        .map_err(|err| GenerationError::Persistence(format!("{err:#}")))
    }

    fn report(&self, action: &str, err: &GenerationError) {
        emit(&Event {
            level: EventLevel::Error,
            code: Some(err.code()),
            module: MODULE,
            message: &format!("history {action} failed: {err}"),
            explain: Some(err.explain()),
            data: None,
        });
    }

    pub async fn append(&self, prompt: &str, images: BTreeMap<String, String>) -> Option<i64> {
        self.append_at(prompt, images, OffsetDateTime::now_utc()).await
    }

    pub async fn append_at(
        &self,
        prompt: &str,
        images: BTreeMap<String, String>,
        at: OffsetDateTime,
    ) -> Option<i64> {
        let prompt = prompt.to_string();
        match self
            .with_conn(move |conn| insert_entry(conn, &prompt, &images, at))
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                self.report("append", &err);
                None
            }
        }
    }

    /// All entries, most recent first.
    pub async fn list(&self) -> Vec<HistoryEntry> {
        match self.with_conn(list_entries).await {
            Ok(entries) => entries,
            Err(err) => {
                self.report("list", &err);
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: i64) -> Option<HistoryEntry> {
        match self.with_conn(move |conn| get_entry(conn, id)).await {
            Ok(entry) => entry,
            Err(err) => {
                self.report("get", &err);
                None
            }
        }
    }

    pub async fn delete(&self, id: i64) {
        if let Err(err) = self.with_conn(move |conn| delete_entry(conn, id)).await {
            self.report("delete", &err);
        }
    }

    pub async fn clear(&self) {
        match self.with_conn(clear_entries).await {
            Ok(removed) => {
                self.audit(
                    MODULE,
                    EventLevel::Info,
                    "HIS-0003",
                    "history cleared",
                    Some(json!({ "removed": removed })),
                )
                .await
            }
            Err(err) => self.report("clear", &err),
        }
    }

    /// Best-effort write to the event log.
    pub async fn audit(
        &self,
        module: &'static str,
        level: EventLevel,
        code: &'static str,
        message: &str,
        data: Option<serde_json::Value>,
    ) {
        let message = message.to_string();
        let result = self
            .with_conn(move |conn| {
                log_event(
                    conn,
                    Event {
                        level,
                        code: Some(code),
                        module,
                        message: &message,
                        explain: None,
                        data,
                    },
                )?;
                Ok(())
            })
            .await;
        if let Err(err) = result {
            log::warn!("event log unavailable: {err}");
        }
    }
}
