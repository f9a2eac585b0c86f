//! Structured diagnostics.
//!
//! Events go to the `log` facade first so they are visible even when SQLite
//! is not, then to the `event_log` table for later inspection.

use r2d2_sqlite::rusqlite::{params, Connection};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn as_log_level(self) -> log::Level {
        match self {
            Self::Info => log::Level::Info,
            Self::Warn => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

/// A single diagnostic record destined for the event log.
#[derive(Debug, Clone)]
pub struct Event<'a> {
    pub level: EventLevel,
    pub code: Option<&'a str>,
    pub module: &'a str,
    pub message: &'a str,
    pub explain: Option<&'a str>,
    pub data: Option<Value>,
}

pub fn log_event(conn: &Connection, event: Event<'_>) -> rusqlite::Result<()> {
    emit(&event);
    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = event.data.as_ref().map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            ts,
            event.level.as_str(),
            event.code,
            event.module,
            event.message,
            event.explain,
            data_str
        ],
    )?;
    Ok(())
}

/// Forward an event to the `log` facade only.
pub fn emit(event: &Event<'_>) {
    let code = event.code.unwrap_or("-");
    match &event.data {
        Some(data) => log::log!(
            target: event.module,
            event.level.as_log_level(),
            "[{code}] {} {data}",
            event.message
        ),
        None => log::log!(
            target: event.module,
            event.level.as_log_level(),
            "[{code}] {}",
            event.message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_persists_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE event_log (id TEXT PRIMARY KEY, ts INTEGER, level TEXT, code TEXT, module TEXT, message TEXT, explain TEXT, data TEXT);",
        )
        .unwrap();
        log_event(
            &conn,
            Event {
                level: EventLevel::Warn,
                code: Some("GEN-1002"),
                module: "generation",
                message: "provider failed",
                explain: None,
                data: Some(serde_json::json!({ "provider": "dalle3" })),
            },
        )
        .unwrap();
        let (level, data): (String, String) = conn
            .query_row("SELECT level, data FROM event_log", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(level, "warn");
        assert!(data.contains("dalle3"));
    }
}
