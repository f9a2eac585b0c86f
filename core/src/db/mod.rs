use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub type DbPool = Pool<SqliteConnectionManager>;

pub const DB_FILE_NAME: &str = "imagecompare.db";

/// Open (or create) the workspace database and bring its schema up to date.
pub fn init_db(workspace_dir: PathBuf) -> Result<DbPool> {
    std::fs::create_dir_all(&workspace_dir)
        .with_context(|| format!("failed to create {}", workspace_dir.display()))?;
    open_pool(&workspace_dir.join(DB_FILE_NAME))
}

pub fn open_pool(db_path: &Path) -> Result<DbPool> {
    let mgr = SqliteConnectionManager::file(db_path);
    let pool = Pool::new(mgr).context("failed to open SQLite pool")?;
    {
        let conn = pool.get()?;
        apply_migrations(&conn)?;
    }
    Ok(pool)
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    let migrations: &[(&str, &str)] = &[
        (
            "0001_prompt_history.sql",
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../migrations/0001_prompt_history.sql"
            )),
        ),
        (
            "0002_settings_event_log.sql",
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../migrations/0002_settings_event_log.sql"
            )),
        ),
    ];

    for (name, sql) in migrations {
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration {name}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        init_db(dir.path().to_path_buf()).unwrap();
        let pool = init_db(dir.path().to_path_buf()).unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name IN ('prompt_history', 'app_settings', 'event_log')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
