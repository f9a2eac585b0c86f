//! Bearer-token access for the remote provider client.
//!
//! The login flow lives outside this crate: it redirects back with the token
//! as a query parameter, and [`token_from_redirect`] plus [`store_token`]
//! persist it in `app_settings`. Clients only ever read it through
//! [`CredentialProvider`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use r2d2_sqlite::rusqlite::{params, Connection, OptionalExtension};
use reqwest::Url;
use time::OffsetDateTime;
use tokio::task::spawn_blocking;

use crate::db::DbPool;

pub const TOKEN_SETTING_KEY: &str = "auth.token";
pub const TOKEN_QUERY_PARAM: &str = "token";

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, if the user is signed in.
    async fn get(&self) -> Option<String>;
}

/// A fixed token, typically supplied through configuration or tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn get(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token the login flow stored in `app_settings`.
#[derive(Clone)]
pub struct SettingsCredentialStore {
    pool: DbPool,
}

impl SettingsCredentialStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialProvider for SettingsCredentialStore {
    async fn get(&self) -> Option<String> {
        let pool = self.pool.clone();
        let loaded = spawn_blocking(move || {
            let conn = pool.get()?;
            load_token(&conn)
        })
        .await
        .map_err(|err| anyhow!(err.to_string()))
        .and_then(|res| res);
        match loaded {
            Ok(token) => token,
            Err(err) => {
                log::error!("failed to read stored access token: {err:#}");
                None
            }
        }
    }
}

pub fn load_token(conn: &Connection) -> Result<Option<String>> {
    let token: Option<String> = conn
        .query_row(
            "SELECT value FROM app_settings WHERE key = ?1",
            params![TOKEN_SETTING_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(token.filter(|t| !t.trim().is_empty()))
}

pub fn store_token(conn: &Connection, token: &str) -> Result<()> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return clear_token(conn);
    }
    conn.execute(
        "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![
            TOKEN_SETTING_KEY,
            trimmed,
            OffsetDateTime::now_utc().unix_timestamp()
        ],
    )?;
    Ok(())
}

pub fn clear_token(conn: &Connection) -> Result<()> {
    conn.execute(
        "DELETE FROM app_settings WHERE key = ?1",
        params![TOKEN_SETTING_KEY],
    )?;
    Ok(())
}

/// Store the token carried by `redirect_url`, replacing any earlier one.
pub fn login(pool: &DbPool, redirect_url: &str) -> Result<()> {
    let token = token_from_redirect(redirect_url)?
        .ok_or_else(|| anyhow!("redirect URL carries no {TOKEN_QUERY_PARAM} parameter"))?;
    let conn = pool.get()?;
    store_token(&conn, &token)
}

pub fn logout(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;
    clear_token(&conn)
}

/// Pull the token out of the URL the login provider redirected back to.
pub fn token_from_redirect(redirect_url: &str) -> Result<Option<String>> {
    let url = Url::parse(redirect_url)
        .with_context(|| format!("not a valid redirect URL: {redirect_url}"))?;
    Ok(url
        .query_pairs()
        .find(|(k, _)| k == TOKEN_QUERY_PARAM)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}
