//! Persisted agent state.
//!
//! A flat key-value namespace; each agent owns the keys under its prefix:
//!
//! | Key                          | Value                      |
//! |------------------------------|----------------------------|
//! | `agent:{name}:enabled`       | `true` / `false`           |
//! | `agent:{name}:setting:{key}` | text form of the value     |
//!
//! Writes to the same key are last-write-wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::Result;

use super::db::Database;

/// Key holding an agent's enabled flag.
#[must_use]
pub fn enabled_key(agent: &str) -> String {
    format!("agent:{agent}:enabled")
}

/// Key holding one agent setting.
#[must_use]
pub fn setting_key(agent: &str, key: &str) -> String {
    format!("{}{key}", setting_prefix(agent))
}

fn setting_prefix(agent: &str) -> String {
    format!("agent:{agent}:setting:")
}

/// Key-value store backed by `SQLite`.
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
}

impl SettingsStore {
    /// Create a store over `db`.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Raw value of `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(self.db.as_ref())
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Insert or overwrite `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Persisted enabled flag of `agent`, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn enabled(&self, agent: &str) -> Result<Option<bool>> {
        Ok(self
            .get(&enabled_key(agent))
            .await?
            .map(|raw| parse_flag(&raw)))
    }

    /// Persist the enabled flag of `agent`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn set_enabled(&self, agent: &str, enabled: bool) -> Result<()> {
        self.set(&enabled_key(agent), if enabled { "true" } else { "false" })
            .await
    }

    /// All persisted settings of `agent`, keyed by setting name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn settings(&self, agent: &str) -> Result<HashMap<String, String>> {
        let prefix = setting_prefix(agent);
        // Prefix compare with substr: agent names may contain LIKE wildcards.
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM kv WHERE substr(key, 1, length(?1)) = ?1",
        )
        .bind(&prefix)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|name| (name.to_owned(), value))
            })
            .collect())
    }

    /// Persist one setting of `agent`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn set_setting(&self, agent: &str, key: &str, value: &str) -> Result<()> {
        self.set(&setting_key(agent, key), value).await
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
