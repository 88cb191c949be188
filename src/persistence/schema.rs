//! `SQLite` schema bootstrap logic.
//!
//! `CREATE TABLE IF NOT EXISTS` only; re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Create the flat key-value table.
///
/// # Errors
///
/// Returns `AppError::Db` if the DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
