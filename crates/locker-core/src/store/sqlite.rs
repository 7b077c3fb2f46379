//! `SQLite`-backed store shared by every process that opens the same file.
//!
//! Each primitive is a single SQL statement (plus a cleanup statement inside
//! the same transaction for deletes), so compare-and-set is atomic across
//! connections and processes.

use std::{collections::BTreeSet, path::Path, str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use super::Store;
use crate::{Error, Result};

/// Schema executed on open.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS kv_hash (
    key TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (key, field)
);

CREATE TABLE IF NOT EXISTS kv_set (
    key TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (key, member)
);
";

fn store_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Store(format!("{context}: {e}"))
}

/// [`Store`] over a `sqlx` `SqlitePool`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path, busy_timeout: Duration, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .connect_with(options)
            .await
            .map_err(store_error("Failed to open database"))?;

        Self::from_pool(pool).await
    }

    /// A private in-memory database. Lives as long as the store does.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(store_error("Invalid database url"))?;

        // Every connection to :memory: is its own database, so pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(store_error("Failed to open in-memory database"))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(store_error("Failed to initialize schema"))?;
        Ok(Self { pool })
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_hash WHERE key = ?1 AND field = ?2")
            .bind(key)
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error("Failed to read field"))
    }

    async fn compare_and_set(
        &self,
        key: &str,
        field: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO kv_hash (key, field, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT (key, field) DO NOTHING",
                )
                .bind(key)
                .bind(field)
                .bind(new)
                .execute(&self.pool)
                .await
            }
            Some(current) => {
                sqlx::query(
                    "UPDATE kv_hash SET value = ?3
                     WHERE key = ?1 AND field = ?2 AND value = ?4",
                )
                .bind(key)
                .bind(field)
                .bind(new)
                .bind(current)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(store_error("Failed to compare-and-set"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn compare_and_delete(&self, key: &str, field: &str, expected: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        let deleted = sqlx::query(
            "DELETE FROM kv_hash
             WHERE key = ?1
               AND EXISTS (
                   SELECT 1 FROM kv_hash WHERE key = ?1 AND field = ?2 AND value = ?3
               )",
        )
        .bind(key)
        .bind(field)
        .bind(expected)
        .execute(&mut *tx)
        .await
        .map_err(store_error("Failed to compare-and-delete"))?
        .rows_affected();

        if deleted > 0 {
            sqlx::query("DELETE FROM kv_set WHERE key = ?1")
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(store_error("Failed to compare-and-delete"))?;
        }

        tx.commit()
            .await
            .map_err(store_error("Failed to commit transaction"))?;
        Ok(deleted > 0)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO kv_set (key, member) VALUES (?1, ?2)
             ON CONFLICT (key, member) DO NOTHING",
        )
        .bind(key)
        .bind(member)
        .execute(&self.pool)
        .await
        .map_err(store_error("Failed to add set member"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_set WHERE key = ?1 AND member = ?2")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await
            .map_err(store_error("Failed to remove set member"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        let members =
            sqlx::query_scalar::<_, String>("SELECT member FROM kv_set WHERE key = ?1")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .map_err(store_error("Failed to list set members"))?;

        Ok(members.into_iter().collect())
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM kv_set WHERE key = ?1 AND member = ?2)",
        )
        .bind(key)
        .bind(member)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error("Failed to check set member"))?;

        Ok(found != 0)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(store_error("Failed to begin transaction"))?;

        let hash_rows = sqlx::query("DELETE FROM kv_hash WHERE key = ?1")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to delete key"))?
            .rows_affected();

        let set_rows = sqlx::query("DELETE FROM kv_set WHERE key = ?1")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(store_error("Failed to delete key"))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(store_error("Failed to commit transaction"))?;
        Ok(hash_rows + set_rows > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM kv_hash WHERE key = ?1)
                 OR EXISTS (SELECT 1 FROM kv_set WHERE key = ?1)",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error("Failed to check key"))?;

        Ok(found != 0)
    }
}
