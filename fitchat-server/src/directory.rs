//! User directory seam.
//!
//! Account management (signup, profiles, auth) belongs to the main FitChat
//! application service; the messaging core only needs to map a user id to
//! the username identity that appears in the `to`/`from` fields. This module
//! reads the `users` table that service maintains.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::store::StoreError;

/// A resolved directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Opaque account identifier.
    pub id: String,
    /// The identity used on messages.
    pub username: String,
}

/// Read-mostly view over the account service's `users` table.
#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
    timeout: Duration,
}

impl UserDirectory {
    /// Creates a directory over an existing pool.
    #[must_use]
    pub const fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Creates the `users` table if the account service has not done so yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on database failure.
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Resolves a user id to its directory record, `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on database failure or timeout.
    pub async fn resolve(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let lookup = sqlx::query_as::<_, (String, String)>(
            "SELECT id, username FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool);
        let row = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result.map_err(StoreError::from)?,
            Err(_) => {
                return Err(StoreError::Unavailable(format!(
                    "directory lookup timed out after {:?}",
                    self.timeout
                )));
            }
        };
        Ok(row.map(|(id, username)| UserRecord { id, username }))
    }

    /// Inserts a directory entry. The account service owns user creation;
    /// this is exposed for seeding and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on database failure.
    pub async fn insert(&self, id: &str, username: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO users (id, username) VALUES (?, ?)")
            .bind(id)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}
