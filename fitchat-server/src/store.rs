//! Durable message store backed by SQLite.
//!
//! An append-only log of direct messages keyed by the sender/recipient pair;
//! `seen` is the only column ever updated. Per-record atomicity comes from
//! the database engine, and every operation is bounded by a configured
//! timeout so a stalled database surfaces as [`StoreError::Unavailable`]
//! instead of hanging a connection handler.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use fitchat_proto::message::{Message, MessageDraft, MessageId, ValidationError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Default bound on any single store operation.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from message store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The payload failed validation before touching the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No message with the requested id exists.
    #[error("message not found: {0}")]
    NotFound(MessageId),
    /// The database failed or did not answer within the configured timeout.
    /// Safe to retry.
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Row tuple as selected from the `messages` table.
type MessageRow = (String, String, String, String, Option<String>, bool);

const MESSAGE_COLUMNS: &str = "id, sender, recipient, content, sent_at, seen";

fn row_to_message(
    (id, sender, recipient, content, sent_at, seen): MessageRow,
) -> Result<Message, StoreError> {
    let id = MessageId::parse(&id)
        .map_err(|e| StoreError::Unavailable(format!("corrupt message id {id:?}: {e}")))?;
    Ok(Message {
        id,
        from: sender,
        to: recipient,
        content,
        timestamp: sent_at,
        seen,
    })
}

/// Handle to the messages table. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl MessageStore {
    /// Opens (creating if missing) the database file and initializes the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be opened
    /// or the schema cannot be created.
    pub async fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool, timeout };
        store.init().await?;
        Ok(store)
    }

    /// Opens an in-memory database, for tests and ephemeral deployments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the schema cannot be created.
    pub async fn open_in_memory(timeout: Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // Pooled in-memory connections each see their own database, so the
        // pool is pinned to a single never-recycled connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self { pool, timeout };
        store.init().await?;
        Ok(store)
    }

    /// Returns the underlying pool, shared with the user directory.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.bounded(
            sqlx::query(
                "CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    sender TEXT NOT NULL,
                    recipient TEXT NOT NULL,
                    content TEXT NOT NULL,
                    sent_at TEXT,
                    seen INTEGER NOT NULL DEFAULT 0
                )",
            )
            .execute(&self.pool),
        )
        .await?;
        self.bounded(
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_messages_recipient_seen
                 ON messages(recipient, seen)",
            )
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Persists a new message with `seen = false` and returns the stored
    /// record including its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty content or missing
    /// participant, [`StoreError::Unavailable`] on database failure.
    pub async fn append(&self, draft: MessageDraft) -> Result<Message, StoreError> {
        draft.validate()?;
        let id = MessageId::new();
        self.bounded(
            sqlx::query(
                "INSERT INTO messages (id, sender, recipient, content, sent_at, seen)
                 VALUES (?, ?, ?, ?, ?, 0)",
            )
            .bind(id.to_string())
            .bind(&draft.from)
            .bind(&draft.to)
            .bind(&draft.content)
            .bind(draft.timestamp.as_deref())
            .execute(&self.pool),
        )
        .await?;
        let MessageDraft {
            from,
            to,
            content,
            timestamp,
        } = draft;
        Ok(Message {
            id,
            from,
            to,
            content,
            timestamp,
            seen: false,
        })
    }

    /// Returns every message whose `{from, to}` unordered pair equals
    /// `{a, b}`, in insertion order. Empty for unknown pairs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on database failure or timeout.
    pub async fn conversation(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = self
            .bounded(
                sqlx::query_as(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE (sender = ? AND recipient = ?) OR (sender = ? AND recipient = ?)
                     ORDER BY rowid"
                ))
                .bind(a)
                .bind(b)
                .bind(b)
                .bind(a)
                .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(row_to_message).collect()
    }

    /// Returns every message addressed to `recipient` that has not been
    /// marked seen, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on database failure or timeout.
    pub async fn unseen(&self, recipient: &str) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = self
            .bounded(
                sqlx::query_as(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE recipient = ? AND seen = 0
                     ORDER BY rowid"
                ))
                .bind(recipient)
                .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(row_to_message).collect()
    }

    /// Sets `seen = true` on a message and returns the updated record.
    /// Idempotent: marking an already-seen message is a no-op that returns
    /// the same record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no message has that id, or
    /// [`StoreError::Unavailable`] on database failure or timeout.
    pub async fn mark_seen(&self, id: MessageId) -> Result<Message, StoreError> {
        let row: Option<MessageRow> = self
            .bounded(
                sqlx::query_as(&format!(
                    "UPDATE messages SET seen = 1 WHERE id = ?
                     RETURNING {MESSAGE_COLUMNS}"
                ))
                .bind(id.to_string())
                .fetch_optional(&self.pool),
            )
            .await?;
        row.map_or(Err(StoreError::NotFound(id)), row_to_message)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Unavailable(format!(
                "store operation timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
