//! Data model for persisted direct messages.
//!
//! A [`Message`] is immutable once stored except for its `seen` flag, which
//! transitions false to true at most once. The `timestamp` is an opaque
//! client-supplied marker; insertion order in the store is authoritative for
//! ordering, never the timestamp.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored message, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new time-ordered message identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `MessageId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a `MessageId` from its string form.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`uuid::Error`] if the string is not a UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted chat message, as stored and as returned over REST and the
/// live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier.
    pub id: MessageId,
    /// Sender identity.
    pub from: String,
    /// Recipient identity.
    pub to: String,
    /// Text payload; always non-empty.
    pub content: String,
    /// Opaque client-supplied time marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Whether the recipient has durably marked this message as seen.
    #[serde(default)]
    pub seen: bool,
}

/// An inbound message as submitted by a client, before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Sender identity.
    pub from: String,
    /// Recipient identity.
    pub to: String,
    /// Text payload.
    pub content: String,
    /// Opaque client-supplied time marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Error returned when a draft fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Message content is empty.
    #[error("message content is empty")]
    EmptyContent,
    /// A participant field is empty.
    #[error("missing participant: {0}")]
    MissingParticipant(&'static str),
}

impl MessageDraft {
    /// Validates this draft for persistence.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingParticipant`] if `from` or `to` is
    /// empty, or [`ValidationError::EmptyContent`] if the content is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.from.is_empty() {
            return Err(ValidationError::MissingParticipant("from"));
        }
        if self.to.is_empty() {
            return Err(ValidationError::MissingParticipant("to"));
        }
        if self.content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        Ok(())
    }
}
