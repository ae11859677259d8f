//! Typed event set for the live chat channel.
//!
//! Events travel as JSON text frames with a `type` tag, one enum per
//! direction. Every inbound frame dispatches through a single handler, which
//! replaces the original ad hoc field-presence checks with exhaustive
//! matching.

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageDraft, MessageId};

/// Events a client may send to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join a conversation room by name.
    #[serde(rename = "joinRoom")]
    JoinRoom {
        /// Room name, e.g. `alice-bob`. Canonicalized server-side.
        room: String,
    },
    /// Send a direct message; persisted, then fanned out to the room.
    #[serde(rename = "usrMessage")]
    UsrMessage(MessageDraft),
    /// Live hint that the sender has seen the conversation. Re-broadcast
    /// only; durable seen-state goes through the REST facade instead.
    #[serde(rename = "sawMessage")]
    SawMessage(SeenNotice),
}

/// Payload of a live `sawMessage` hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenNotice {
    /// Identity of the user acknowledging.
    pub from: String,
    /// Identity of the other participant.
    pub to: String,
    /// The message being acknowledged, when the client knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
}

/// Events the server may push to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A stored message delivered to every member of its room, the sender's
    /// own connections included (this is how the sender learns the
    /// server-assigned id).
    #[serde(rename = "sendMessage")]
    SendMessage {
        /// The canonical stored record.
        message: Message,
    },
    /// Re-broadcast of a live seen hint to the other room members.
    #[serde(rename = "sawMessage")]
    SawMessage {
        /// Identity of the acknowledging user.
        from: String,
        /// Identity of the other participant.
        to: String,
        /// The acknowledged message, if the notice carried one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<MessageId>,
        /// Always `true` on the wire.
        seen: bool,
    },
    /// Failure report, delivered only to the originating connection.
    #[serde(rename = "error")]
    Error {
        /// Human-readable description of what was rejected.
        reason: String,
    },
}

impl ServerEvent {
    /// Builds the outbound `sawMessage` event for a client notice, with the
    /// `seen` flag forced on.
    #[must_use]
    pub fn seen(notice: SeenNotice) -> Self {
        Self::SawMessage {
            from: notice.from,
            to: notice.to,
            id: notice.id,
            seen: true,
        }
    }

    /// Builds an error event from anything displayable.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Self::Error {
            reason: reason.to_string(),
        }
    }
}
