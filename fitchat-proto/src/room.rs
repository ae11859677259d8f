//! Room-key resolution for direct-message conversations.
//!
//! A conversation between two users is identified by the *unordered* pair of
//! their identifiers: both participants must land in the same room no matter
//! which side initiates. The canonical key sorts the pair and joins it with
//! [`ROOM_SEPARATOR`]. The REST history surface parses room names with the
//! exact same rule, so live and REST paths always agree.

use serde::{Deserialize, Serialize};

/// Separator between the two participant identifiers in a room key.
pub const ROOM_SEPARATOR: char = '-';

/// Errors from room-key resolution and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// One of the participant identifiers is empty.
    #[error("participant identifier is empty")]
    InvalidParticipant,
    /// A room name did not contain exactly two participant identifiers.
    #[error("malformed room name: {0:?}")]
    MalformedName(String),
}

/// Canonical key for a two-participant conversation room.
///
/// Construction is only possible through [`RoomKey::resolve`] or
/// [`RoomKey::parse`], so a `RoomKey` value is always in canonical
/// (sorted) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    /// Resolves the unordered pair `{a, b}` to its canonical room key.
    ///
    /// Pure and commutative: `resolve(a, b) == resolve(b, a)`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidParticipant`] if either identifier is
    /// empty.
    pub fn resolve(a: &str, b: &str) -> Result<Self, RoomError> {
        if a.is_empty() || b.is_empty() {
            return Err(RoomError::InvalidParticipant);
        }
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self(format!("{lo}{ROOM_SEPARATOR}{hi}")))
    }

    /// Parses a client-supplied room name into a canonical key.
    ///
    /// Applies the identical separator-and-sort rule as [`RoomKey::resolve`],
    /// so `"bob-alice"` and `"alice-bob"` both canonicalize to `alice-bob`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::MalformedName`] if the name does not split into
    /// exactly two parts, or [`RoomError::InvalidParticipant`] if either
    /// part is empty.
    pub fn parse(name: &str) -> Result<Self, RoomError> {
        let mut parts = name.split(ROOM_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => Self::resolve(a, b),
            _ => Err(RoomError::MalformedName(name.to_string())),
        }
    }

    /// Returns the two participant identifiers, in canonical order.
    #[must_use]
    pub fn participants(&self) -> (&str, &str) {
        // A RoomKey always contains exactly one separator by construction.
        self.0
            .split_once(ROOM_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
