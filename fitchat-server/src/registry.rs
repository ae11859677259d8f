//! Connection registry: live sockets and their room memberships.
//!
//! Maps room keys to the connections currently joined and fans events out to
//! a room. Delivery to each member is fire-and-forget through a bounded
//! per-connection queue; a member whose queue is full or closed is treated
//! as disconnected and removed from every room, without delaying or failing
//! delivery to the others.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use fitchat_proto::codec;
use fitchat_proto::event::ServerEvent;
use fitchat_proto::room::RoomKey;
use tokio::sync::{mpsc, RwLock};

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// Process-unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct ConnEntry {
    sender: mpsc::Sender<Message>,
    joined: HashSet<RoomKey>,
}

#[derive(Default)]
struct RegistryInner {
    conns: HashMap<ConnId, ConnEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnId>>,
}

impl RegistryInner {
    /// Drops a connection and every room membership it holds.
    fn remove_everywhere(&mut self, conn: ConnId) {
        let Some(entry) = self.conns.remove(&conn) else {
            return;
        };
        for room in entry.joined {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(&conn);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
        }
    }
}

/// Process-scoped registry of live connections.
///
/// Thread-safe via a single [`RwLock`]; membership tables are the only
/// contended state, encoded payloads are shared immutably during fan-out.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outbound queue, assigning it an id.
    pub async fn register(&self, sender: mpsc::Sender<Message>) -> ConnId {
        let conn = ConnId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.write().await;
        inner.conns.insert(
            conn,
            ConnEntry {
                sender,
                joined: HashSet::new(),
            },
        );
        conn
    }

    /// Removes a connection from the registry and from every room it
    /// joined. Called on disconnect; safe to call twice.
    pub async fn unregister(&self, conn: ConnId) {
        let mut inner = self.inner.write().await;
        inner.remove_everywhere(conn);
    }

    /// Adds a connection to a room's member set. Idempotent; re-joining a
    /// room the connection is already in is a no-op.
    ///
    /// Returns `false` if the connection is no longer registered.
    pub async fn join(&self, conn: ConnId, room: &RoomKey) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.conns.get_mut(&conn) else {
            return false;
        };
        entry.joined.insert(room.clone());
        inner.rooms.entry(room.clone()).or_default().insert(conn);
        true
    }

    /// Removes a connection from a single room's member set.
    pub async fn leave(&self, conn: ConnId, room: &RoomKey) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.conns.get_mut(&conn) {
            entry.joined.remove(room);
        }
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }

    /// Returns the number of connections currently joined to a room.
    pub async fn member_count(&self, room: &RoomKey) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(room).map_or(0, HashSet::len)
    }

    /// Returns whether a connection is currently a member of a room.
    pub async fn is_member(&self, conn: ConnId, room: &RoomKey) -> bool {
        let inner = self.inner.read().await;
        inner.rooms.get(room).is_some_and(|m| m.contains(&conn))
    }

    /// Sends an event to one connection. A failed send (queue full or
    /// closed) treats the connection as disconnected.
    pub async fn send_to(&self, conn: ConnId, event: &ServerEvent) {
        let text = match codec::encode_server(event) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode server event");
                return;
            }
        };
        let sender = {
            let inner = self.inner.read().await;
            inner.conns.get(&conn).map(|entry| entry.sender.clone())
        };
        if let Some(sender) = sender
            && sender.try_send(Message::Text(text.into())).is_err()
        {
            tracing::warn!(conn = %conn, "send failed, dropping connection");
            self.unregister(conn).await;
        }
    }

    /// Delivers an event to every member of a room except `exclude`.
    ///
    /// Returns the number of connections the event was queued for. Members
    /// that cannot keep up (queue full) or have gone away (queue closed)
    /// are dropped from every room; their failure never aborts delivery to
    /// the rest.
    pub async fn broadcast(
        &self,
        room: &RoomKey,
        event: &ServerEvent,
        exclude: Option<ConnId>,
    ) -> usize {
        let text = match codec::encode_server(event) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode server event");
                return 0;
            }
        };

        // Snapshot the member senders so the fan-out itself holds no lock.
        let targets: Vec<(ConnId, mpsc::Sender<Message>)> = {
            let inner = self.inner.read().await;
            let Some(members) = inner.rooms.get(room) else {
                return 0;
            };
            members
                .iter()
                .filter(|conn| Some(**conn) != exclude)
                .filter_map(|conn| {
                    inner
                        .conns
                        .get(conn)
                        .map(|entry| (*conn, entry.sender.clone()))
                })
                .collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (conn, sender) in targets {
            match sender.try_send(Message::Text(text.clone().into())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        conn = %conn,
                        room = %room,
                        error = %e,
                        "member cannot keep up, dropping connection"
                    );
                    failed.push(conn);
                }
            }
        }

        if !failed.is_empty() {
            let mut inner = self.inner.write().await;
            for conn in failed {
                inner.remove_everywhere(conn);
            }
        }

        delivered
    }

    /// Sends a close frame to every connection and clears all membership
    /// tables. Used for graceful shutdown.
    pub async fn close_all(&self) {
        let mut inner = self.inner.write().await;
        for (conn, entry) in inner.conns.drain() {
            tracing::info!(conn = %conn, "sending close frame");
            let _ = entry.sender.try_send(Message::Close(None));
        }
        inner.rooms.clear();
    }
}
