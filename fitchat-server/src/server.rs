//! Server assembly: shared state, router, startup and shutdown.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::directory::UserDirectory;
use crate::http;
use crate::registry::{ConnectionRegistry, DEFAULT_SEND_QUEUE_CAPACITY};
use crate::session;
use crate::store::MessageStore;

/// Shared server state: the durable store, the user directory seam, and the
/// live connection registry. Constructed once at startup and handed to every
/// handler behind an [`Arc`].
pub struct ChatState {
    /// Durable message log.
    pub store: MessageStore,
    /// User-id to username resolution (account service's table).
    pub directory: UserDirectory,
    /// Live connections and room memberships.
    pub registry: ConnectionRegistry,
    /// Capacity of each connection's outbound queue.
    pub send_queue_capacity: usize,
}

impl ChatState {
    /// Creates state with the default per-connection queue capacity.
    #[must_use]
    pub fn new(store: MessageStore, directory: UserDirectory) -> Self {
        Self::with_send_queue_capacity(store, directory, DEFAULT_SEND_QUEUE_CAPACITY)
    }

    /// Creates state with a custom per-connection queue capacity.
    #[must_use]
    pub fn with_send_queue_capacity(
        store: MessageStore,
        directory: UserDirectory,
        send_queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            directory,
            registry: ConnectionRegistry::new(),
            send_queue_capacity,
        }
    }

    /// Drains the live side: every connection gets a close frame and all
    /// room memberships are dropped. Persisted messages are unaffected.
    pub async fn shutdown(&self) {
        tracing::info!("draining live connections");
        self.registry.close_all().await;
    }
}

/// Builds the chat router: the live WebSocket endpoint plus the REST
/// history facade, CORS-open like the rest of the backend.
pub fn router(state: Arc<ChatState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/messages/{room_name}", get(http::conversation))
        .route(
            "/messages/unseen/{id}",
            get(http::unseen).put(http::mark_seen),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the chat server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ChatState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "chat server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a live chat session.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ChatState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state))
}
