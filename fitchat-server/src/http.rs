//! REST history facade.
//!
//! Synchronous query surface over the message store, used on page load
//! before a live connection exists. Room names parse with the exact rule
//! the live path uses, so both surfaces agree on conversations.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fitchat_proto::message::{Message, MessageId};
use fitchat_proto::room::{RoomError, RoomKey};

use crate::server::ChatState;
use crate::store::StoreError;

/// REST-surface error, mapped onto 4xx/5xx responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed room name or payload.
    #[error("{0}")]
    BadRequest(String),
    /// Unknown message id or user id.
    #[error("{0}")]
    NotFound(String),
    /// The store failed or timed out; safe to retry.
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(v) => Self::BadRequest(v.to_string()),
            StoreError::NotFound(id) => Self::NotFound(format!("message not found: {id}")),
            StoreError::Unavailable(reason) => Self::Unavailable(reason),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(e: RoomError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// `GET /messages/{room_name}`: full history of a conversation.
///
/// Returns `200` with an empty array for conversations with no history,
/// never `404`.
pub async fn conversation(
    State(state): State<Arc<ChatState>>,
    Path(room_name): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let key = RoomKey::parse(&room_name)?;
    let (a, b) = key.participants();
    Ok(Json(state.store.conversation(a, b).await?))
}

/// `GET /messages/unseen/{user_id}`: unseen messages for a user.
///
/// The id is resolved through the user directory; unknown ids are `404`.
pub async fn unseen(
    State(state): State<Arc<ChatState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let Some(user) = state.directory.resolve(&user_id).await? else {
        return Err(ApiError::NotFound(format!("user not found: {user_id}")));
    };
    Ok(Json(state.store.unseen(&user.username).await?))
}

/// `PUT /messages/unseen/{msg_id}`: durably mark a message as seen.
///
/// Idempotent; unknown ids (including unparseable ones) are `404`.
pub async fn mark_seen(
    State(state): State<Arc<ChatState>>,
    Path(msg_id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let id = MessageId::parse(&msg_id)
        .map_err(|_| ApiError::NotFound(format!("message not found: {msg_id}")))?;
    Ok(Json(state.store.mark_seen(id).await?))
}
