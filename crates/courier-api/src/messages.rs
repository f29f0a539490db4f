use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use courier_db::models;
use courier_types::api::{Claims, MessageDetail, ReadReceipt, SendMessageRequest, SentMessage};

use crate::AppState;
use crate::error::{ApiError, join_error};
use crate::users::summary;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.body.trim().is_empty() {
        return Err(ApiError::Validation("message body must not be empty".into()));
    }

    let message_id = Uuid::new_v4();

    // Run the blocking insert off the async runtime
    let db = state.clone();
    let id = message_id.to_string();
    let from = claims.username.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db.create_message(&id, &from, &req.to_username, &req.body)
    })
    .await
    .map_err(join_error)??;

    let message = SentMessage {
        id: message_id,
        from_username: row.from_username,
        to_username: row.to_username,
        body: row.body,
        sent_at: models::parse_timestamp(&row.sent_at),
        read_at: None,
    };

    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

/// Only a participant (sender or recipient) may view a message.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.get_message(&id.to_string())?;

    if claims.username != row.from_user.username && claims.username != row.to_user.username {
        return Err(ApiError::Unauthorized(
            "only a participant may view this message".into(),
        ));
    }

    let message = MessageDetail {
        id: parse_id(&row.id),
        body: row.body,
        sent_at: models::parse_timestamp(&row.sent_at),
        read_at: row.read_at.as_deref().map(models::parse_timestamp),
        from_user: summary(row.from_user),
        to_user: summary(row.to_user),
    };

    Ok(Json(json!({ "message": message })))
}

/// Recipient ownership is enforced by the store operation itself.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let read_at = state
        .db
        .mark_message_read(&id.to_string(), &claims.username)?;

    let message = ReadReceipt {
        id,
        read_at: models::parse_timestamp(&read_at),
    };

    Ok(Json(json!({ "message": message })))
}

pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt message id '{}': {}", raw, e);
        Uuid::default()
    })
}
