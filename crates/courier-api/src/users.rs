use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use courier_db::models::{self, ProfileRow};
use courier_types::api::{Claims, InboxMessage, OutboxMessage, UserDetail, UserSummary};

use crate::AppState;
use crate::error::{ApiError, join_error};
use crate::messages::parse_id;

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_users())
        .await
        .map_err(join_error)??;

    let users: Vec<UserSummary> = rows.into_iter().map(summary).collect();

    Ok(Json(json!({ "users": users })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.get_user(&username)?;

    let user = UserDetail {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
        join_at: models::parse_timestamp(&row.join_at),
        last_login_at: models::parse_timestamp(&row.last_login_at),
    };

    Ok(Json(json!({ "user": user })))
}

/// Inbox: messages addressed to the user, sender profile attached.
pub async fn messages_to(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.messages_to(&username))
        .await
        .map_err(join_error)??;

    let messages: Vec<InboxMessage> = rows
        .into_iter()
        .map(|row| InboxMessage {
            id: parse_id(&row.id),
            body: row.body,
            sent_at: models::parse_timestamp(&row.sent_at),
            read_at: row.read_at.as_deref().map(models::parse_timestamp),
            from_user: summary(row.counterpart),
        })
        .collect();

    Ok(Json(json!({ "messages": messages })))
}

/// Outbox: messages the user sent, recipient profile attached.
pub async fn messages_from(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.messages_from(&username))
        .await
        .map_err(join_error)??;

    let messages: Vec<OutboxMessage> = rows
        .into_iter()
        .map(|row| OutboxMessage {
            id: parse_id(&row.id),
            body: row.body,
            sent_at: models::parse_timestamp(&row.sent_at),
            read_at: row.read_at.as_deref().map(models::parse_timestamp),
            to_user: summary(row.counterpart),
        })
        .collect();

    Ok(Json(json!({ "messages": messages })))
}

pub(crate) fn summary(row: ProfileRow) -> UserSummary {
    UserSummary {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}
