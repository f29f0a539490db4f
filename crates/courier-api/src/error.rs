use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API-level error taxonomy. Services return these up the call chain;
/// `IntoResponse` is the single mapping stage to HTTP status + JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<courier_db::Error> for ApiError {
    fn from(e: courier_db::Error) -> Self {
        use courier_db::Error as Db;
        let msg = e.to_string();
        match e {
            Db::NotFound(_) => ApiError::NotFound(msg),
            Db::Conflict(_) => ApiError::Conflict(msg),
            Db::NotRecipient(_) => {
                ApiError::Unauthorized("only the recipient may mark a message read".into())
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(source) => {
                // Log the detail, never leak it to the client.
                error!("internal error: {:#}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let not_found: ApiError = courier_db::Error::NotFound("user ghost".into()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = courier_db::Error::Conflict("username alice".into()).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let not_recipient: ApiError = courier_db::Error::NotRecipient("alice".into()).into();
        assert_eq!(
            not_recipient.into_response().status(),
            StatusCode::UNAUTHORIZED
        );

        let poisoned: ApiError = courier_db::Error::LockPoisoned.into();
        assert_eq!(
            poisoned.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_is_bad_request() {
        let err = ApiError::Validation("invalid username/password".into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = ApiError::Internal(anyhow::anyhow!("secret detail"));
        assert_eq!(err.to_string(), "internal server error");
    }
}
