pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use courier_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

/// Build the full application router. The binary wraps this in CORS and
/// trace layers; the HTTP test suite drives it directly.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let logged_in = Router::new()
        .route("/users", get(users::list_users))
        .route("/messages", post(messages::send_message))
        .route("/messages/{id}", get(messages::get_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state.clone());

    let correct_user = Router::new()
        .route("/users/{username}", get(users::get_user))
        .route("/users/{username}/to", get(users::messages_to))
        .route("/users/{username}/from", get(users::messages_from))
        .layer(from_fn(middleware::require_self))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public).merge(logged_in).merge(correct_user)
}
