use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use courier_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse};

use crate::AppState;
use crate::error::ApiError;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    // A duplicate username loses the race at the store and comes back as
    // a conflict.
    state.db.create_user(
        &req.username,
        &password_hash,
        &req.first_name,
        &req.last_name,
        &req.phone,
    )?;

    let token = create_token(&state.jwt_secret, &req.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Unknown user and wrong password are the same expected outcome, with
    // one undifferentiated message.
    let bad_credentials = || ApiError::Validation("invalid username/password".into());

    let Some(stored) = state.db.password_hash(&req.username)? else {
        return Err(bad_credentials());
    };

    let parsed_hash = PasswordHash::new(&stored)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash unreadable: {}", e)))?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(bad_credentials());
    }

    state.db.update_login_timestamp(&req.username)?;

    let token = create_token(&state.jwt_secret, &req.username)?;

    Ok(Json(TokenResponse { token }))
}

pub(crate) fn create_token(secret: &str, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
