use axum::{
    Extension,
    extract::{Path, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use courier_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header, then attach
/// the decoded claims to the request for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid bearer token".into()))?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Layered inside `require_auth` on `/users/{username}` routes: the
/// authenticated identity must match the path parameter.
pub async fn require_self(
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if claims.username != username {
        return Err(ApiError::Unauthorized("wrong user for this resource".into()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    use courier_types::api::Claims;

    use crate::auth::create_token;

    #[test]
    fn token_roundtrip() {
        let token = create_token("test-secret", "alice").unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.username, "alice");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_token("test-secret", "alice").unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        let result = decode::<Claims>(
            "not.a.token",
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
