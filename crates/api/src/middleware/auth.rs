//! Auth middleware for bearer-token verification.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use hifz_backend_domain::{Claims, DomainError, User, fallback_email};

use crate::AppState;

/// Extract and verify the identity from the Authorization header.
pub fn auth_middleware(
    headers: &HeaderMap,
    jwt_secret: &str,
) -> Result<(Uuid, Option<String>), StatusCode> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let user_id = token_data
        .claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok((user_id, token_data.claims.email))
}

/// Axum extractor that validates the bearer token and provides the
/// authenticated user row.
///
/// The first authenticated request provisions the user: find-or-create by
/// token identity, with a fallback email when the provider supplies none.
/// Handlers that declare `AuthUser` as a parameter are automatically
/// protected.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = DomainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (user_id, email) = auth_middleware(&parts.headers, &state.config.jwt_secret)
            .map_err(|_| DomainError::Unauthorized("Invalid or missing token".to_string()))?;

        let email = email.unwrap_or_else(|| fallback_email(user_id));
        let user = state
            .user_repo
            .find_or_create(user_id, &email)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        Ok(AuthUser(user))
    }
}
