use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use agrisense::database::entities::users;
use agrisense::errors::{AuthError, CoreError};

use super::app::AppState;
use super::error::ApiError;

/// Token from `Authorization: Token <key>` or `Authorization: Bearer <key>`.
pub fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    (scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer")).then_some(key)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<users::Model>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let key = header
        .to_str()
        .ok()
        .and_then(token_from_header)
        .ok_or(AuthError::InvalidToken)?;
    Ok(Some(state.auth.authenticate(key).await?))
}

/// Caller authenticated by token; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub users::Model);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(AuthUser)
            .ok_or_else(|| AuthError::AuthenticationRequired.into())
    }
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.0.id
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff {
            Ok(())
        } else {
            Err(CoreError::forbidden("Admin access required").into())
        }
    }
}

/// Caller if a token was sent. A token that is sent but unknown still gets 401.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<users::Model>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuthUser(resolve(parts, state).await?))
    }
}
