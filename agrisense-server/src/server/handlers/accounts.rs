use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use agrisense::database::entities::user_profiles;
use agrisense::services::ProfileUpdate;
use agrisense::{CoreError, CoreErrorKind};

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::ApiResult;
use crate::server::extract::JsonBody;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let (user, token) = state
        .auth
        .register(&payload.username, &payload.email, &payload.password)
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(Json(json!({ "token": token, "username": user.username })))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (user, token) = state.auth.login(&payload.username, &payload.password).await?;
    Ok(Json(json!({ "token": token, "username": user.username })))
}

fn profile_body(profile: user_profiles::Model, username: &str) -> ApiResult<Json<Value>> {
    let crops = profile.crops_list();
    let mut body = serde_json::to_value(&profile)
        .map_err(|e| CoreError::internal("Failed to encode profile").with_source(e))?;
    body["crops"] = json!(crops);
    body["username"] = json!(username);
    Ok(Json(body))
}

pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let profile = state
        .profiles
        .get(user.id())
        .await?
        .ok_or_else(|| CoreError::new(CoreErrorKind::NotFound, "Profile not found"))?;
    profile_body(profile, &user.0.username)
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let profile = state.profiles.upsert(user.id(), payload).await?;
    profile_body(profile, &user.0.username)
}
