use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;

use agrisense::database::entities::chat_sessions;
use agrisense::services::{MessageView, SessionDetail, SessionSummary};

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::ApiResult;
use crate::server::extract::JsonBody;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_is_user")]
    pub is_user: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_is_user() -> bool {
    true
}

pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    Ok(Json(state.chats.list_sessions(user.id()).await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<chat_sessions::Model>)> {
    let session = state
        .chats
        .create_session(user.id(), &payload.crop, payload.title)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<SessionDetail>> {
    Ok(Json(state.chats.get_detail(user.id(), id).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.chats.delete_session(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<AddMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageView>)> {
    let message = state
        .chats
        .add_message(user.id(), id, payload.text, payload.is_user, payload.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(message.into())))
}
