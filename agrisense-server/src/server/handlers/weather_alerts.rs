use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::ApiResult;

pub async fn list_alerts(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let listed = state.alerts.list(user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "count": listed.count,
        "unread_count": listed.unread_count,
        "alerts": listed.alerts,
    })))
}

pub async fn active_alerts(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let alerts = state.alerts.active(user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<Value>> {
    state.alerts.mark_read(user.id(), id).await?;
    Ok(Json(json!({ "success": true, "message": "Alert marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let count = state.alerts.mark_all_read(user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Marked {} alerts as read", count),
    })))
}

pub async fn refresh(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let count = state.alerts.generate_alerts_for_user(user.id(), true).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Generated {} new alerts", count),
        "alerts_count": count,
    })))
}

pub async fn current_weather(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let weather = state.alerts.latest_weather(user.id()).await?;
    Ok(Json(json!({ "success": true, "weather": weather })))
}

/// Staff only: regenerate alerts for every user with crops.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    user.require_staff()?;
    let force_refresh = body
        .and_then(|Json(body)| body.get("force_refresh").and_then(Value::as_bool))
        .unwrap_or(false);
    let stats = state.alerts.generate_alerts_for_all_users(force_refresh).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Alert generation completed",
        "stats": stats,
    })))
}
