use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde_json::{json, Value};

use agrisense::services::{ItemInput, ItemView};

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::JsonBody;

pub async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<ItemView>>> {
    let items = state
        .items
        .list(params.get("item_type").map(String::as_str))
        .await?;
    Ok(Json(items.into_iter().map(ItemView::from).collect()))
}

pub async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<ItemInput>,
) -> ApiResult<(StatusCode, Json<ItemView>)> {
    let item = state.items.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<ItemView>> {
    Ok(Json(state.items.get(id).await?.into()))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<ItemInput>,
) -> ApiResult<Json<ItemView>> {
    Ok(Json(state.items.update(user.id(), id, payload).await?.into()))
}

pub async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.items.delete(user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn item_slots(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let raw = params
        .get("date")
        .map(|date| date.trim())
        .filter(|date| !date.is_empty())
        .ok_or_else(|| ApiError::bad_request("date is required"))?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("Invalid date format. Use YYYY-MM-DD"))?;

    let slots = state.items.slots(id, date).await?;
    Ok(Json(json!({
        "item_id": id,
        "date": date.format("%Y-%m-%d").to_string(),
        "slots": slots,
    })))
}
