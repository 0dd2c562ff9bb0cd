use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use agrisense::database::entities::bookings;
use agrisense::services::{BookingAction, BookingInput, BookingRole};

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::ApiResult;
use crate::server::extract::JsonBody;

#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    #[serde(default)]
    pub role: BookingRole,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: BookingAction,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Vec<bookings::Model>>> {
    Ok(Json(state.bookings.list(user.id(), query.role).await?))
}

pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(payload): JsonBody<BookingInput>,
) -> ApiResult<(StatusCode, Json<bookings::Model>)> {
    let booking = state.bookings.create(user.id(), payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn respond(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    JsonBody(payload): JsonBody<RespondRequest>,
) -> ApiResult<Json<bookings::Model>> {
    Ok(Json(
        state.bookings.respond(user.id(), id, payload.action).await?,
    ))
}
