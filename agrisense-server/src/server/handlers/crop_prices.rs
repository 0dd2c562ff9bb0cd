use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::{json, Value};

use agrisense::services::{PriceQuery, PriceQuote, STATES};

use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::JsonBody;

fn required(params: &HashMap<String, String>, name: &str) -> ApiResult<String> {
    params
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(format!("{} parameter is required", name)))
}

pub async fn get_price(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<PriceQuote>> {
    let query = PriceQuery {
        crop_name: required(&params, "crop_name")?,
        state: required(&params, "state")?,
        district: required(&params, "district")?,
    };
    Ok(Json(state.prices.quote(&query).await?))
}

pub async fn list_crops(State(state): State<AppState>) -> Json<Value> {
    let (crops, cached) = state.prices.commodities().await;
    Json(json!({ "crops": crops, "cached": cached }))
}

pub async fn list_states() -> Json<Value> {
    Json(json!({ "states": STATES }))
}

pub async fn bulk_prices(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let queries = body
        .get("queries")
        .and_then(Value::as_array)
        .filter(|queries| !queries.is_empty())
        .ok_or_else(|| ApiError::bad_request("queries list is required in request body"))?;
    let results = state.prices.bulk(queries).await;
    Ok(Json(json!({ "results": results })))
}
