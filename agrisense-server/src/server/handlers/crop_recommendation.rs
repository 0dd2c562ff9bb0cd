use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde_json::{json, Value};

use agrisense::services::SoilSample;

use crate::server::app::AppState;
use crate::server::auth::AuthUser;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::JsonBody;

pub async fn recommend(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let sample = SoilSample::from_json(&body)?;
    let (recommendation, recommendation_id) =
        state.recommendations.recommend(user.id(), sample).await?;
    tracing::info!(
        user_id = user.id(),
        crop = %recommendation.predicted_crop,
        confidence = recommendation.confidence_score,
        "Crop recommended"
    );
    Ok(Json(json!({
        "success": true,
        "input_features": recommendation.used_features,
        "recommendation": recommendation,
        "recommendation_id": recommendation_id,
    })))
}

pub async fn history(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let recommendations = state.recommendations.history(user.id()).await?;
    Ok(Json(json!({ "success": true, "recommendations": recommendations })))
}

pub async fn model_info(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let info = state.recommendations.model_info().await?;
    Ok(Json(json!({ "success": true, "model_info": info })))
}

pub async fn weather(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let coordinate = |name: &str| params.get(name).and_then(|raw| raw.trim().parse::<f64>().ok());
    let (Some(latitude), Some(longitude)) = (coordinate("lat"), coordinate("lon")) else {
        return Err(ApiError::bad_request("Latitude and longitude are required"));
    };
    let weather = state.recommendations.weather(latitude, longitude).await;
    Ok(Json(json!({ "success": true, "weather": weather })))
}

pub async fn crop_info(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let crop = params
        .get("crop")
        .map(|crop| crop.trim())
        .filter(|crop| !crop.is_empty())
        .ok_or_else(|| ApiError::bad_request("crop parameter is required"))?;
    let info = state.recommendations.crop_info(crop)?;
    Ok(Json(json!({ "success": true, "crop_info": info })))
}
