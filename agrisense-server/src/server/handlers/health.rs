use axum::{extract::State, response::Json};
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};

use crate::server::app::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db.execute_unprepared("SELECT 1").await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unavailable"
        }
    };
    Json(json!({
        "status": "healthy",
        "service": "agrisense-server",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "crop_model_loaded": state.recommendations.is_model_loaded(),
    }))
}
