use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use serde_json::Value;

use crate::clients::{WeatherAverages, WeatherProvider};
use crate::database::entities::{crop_recommendations, model_performance, user_profiles};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::recommendation::{
    CropCatalog, CropInfo, CropModel, FieldConditions, ModelMetadata, Recommendation, Recommender,
};
use crate::weather::DEFAULT_COORDINATES;

const REQUIRED_FIELDS: [&str; 4] = ["n_content", "p_content", "k_content", "ph"];
const PERFORMANCE_ROWS: u64 = 5;

/// Soil measurements posted to `/api/crop/recommend/`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilSample {
    pub n_content: f64,
    pub p_content: f64,
    pub k_content: f64,
    pub ph: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl SoilSample {
    /// Parse and range-check a request body. Numbers may arrive as strings.
    pub fn from_json(body: &Value) -> CoreResult<Self> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| body.get(*field).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|field| format!("'{}'", field)).collect();
            return Err(CoreError::validation(format!(
                "Missing required fields: [{}]",
                listed.join(", ")
            )));
        }

        let read = |field: &str| -> CoreResult<f64> {
            body.get(field)
                .and_then(number)
                .filter(|value| value.is_finite())
                .ok_or_else(|| {
                    CoreError::validation(format!("{} must be a number", field))
                        .with_field("field", field)
                })
        };
        let optional = |field: &str| body.get(field).and_then(number);

        let sample = Self {
            n_content: read("n_content")?,
            p_content: read("p_content")?,
            k_content: read("k_content")?,
            ph: read("ph")?,
            latitude: optional("latitude"),
            longitude: optional("longitude"),
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> CoreResult<()> {
        for (label, value) in [
            ("N", self.n_content),
            ("P", self.p_content),
            ("K", self.k_content),
        ] {
            if !(0.0..=200.0).contains(&value) {
                return Err(CoreError::validation(format!(
                    "{} content must be between 0 and 200",
                    label
                )));
            }
        }
        if !(0.0..=14.0).contains(&self.ph) {
            return Err(CoreError::validation("pH must be between 0 and 14"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub metadata: ModelMetadata,
    pub performance: Vec<model_performance::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: crop_recommendations::Model,
    pub alternative_crops: Vec<String>,
}

/// Crop recommendations, their history and model metadata
pub struct RecommendationService {
    db: DatabaseConnection,
    recommender: Option<Recommender>,
    catalog: CropCatalog,
    weather: Arc<dyn WeatherProvider>,
}

impl RecommendationService {
    pub fn new(
        db: DatabaseConnection,
        model: Option<CropModel>,
        catalog: CropCatalog,
        weather: Arc<dyn WeatherProvider>,
    ) -> Self {
        Self {
            db,
            recommender: model.map(|model| Recommender::new(model, catalog.clone())),
            catalog,
            weather,
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.recommender.is_some()
    }

    async fn coordinates(&self, user_id: i32, sample: &SoilSample) -> CoreResult<(f64, f64)> {
        if let (Some(latitude), Some(longitude)) = (sample.latitude, sample.longitude) {
            return Ok((latitude, longitude));
        }
        let profile = user_profiles::Entity::find()
            .filter(user_profiles::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load profile").with_source(e))?;
        Ok(profile
            .and_then(|profile| profile.coordinates())
            .unwrap_or(DEFAULT_COORDINATES))
    }

    /// Predict, log the prediction and return it with its record id
    pub async fn recommend(
        &self,
        user_id: i32,
        sample: SoilSample,
    ) -> CoreResult<(Recommendation, i32)> {
        sample.validate()?;
        let recommender = self.recommender.as_ref().ok_or_else(|| {
            CoreError::unavailable("Model not loaded. Please train the model first.")
        })?;

        let (latitude, longitude) = self.coordinates(user_id, &sample).await?;
        let weather = self.weather.forecast_average(latitude, longitude).await;
        let conditions = FieldConditions {
            n: sample.n_content,
            p: sample.p_content,
            k: sample.k_content,
            ph: sample.ph,
            temperature: weather.temperature,
            humidity: weather.humidity,
            rainfall: weather.rainfall,
        };

        let recommendation = recommender.recommend(conditions, latitude, longitude)?;
        let alternative_crops_json = serde_json::to_string(&recommendation.alternative_crops)
            .map_err(|e| CoreError::internal("Failed to encode alternatives").with_source(e))?;

        let record = crop_recommendations::ActiveModel {
            user_id: Set(Some(user_id)),
            n_content: Set(sample.n_content),
            p_content: Set(sample.p_content),
            k_content: Set(sample.k_content),
            ph: Set(sample.ph),
            temperature: Set(weather.temperature),
            humidity: Set(weather.humidity),
            rainfall: Set(weather.rainfall),
            latitude: Set(Some(latitude)),
            longitude: Set(Some(longitude)),
            predicted_crop: Set(recommendation.predicted_crop.clone()),
            confidence_score: Set(recommendation.confidence_score),
            alternative_crops_json: Set(alternative_crops_json),
            model_version: Set(recommender.metadata().version.clone()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::internal("Failed to save recommendation").with_source(e))?;

        Ok((recommendation, record.id))
    }

    pub async fn history(&self, user_id: i32) -> CoreResult<Vec<HistoryEntry>> {
        let records = crop_recommendations::Entity::find()
            .filter(crop_recommendations::Column::UserId.eq(user_id))
            .order_by_desc(crop_recommendations::Column::CreatedAt)
            .order_by_desc(crop_recommendations::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load recommendations").with_source(e))?;
        Ok(records
            .into_iter()
            .map(|record| HistoryEntry {
                alternative_crops: record.alternative_crops(),
                record,
            })
            .collect())
    }

    pub async fn model_info(&self) -> CoreResult<ModelInfo> {
        let recommender = self
            .recommender
            .as_ref()
            .ok_or_else(|| CoreError::new(CoreErrorKind::NotFound, "Model not found"))?;
        let metadata = recommender.metadata().clone();
        let performance = model_performance::Entity::find()
            .filter(model_performance::Column::ModelName.eq(metadata.model_name.as_str()))
            .order_by_desc(model_performance::Column::TrainingDate)
            .limit(PERFORMANCE_ROWS)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load model performance").with_source(e))?;
        Ok(ModelInfo {
            metadata,
            performance,
        })
    }

    pub async fn weather(&self, latitude: f64, longitude: f64) -> WeatherAverages {
        self.weather.forecast_average(latitude, longitude).await
    }

    pub fn crop_info(&self, crop: &str) -> CoreResult<CropInfo> {
        self.catalog
            .get(crop)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Crop", crop.to_string()))
    }
}

/// Record an artifact's offline metrics. Missing precision/recall/F1 fall back
/// to the accuracy figure.
pub async fn register_model(
    db: &DatabaseConnection,
    model: &CropModel,
) -> CoreResult<model_performance::Model> {
    let metadata = &model.metadata;
    let record = model_performance::ActiveModel {
        model_name: Set(metadata.model_name.clone()),
        version: Set(metadata.version.clone()),
        accuracy: Set(metadata.accuracy),
        precision: Set(metadata.precision.unwrap_or(metadata.accuracy)),
        recall: Set(metadata.recall.unwrap_or(metadata.accuracy)),
        f1_score: Set(metadata.f1_score.unwrap_or(metadata.accuracy)),
        test_samples: Set(metadata.test_samples.unwrap_or(0)),
        training_date: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| CoreError::internal("Failed to record model performance").with_source(e))?;

    tracing::info!(
        model = %record.model_name,
        version = %record.version,
        accuracy = record.accuracy,
        "Registered crop model"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CurrentWeather;
    use crate::database::test_utils::setup_test_db;
    use crate::recommendation::model::tests::rainfall_model;
    use crate::services::AuthService;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedWeather {
        averages: WeatherAverages,
        asked: Mutex<Vec<(f64, f64)>>,
    }

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current(&self, _latitude: f64, _longitude: f64) -> CurrentWeather {
            CurrentWeather::unknown()
        }

        async fn forecast_average(&self, latitude: f64, longitude: f64) -> WeatherAverages {
            self.asked.lock().unwrap().push((latitude, longitude));
            self.averages
        }
    }

    fn wet_weather() -> Arc<FixedWeather> {
        Arc::new(FixedWeather {
            averages: WeatherAverages {
                temperature: 27.0,
                humidity: 85.0,
                rainfall: 11.0,
            },
            asked: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let err = SoilSample::from_json(&json!({"n_content": 10, "ph": null})).unwrap_err();
        assert_eq!(
            err.message(),
            "Missing required fields: ['p_content', 'k_content', 'ph']"
        );
    }

    #[test]
    fn test_ranges() {
        let err = SoilSample::from_json(&json!({
            "n_content": 10, "p_content": 250, "k_content": 10, "ph": 6.5
        }))
        .unwrap_err();
        assert_eq!(err.message(), "P content must be between 0 and 200");

        let err = SoilSample::from_json(&json!({
            "n_content": 10, "p_content": 10, "k_content": 10, "ph": "14.5"
        }))
        .unwrap_err();
        assert_eq!(err.message(), "pH must be between 0 and 14");

        let sample = SoilSample::from_json(&json!({
            "n_content": "90", "p_content": 42, "k_content": 43, "ph": 6.5, "latitude": 19.0
        }))
        .unwrap();
        assert_eq!(sample.n_content, 90.0);
        assert_eq!(sample.longitude, None);
    }

    #[tokio::test]
    async fn test_recommend_without_model_is_unavailable() {
        let db = setup_test_db().await.unwrap();
        let service =
            RecommendationService::new(db, None, CropCatalog::builtin().unwrap(), wet_weather());
        let sample = SoilSample::from_json(&json!({
            "n_content": 90, "p_content": 42, "k_content": 43, "ph": 6.5
        }))
        .unwrap();
        let err = service.recommend(1, sample).await.unwrap_err();
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(service.model_info().await.unwrap_err().http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_recommend_logs_history_and_uses_default_location() {
        let db = setup_test_db().await.unwrap();
        let (user, _) = AuthService::new(db.clone())
            .register("anil", "anil@example.com", "password123")
            .await
            .unwrap();
        let weather = wet_weather();
        let service = RecommendationService::new(
            db.clone(),
            Some(rainfall_model()),
            CropCatalog::builtin().unwrap(),
            weather.clone(),
        );

        let sample = SoilSample::from_json(&json!({
            "n_content": 90, "p_content": 42, "k_content": 43, "ph": 6.5
        }))
        .unwrap();
        let (recommendation, id) = service.recommend(user.id, sample).await.unwrap();
        assert_eq!(recommendation.predicted_crop, "rice");
        assert_eq!(weather.asked.lock().unwrap()[0], DEFAULT_COORDINATES);

        let history = service.history(user.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.id, id);
        assert_eq!(history[0].record.rainfall, 11.0);
        assert_eq!(history[0].alternative_crops, vec!["chickpea"]);

        register_model(&db, &rainfall_model()).await.unwrap();
        let info = service.model_info().await.unwrap();
        assert_eq!(info.performance.len(), 1);
        assert_eq!(info.performance[0].precision, 0.97);
    }

    #[tokio::test]
    async fn test_crop_info_lookup() {
        let db = setup_test_db().await.unwrap();
        let service =
            RecommendationService::new(db, None, CropCatalog::builtin().unwrap(), wet_weather());
        assert_eq!(service.crop_info("Maize").unwrap().crop, "maize");
        assert_eq!(service.crop_info("kiwi").unwrap_err().http_status_code(), 404);
    }
}
