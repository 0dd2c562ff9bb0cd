//! Crop recommendation: tree-ensemble evaluation plus agronomic advice.

pub mod analysis;
pub mod catalog;
pub mod features;
pub mod model;

use std::collections::BTreeMap;

use serde::Serialize;

pub use analysis::{NutrientAdvice, NutrientAnalysis, NutrientStatus, SoilAssessment};
pub use catalog::{CropCatalog, CropInfo};
pub use features::{FieldConditions, FEATURE_COUNT, FEATURE_NAMES};
pub use model::{ClassProbability, CropModel, ModelMetadata};

use crate::errors::{CoreError, CoreResult};

/// Number of runner-up crops reported next to the prediction.
pub const ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub version: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropInformation {
    pub ideal_temperature: String,
    pub ideal_rainfall: String,
    pub expected_yield: String,
    pub growing_season: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldPrediction {
    pub expected_yield_range: String,
    pub predicted_yield_index: f64,
    pub note: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsedFeatures {
    #[serde(flatten)]
    pub conditions: FieldConditions,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub predicted_crop: String,
    pub confidence_score: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub alternative_crops: Vec<String>,
    pub crop_information: CropInformation,
    pub reason: String,
    pub farming_suggestion: String,
    pub detailed_explanation: String,
    pub yield_prediction: YieldPrediction,
    pub nutrient_analysis: NutrientAnalysis,
    pub soil_assessment: SoilAssessment,
    pub used_features: UsedFeatures,
    pub model_info: ModelSummary,
}

pub struct Recommender {
    model: CropModel,
    catalog: CropCatalog,
}

impl Recommender {
    pub fn new(model: CropModel, catalog: CropCatalog) -> Self {
        Self { model, catalog }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.model.metadata
    }

    pub fn catalog(&self) -> &CropCatalog {
        &self.catalog
    }

    pub fn recommend(
        &self,
        conditions: FieldConditions,
        latitude: f64,
        longitude: f64,
    ) -> CoreResult<Recommendation> {
        let ranked = self.model.predict(&conditions)?;
        let best = ranked
            .first()
            .ok_or_else(|| CoreError::internal("Crop model produced no classes"))?;

        let info = self.catalog.get_or_unavailable(&best.crop);
        let detailed_explanation = format!(
            "The AI model predicted **{}** with {:.1}% confidence because your current conditions \
             (Temperature: {:.1}°C, Humidity: {:.1}%, Rainfall: {:.1}mm, pH: {}) closely match the \
             ideal growing environment of {} temperature and {} rainfall. {}",
            best.crop,
            best.probability * 100.0,
            conditions.temperature,
            conditions.humidity,
            conditions.rainfall,
            conditions.ph,
            info.ideal_temp,
            info.ideal_rainfall,
            info.reason
        );

        tracing::info!(
            crop = %best.crop,
            confidence = best.probability,
            model = %self.model.metadata.model_name,
            "Crop recommendation computed"
        );

        Ok(Recommendation {
            predicted_crop: best.crop.clone(),
            confidence_score: best.probability,
            probabilities: ranked
                .iter()
                .map(|class| (class.crop.clone(), class.probability))
                .collect(),
            alternative_crops: ranked
                .iter()
                .skip(1)
                .take(ALTERNATIVES)
                .map(|class| class.crop.clone())
                .collect(),
            crop_information: CropInformation {
                ideal_temperature: info.ideal_temp.clone(),
                ideal_rainfall: info.ideal_rainfall.clone(),
                expected_yield: info.expected_yield.clone(),
                growing_season: info.season.clone(),
                duration: info.duration.clone(),
            },
            reason: info.reason.clone(),
            farming_suggestion: info.suggestion.clone(),
            detailed_explanation,
            yield_prediction: YieldPrediction {
                expected_yield_range: info.expected_yield.clone(),
                predicted_yield_index: analysis::yield_index(&conditions),
                note: "Yield index is a synthetic estimate based on soil nutrients and weather",
            },
            nutrient_analysis: NutrientAnalysis::of(&conditions),
            soil_assessment: SoilAssessment::of(&conditions),
            used_features: UsedFeatures {
                conditions,
                latitude,
                longitude,
            },
            model_info: ModelSummary {
                model_name: self.model.metadata.model_name.clone(),
                version: self.model.metadata.version.clone(),
                accuracy: self.model.metadata.accuracy,
            },
        })
    }
}
