use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Offline training metrics recorded when a model artifact is registered.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "model_performance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub model_name: String,
    pub version: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub test_samples: i32,
    pub training_date: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
