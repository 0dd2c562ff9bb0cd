use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Logged prediction from the crop recommender.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crop_recommendations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub n_content: f64,
    pub p_content: f64,
    pub k_content: f64,
    pub ph: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub predicted_crop: String,
    pub confidence_score: f64,
    pub alternative_crops_json: String,
    pub model_version: String,
    pub created_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn alternative_crops(&self) -> Vec<String> {
        serde_json::from_str(&self.alternative_crops_json).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
