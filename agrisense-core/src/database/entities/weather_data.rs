use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Weather snapshot fetched for a user; reused while younger than an hour.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "weather_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub weather_description: String,
    pub fetched_at: ChronoDateTimeUtc,
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
    #[sea_orm(has_many = "super::weather_alerts::Entity")]
    WeatherAlerts,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::weather_alerts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeatherAlerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
