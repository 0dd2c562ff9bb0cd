use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "weather_alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub weather_data_id: Option<i32>,
    pub disease_name: String,
    pub crop_name: String,
    pub alert_message: String,
    pub is_read: bool,
    pub created_at: ChronoDateTimeUtc,
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
    #[sea_orm(
        belongs_to = "super::weather_data::Entity",
        from = "Column::WeatherDataId",
        to = "super::weather_data::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    WeatherData,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::weather_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeatherData.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
