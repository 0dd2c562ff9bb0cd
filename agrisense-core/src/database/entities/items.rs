use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marketplace or rental listing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_id: i32,
    pub item_type: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub per_unit: Option<String>,
    pub operator_available: bool,
    pub availability_start: Option<ChronoDate>,
    pub availability_end: Option<ChronoDate>,
    /// JSON array of `"HH:MM-HH:MM"` strings.
    pub time_slots_json: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn time_slots(&self) -> Vec<String> {
        self.time_slots_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn kind(&self) -> Option<ItemType> {
        self.item_type.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::bookings::Entity")]
    Bookings,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Marketplace,
    Rental,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Marketplace => "marketplace",
            ItemType::Rental => "rental",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "marketplace" => Ok(ItemType::Marketplace),
            "rental" => Ok(ItemType::Rental),
            _ => Err(format!("Invalid item type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerUnit {
    Hour,
    Acre,
    Day,
}

impl PerUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerUnit::Hour => "hour",
            PerUnit::Acre => "acre",
            PerUnit::Day => "day",
        }
    }
}

impl FromStr for PerUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(PerUnit::Hour),
            "acre" => Ok(PerUnit::Acre),
            "day" => Ok(PerUnit::Day),
            _ => Err(format!("Invalid pricing unit: {}", s)),
        }
    }
}
