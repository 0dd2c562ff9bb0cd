use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    pub name: String,
    pub phone: String,
    pub city: String,
    pub address: String,
    pub preferred_language: String,
    /// Comma separated, lower-cased crop names.
    pub crops: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn crops_list(&self) -> Vec<String> {
        self.crops
            .split(',')
            .map(str::trim)
            .filter(|crop| !crop.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PreferredLanguage {
    #[default]
    English,
    Hindi,
    Marathi,
}

impl PreferredLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferredLanguage::English => "English",
            PreferredLanguage::Hindi => "Hindi",
            PreferredLanguage::Marathi => "Marathi",
        }
    }
}

impl fmt::Display for PreferredLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferredLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(PreferredLanguage::English),
            "hindi" | "hi" => Ok(PreferredLanguage::Hindi),
            "marathi" | "mr" => Ok(PreferredLanguage::Marathi),
            other => Err(format!("Unsupported language: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parsing_accepts_codes_and_names() {
        assert_eq!("Hindi".parse(), Ok(PreferredLanguage::Hindi));
        assert_eq!("mr".parse(), Ok(PreferredLanguage::Marathi));
        assert!("Tamil".parse::<PreferredLanguage>().is_err());
    }
}
