use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;

use crate::database::entities::user_profiles::{self, PreferredLanguage};
use crate::errors::{CoreError, CoreResult};

/// Body of `PUT /profile/`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Trim, lower-case and de-duplicate crop names, keeping first-seen order.
pub fn normalize_crops(crops: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for crop in crops {
        let crop = crop.trim().to_lowercase();
        if !crop.is_empty() && !normalized.contains(&crop) {
            normalized.push(crop);
        }
    }
    normalized
}

#[derive(Clone)]
pub struct ProfileService {
    db: DatabaseConnection,
}

impl ProfileService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: i32) -> CoreResult<Option<user_profiles::Model>> {
        user_profiles::Entity::find()
            .filter(user_profiles::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load profile").with_source(e))
    }

    /// Create the profile on first call, update it afterwards
    pub async fn upsert(
        &self,
        user_id: i32,
        update: ProfileUpdate,
    ) -> CoreResult<user_profiles::Model> {
        let name = update.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::validation("Name is required").with_field("field", "name"));
        }

        let language = match update.preferred_language.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse::<PreferredLanguage>()
                .map_err(|_| {
                    CoreError::validation(
                        "preferred_language must be one of English, Hindi, Marathi",
                    )
                    .with_field("field", "preferred_language")
                })?,
            _ => PreferredLanguage::default(),
        };

        if let Some(latitude) = update.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(CoreError::validation("Latitude must be between -90 and 90"));
            }
        }
        if let Some(longitude) = update.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(CoreError::validation("Longitude must be between -180 and 180"));
            }
        }

        let crops = normalize_crops(&update.crops).join(",");
        let now = chrono::Utc::now();

        let mut active: user_profiles::ActiveModel = match self.get(user_id).await? {
            Some(existing) => existing.into(),
            None => user_profiles::ActiveModel {
                user_id: Set(user_id),
                created_at: Set(now),
                ..Default::default()
            },
        };
        active.name = Set(name);
        active.phone = Set(update.phone.trim().to_string());
        active.city = Set(update.city.trim().to_string());
        active.address = Set(update.address.trim().to_string());
        active.preferred_language = Set(language.as_str().to_string());
        active.crops = Set(crops);
        active.latitude = Set(update.latitude);
        active.longitude = Set(update.longitude);
        active.updated_at = Set(now);

        active
            .save(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to save profile").with_source(e))?;

        self.get(user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Profile", user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::setup_test_db;
    use crate::services::AuthService;

    #[test]
    fn test_normalize_crops() {
        let crops = vec![
            " Rice".to_string(),
            "rice".to_string(),
            "".to_string(),
            "WHEAT ".to_string(),
        ];
        assert_eq!(normalize_crops(&crops), vec!["rice", "wheat"]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_profile() {
        let db = setup_test_db().await.unwrap();
        let (user, _) = AuthService::new(db.clone())
            .register("ravi", "ravi@example.com", "kharif-season")
            .await
            .unwrap();
        let service = ProfileService::new(db);

        assert!(service.get(user.id).await.unwrap().is_none());

        let created = service
            .upsert(
                user.id,
                ProfileUpdate {
                    name: "Ravi".into(),
                    preferred_language: Some("Marathi".into()),
                    crops: vec!["Tomato".into(), "rice".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.crops_list(), vec!["tomato", "rice"]);
        assert_eq!(created.preferred_language, "Marathi");

        let updated = service
            .upsert(
                user.id,
                ProfileUpdate {
                    name: "Ravi K".into(),
                    city: "Nashik".into(),
                    latitude: Some(19.99),
                    longitude: Some(73.79),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.preferred_language, "English");
        assert_eq!(updated.coordinates(), Some((19.99, 73.79)));
    }

    #[tokio::test]
    async fn test_rejects_unknown_language() {
        let db = setup_test_db().await.unwrap();
        let service = ProfileService::new(db);
        let err = service
            .upsert(
                1,
                ProfileUpdate {
                    name: "X".into(),
                    preferred_language: Some("Tamil".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }
}
