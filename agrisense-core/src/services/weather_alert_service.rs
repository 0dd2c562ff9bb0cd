use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;

use crate::clients::WeatherProvider;
use crate::database::entities::{user_profiles, weather_alerts, weather_data};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::weather::{RiskRules, WeatherReading, DEFAULT_COORDINATES};

/// Snapshots younger than this are reused instead of calling the provider.
const SNAPSHOT_MAX_AGE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    pub id: i32,
    pub disease_name: String,
    pub crop_name: String,
    pub alert_message: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<Utc>,
    pub weather_data: Option<weather_data::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    pub count: usize,
    pub unread_count: usize,
    pub alerts: Vec<AlertView>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationStats {
    pub total_users: usize,
    pub users_processed: usize,
    pub total_alerts: usize,
}

pub struct WeatherAlertService {
    db: DatabaseConnection,
    weather: Arc<dyn WeatherProvider>,
    rules: RiskRules,
}

impl WeatherAlertService {
    pub fn new(db: DatabaseConnection, weather: Arc<dyn WeatherProvider>, rules: RiskRules) -> Self {
        Self { db, weather, rules }
    }

    async fn profile(&self, user_id: i32) -> CoreResult<Option<user_profiles::Model>> {
        user_profiles::Entity::find()
            .filter(user_profiles::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load profile").with_source(e))
    }

    /// Latest snapshot for the user, refreshed from the provider when stale,
    /// missing or when `force_refresh` is set.
    async fn snapshot(
        &self,
        user_id: i32,
        profile: &user_profiles::Model,
        force_refresh: bool,
    ) -> CoreResult<weather_data::Model> {
        if !force_refresh {
            let cutoff = Utc::now() - Duration::minutes(SNAPSHOT_MAX_AGE_MINUTES);
            let recent = weather_data::Entity::find()
                .filter(weather_data::Column::UserId.eq(user_id))
                .filter(weather_data::Column::FetchedAt.gte(cutoff))
                .order_by_desc(weather_data::Column::FetchedAt)
                .one(&self.db)
                .await
                .map_err(|e| CoreError::internal("Failed to load weather data").with_source(e))?;
            if let Some(recent) = recent {
                tracing::debug!(user_id, snapshot = recent.id, "Reusing recent weather snapshot");
                return Ok(recent);
            }
        }

        let (latitude, longitude) = profile.coordinates().unwrap_or(DEFAULT_COORDINATES);
        let current = self.weather.current(latitude, longitude).await;
        weather_data::ActiveModel {
            user_id: Set(user_id),
            latitude: Set(latitude),
            longitude: Set(longitude),
            temperature: Set(current.temperature),
            humidity: Set(current.humidity),
            rainfall: Set(current.rainfall),
            weather_description: Set(current.description),
            fetched_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| CoreError::internal("Failed to save weather data").with_source(e))
    }

    /// Replace today's alerts for the user with the rules that fire now.
    /// Users without a profile or without crops get no alerts.
    pub async fn generate_alerts_for_user(
        &self,
        user_id: i32,
        force_refresh: bool,
    ) -> CoreResult<usize> {
        let Some(profile) = self.profile(user_id).await? else {
            tracing::warn!(user_id, "User has no profile, skipping alerts");
            return Ok(0);
        };
        let crops = profile.crops_list();
        if crops.is_empty() {
            tracing::info!(user_id, "User has no crops configured, skipping alerts");
            return Ok(0);
        }

        let snapshot = self.snapshot(user_id, &profile, force_refresh).await?;
        let reading = WeatherReading {
            temperature: snapshot.temperature,
            humidity: snapshot.humidity,
            rainfall: snapshot.rainfall,
        };
        let fired = self.rules.evaluate(&reading, &crops);

        let start_of_day = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| CoreError::internal("Invalid start of day"))?;
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to start transaction").with_source(e))?;
        weather_alerts::Entity::delete_many()
            .filter(weather_alerts::Column::UserId.eq(user_id))
            .filter(weather_alerts::Column::CreatedAt.gte(start_of_day))
            .exec(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to clear alerts").with_source(e))?;

        for alert in &fired {
            weather_alerts::ActiveModel {
                user_id: Set(user_id),
                weather_data_id: Set(Some(snapshot.id)),
                disease_name: Set(alert.disease_name.clone()),
                crop_name: Set(alert.crop_name.clone()),
                alert_message: Set(alert.alert_message.clone()),
                is_read: Set(false),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to save alert").with_source(e))?;
        }
        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit alerts").with_source(e))?;

        tracing::info!(user_id, alerts = fired.len(), "Generated weather alerts");
        Ok(fired.len())
    }

    /// Run generation for every user whose profile lists crops. A failure for
    /// one user is logged and does not stop the run.
    pub async fn generate_alerts_for_all_users(
        &self,
        force_refresh: bool,
    ) -> CoreResult<GenerationStats> {
        let profiles = user_profiles::Entity::find()
            .filter(user_profiles::Column::Crops.ne(""))
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load profiles").with_source(e))?;

        let mut stats = GenerationStats {
            total_users: profiles.len(),
            ..Default::default()
        };
        for profile in profiles {
            match self
                .generate_alerts_for_user(profile.user_id, force_refresh)
                .await
            {
                Ok(count) => {
                    stats.users_processed += 1;
                    stats.total_alerts += count;
                }
                Err(e) => {
                    tracing::error!(user_id = profile.user_id, error = %e, "Alert generation failed");
                }
            }
        }

        tracing::info!(
            total_users = stats.total_users,
            users_processed = stats.users_processed,
            total_alerts = stats.total_alerts,
            "Alert generation complete"
        );
        Ok(stats)
    }

    async fn with_snapshots(
        &self,
        alerts: Vec<weather_alerts::Model>,
    ) -> CoreResult<Vec<AlertView>> {
        let ids: Vec<i32> = alerts.iter().filter_map(|a| a.weather_data_id).collect();
        let snapshots: HashMap<i32, weather_data::Model> = if ids.is_empty() {
            HashMap::new()
        } else {
            weather_data::Entity::find()
                .filter(weather_data::Column::Id.is_in(ids))
                .all(&self.db)
                .await
                .map_err(|e| CoreError::internal("Failed to load weather data").with_source(e))?
                .into_iter()
                .map(|snapshot| (snapshot.id, snapshot))
                .collect()
        };

        Ok(alerts
            .into_iter()
            .map(|alert| AlertView {
                weather_data: alert
                    .weather_data_id
                    .and_then(|id| snapshots.get(&id).cloned()),
                id: alert.id,
                disease_name: alert.disease_name,
                crop_name: alert.crop_name,
                alert_message: alert.alert_message,
                is_read: alert.is_read,
                created_at: alert.created_at,
            })
            .collect())
    }

    /// Unread first, then newest.
    pub async fn list(&self, user_id: i32) -> CoreResult<AlertList> {
        let alerts = weather_alerts::Entity::find()
            .filter(weather_alerts::Column::UserId.eq(user_id))
            .order_by_asc(weather_alerts::Column::IsRead)
            .order_by_desc(weather_alerts::Column::CreatedAt)
            .order_by_desc(weather_alerts::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load alerts").with_source(e))?;
        let unread_count = alerts.iter().filter(|alert| !alert.is_read).count();
        let alerts = self.with_snapshots(alerts).await?;
        Ok(AlertList {
            count: alerts.len(),
            unread_count,
            alerts,
        })
    }

    pub async fn active(&self, user_id: i32) -> CoreResult<Vec<AlertView>> {
        let alerts = weather_alerts::Entity::find()
            .filter(weather_alerts::Column::UserId.eq(user_id))
            .filter(weather_alerts::Column::IsRead.eq(false))
            .order_by_desc(weather_alerts::Column::CreatedAt)
            .order_by_desc(weather_alerts::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load alerts").with_source(e))?;
        self.with_snapshots(alerts).await
    }

    pub async fn mark_read(&self, user_id: i32, alert_id: i32) -> CoreResult<()> {
        let alert = weather_alerts::Entity::find_by_id(alert_id)
            .filter(weather_alerts::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load alert").with_source(e))?
            .ok_or_else(|| {
                CoreError::new(CoreErrorKind::NotFound, "Alert not found")
                    .with_field("id", alert_id.to_string())
            })?;

        let mut active: weather_alerts::ActiveModel = alert.into();
        active.is_read = Set(true);
        active
            .update(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to update alert").with_source(e))?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i32) -> CoreResult<u64> {
        let result = weather_alerts::Entity::update_many()
            .col_expr(weather_alerts::Column::IsRead, Expr::value(true))
            .filter(weather_alerts::Column::UserId.eq(user_id))
            .filter(weather_alerts::Column::IsRead.eq(false))
            .exec(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to update alerts").with_source(e))?;
        Ok(result.rows_affected)
    }

    pub async fn latest_weather(&self, user_id: i32) -> CoreResult<weather_data::Model> {
        weather_data::Entity::find()
            .filter(weather_data::Column::UserId.eq(user_id))
            .order_by_desc(weather_data::Column::FetchedAt)
            .order_by_desc(weather_data::Column::Id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load weather data").with_source(e))?
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorKind::NotFound,
                    "No weather data available. Try refreshing alerts.",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CurrentWeather, WeatherAverages};
    use crate::database::test_utils::setup_test_db;
    use crate::services::{AuthService, ProfileService, ProfileUpdate};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWeather {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for CountingWeather {
        async fn current(&self, _latitude: f64, _longitude: f64) -> CurrentWeather {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CurrentWeather::test_mode()
        }

        async fn forecast_average(&self, _latitude: f64, _longitude: f64) -> WeatherAverages {
            WeatherAverages::default()
        }
    }

    async fn setup() -> (WeatherAlertService, Arc<CountingWeather>, i32, DatabaseConnection) {
        let db = setup_test_db().await.unwrap();
        let (user, _) = AuthService::new(db.clone())
            .register("meera", "meera@example.com", "password123")
            .await
            .unwrap();
        let weather = Arc::new(CountingWeather {
            calls: AtomicUsize::new(0),
        });
        let service =
            WeatherAlertService::new(db.clone(), weather.clone(), RiskRules::builtin().unwrap());
        (service, weather, user.id, db)
    }

    async fn grow(db: &DatabaseConnection, user_id: i32, crops: &[&str]) {
        ProfileService::new(db.clone())
            .upsert(
                user_id,
                ProfileUpdate {
                    name: "Meera".into(),
                    crops: crops.iter().map(|c| c.to_string()).collect(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_profile_means_no_alerts() {
        let (service, weather, user_id, _db) = setup().await;
        assert_eq!(service.generate_alerts_for_user(user_id, false).await.unwrap(), 0);
        assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_replaces_todays_alerts_and_reuses_snapshot() {
        let (service, weather, user_id, db) = setup().await;
        grow(&db, user_id, &["Rice"]).await;

        assert_eq!(service.generate_alerts_for_user(user_id, false).await.unwrap(), 1);
        assert_eq!(service.generate_alerts_for_user(user_id, false).await.unwrap(), 1);
        assert_eq!(weather.calls.load(Ordering::SeqCst), 1);

        let listed = service.list(user_id).await.unwrap();
        assert_eq!(listed.count, 1);
        assert_eq!(listed.unread_count, 1);
        assert_eq!(listed.alerts[0].disease_name, "Bacterial Leaf Blight");
        let snapshot = listed.alerts[0].weather_data.as_ref().unwrap();
        assert_eq!(snapshot.rainfall, 12.0);

        service.generate_alerts_for_user(user_id, true).await.unwrap();
        assert_eq!(weather.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_regeneration_drops_alerts_that_no_longer_fire() {
        let (service, _weather, user_id, db) = setup().await;
        grow(&db, user_id, &["rice"]).await;
        assert_eq!(service.generate_alerts_for_user(user_id, false).await.unwrap(), 1);

        grow(&db, user_id, &["saffron"]).await;
        assert_eq!(service.generate_alerts_for_user(user_id, false).await.unwrap(), 0);
        let listed = service.list(user_id).await.unwrap();
        assert_eq!(listed.count, 0);
        assert!(service.active(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_state() {
        let (service, _weather, user_id, db) = setup().await;
        grow(&db, user_id, &["rice"]).await;
        service.generate_alerts_for_user(user_id, false).await.unwrap();

        let alert_id = service.active(user_id).await.unwrap()[0].id;
        let err = service.mark_read(user_id + 1, alert_id).await.unwrap_err();
        assert_eq!(err.message(), "Alert not found");

        service.mark_read(user_id, alert_id).await.unwrap();
        assert!(service.active(user_id).await.unwrap().is_empty());
        assert_eq!(service.mark_all_read(user_id).await.unwrap(), 0);
        assert_eq!(service.list(user_id).await.unwrap().unread_count, 0);
    }

    #[tokio::test]
    async fn test_generate_for_all_users_and_latest_weather() {
        let (service, _weather, user_id, db) = setup().await;
        assert_eq!(
            service.latest_weather(user_id).await.unwrap_err().http_status_code(),
            404
        );

        grow(&db, user_id, &["rice", "wheat"]).await;
        let stats = service.generate_alerts_for_all_users(false).await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.users_processed, 1);
        assert!(stats.total_alerts >= 1);

        let latest = service.latest_weather(user_id).await.unwrap();
        assert_eq!(latest.weather_description, "Heavy rain - Test mode");
    }
}
