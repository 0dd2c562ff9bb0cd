pub use sea_orm_migration::prelude::*;

mod m20251001_000001_create_accounts;
mod m20251001_000002_create_marketplace;
mod m20251002_000003_create_chat_history;
mod m20251003_000004_create_weather_alerts;
mod m20251004_000005_create_crop_recommendations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_create_accounts::Migration),
            Box::new(m20251001_000002_create_marketplace::Migration),
            Box::new(m20251002_000003_create_chat_history::Migration),
            Box::new(m20251003_000004_create_weather_alerts::Migration),
            Box::new(m20251004_000005_create_crop_recommendations::Migration),
        ]
    }
}
