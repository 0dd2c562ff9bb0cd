pub mod app;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use tracing::info;

use agrisense::database::{connection::*, migrations::Migrator};
use agrisense::recommendation::CropModel;
use agrisense::services::register_model;
use agrisense::AgriConfig;

use app::{AppState, Collaborators, Knowledge};

/// How often expired price quotes are dropped from the in-process cache.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub port: u16,
    pub database: String,
    pub cors_origin: Option<String>,
    pub alert_interval_hours: Option<u64>,
}

async fn connect(database_path: &str) -> Result<DatabaseConnection> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database migrations completed");
    Ok(db)
}

async fn build_state(db: DatabaseConnection) -> Result<AppState> {
    let config = AgriConfig::from_env();
    let collaborators = Collaborators::from_config(&config)?;
    let knowledge = Knowledge::load(&config)?;
    Ok(AppState::new(db, collaborators, knowledge))
}

fn spawn_background_tasks(state: &AppState, alert_interval_hours: Option<u64>) {
    let prices = state.prices.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            interval.tick().await;
            let purged = prices.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired price cache entries");
            }
        }
    });

    let Some(hours) = alert_interval_hours.filter(|hours| *hours > 0) else {
        return;
    };
    let alerts = state.alerts.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Skip the immediate tick so startup is not delayed by weather calls
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::info!("Running scheduled weather alert generation");
            if let Err(e) = alerts.generate_alerts_for_all_users(false).await {
                tracing::error!(error = %e, "Scheduled alert generation failed");
            }
        }
    });
    info!("Weather alerts regenerate every {} hour(s)", hours);
}

pub async fn start_server(options: ServeOptions) -> Result<()> {
    let db = connect(&options.database).await?;
    let state = build_state(db).await?;
    spawn_background_tasks(&state, options.alert_interval_hours);

    let app = app::create_app(state, options.cors_origin.as_deref())?;
    log_routes();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", options.port)).await?;
    info!("Server running on http://0.0.0.0:{}", options.port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                      - Health check");
    info!("  /register/, /login/          - Accounts and tokens");
    info!("  /profile/                    - Farmer profile");
    info!("  /items/, /bookings/          - Marketplace, rentals and slot bookings");
    info!("  /api/crop-prices/*           - AGMARKNET price lookups");
    info!("  /api/crop/*                  - Crop recommendation");
    info!("  /api/weather/*               - Weather disease alerts");
    info!("  /detect_disease/             - Symptom diagnosis");
    info!("  /transcribe_audio/, /translate/, /diagnose_image/ - Model server proxies");
    info!("  /chat-sessions/*             - Diagnosis chat history");
}

pub async fn migrate_database(database_path: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_path));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}

pub async fn generate_alerts(database_path: &str, force_refresh: bool) -> Result<()> {
    let db = connect(database_path).await?;
    let state = build_state(db).await?;
    let stats = state
        .alerts
        .generate_alerts_for_all_users(force_refresh)
        .await?;
    info!(
        "Alert generation complete: {} users, {} processed, {} alerts",
        stats.total_users, stats.users_processed, stats.total_alerts
    );
    Ok(())
}

/// Embed the symptom knowledge base and write the table the server loads at startup.
pub async fn embed_knowledge_base(out: &Path) -> Result<()> {
    let config = AgriConfig::from_env();
    let collaborators = Collaborators::from_config(&config)?;
    let knowledge = Knowledge::load(&config)?;
    let index =
        agrisense::diagnosis::SymptomIndex::build(knowledge.symptoms, collaborators.embedder.as_ref())
            .await?;
    index.to_table().write(out)?;
    info!(
        "Wrote {} symptom embeddings ({}) to {}",
        index.knowledge_base().len(),
        index.model(),
        out.display()
    );
    Ok(())
}

/// Validate a crop model artifact and record its metrics.
pub async fn register_model_artifact(database_path: &str, artifact: &Path) -> Result<()> {
    let model = CropModel::load(artifact)
        .with_context(|| format!("Failed to load model artifact {}", artifact.display()))?;
    let db = connect(database_path).await?;
    let record = register_model(&db, &model).await?;
    info!(
        "Registered {} v{} (accuracy {:.4}) as performance record {}",
        record.model_name, record.version, record.accuracy, record.id
    );
    Ok(())
}
