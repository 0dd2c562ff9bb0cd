use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use agrisense::clients::{
    AgmarknetClient, Embedder, ImageClassifier, ImageServerClient, NotebookClient, OllamaEmbedder,
    OpenWeatherClient, PriceSource, Transcriber, Translator, WeatherProvider,
};
use agrisense::diagnosis::KnowledgeBase;
use agrisense::recommendation::{CropCatalog, CropModel};
use agrisense::services::{
    AuthService, BookingService, ChatHistoryService, DiagnosisService, ItemService, PriceService,
    ProfileService, RecommendationService, WeatherAlertService,
};
use agrisense::weather::RiskRules;
use agrisense::AgriConfig;

use super::handlers::{
    accounts, bookings, chat_sessions, crop_prices, crop_recommendation, disease, health, items,
    weather_alerts,
};

/// Largest audio clip or photo accepted for forwarding to the model servers.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// External services the handlers talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub translator: Arc<dyn Translator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub images: Arc<dyn ImageClassifier>,
    pub weather: Arc<dyn WeatherProvider>,
    pub prices: Arc<dyn PriceSource>,
}

impl Collaborators {
    pub fn from_config(config: &AgriConfig) -> Result<Self> {
        let notebook = Arc::new(NotebookClient::new(config)?);
        Ok(Self {
            embedder: Arc::new(OllamaEmbedder::new(config)?),
            translator: notebook.clone(),
            transcriber: notebook,
            images: Arc::new(ImageServerClient::new(config)?),
            weather: Arc::new(OpenWeatherClient::new(config)?),
            prices: Arc::new(AgmarknetClient::new(config)?),
        })
    }
}

/// Knowledge bases and the crop model artifact.
pub struct Knowledge {
    pub symptoms: KnowledgeBase,
    pub risk_rules: RiskRules,
    pub catalog: CropCatalog,
    pub crop_model: Option<CropModel>,
    pub embeddings_path: Option<PathBuf>,
}

impl Knowledge {
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            symptoms: KnowledgeBase::builtin()?,
            risk_rules: RiskRules::builtin()?,
            catalog: CropCatalog::builtin()?,
            crop_model: None,
            embeddings_path: None,
        })
    }

    /// Knowledge bases from the configured paths. A crop model that fails to
    /// load leaves recommendations disabled instead of stopping the server.
    pub fn load(config: &AgriConfig) -> Result<Self> {
        let crop_model = match config.crop_model_path.as_deref() {
            Some(path) => match CropModel::load(path) {
                Ok(model) => {
                    tracing::info!(
                        path = %path.display(),
                        model = %model.metadata.model_name,
                        version = %model.metadata.version,
                        "Loaded crop model"
                    );
                    Some(model)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Crop model not loaded");
                    None
                }
            },
            None => {
                tracing::warn!("CROP_MODEL_PATH not set, crop recommendations disabled");
                None
            }
        };

        Ok(Self {
            symptoms: KnowledgeBase::load(config.disease_kb_path.as_deref())?,
            risk_rules: RiskRules::load(config.weather_kb_path.as_deref())?,
            catalog: CropCatalog::builtin()?,
            crop_model,
            embeddings_path: config.symptom_embeddings_path.clone(),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
    pub items: Arc<ItemService>,
    pub bookings: Arc<BookingService>,
    pub chats: Arc<ChatHistoryService>,
    pub prices: Arc<PriceService>,
    pub recommendations: Arc<RecommendationService>,
    pub alerts: Arc<WeatherAlertService>,
    pub diagnosis: Arc<DiagnosisService>,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub images: Arc<dyn ImageClassifier>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, collaborators: Collaborators, knowledge: Knowledge) -> Self {
        let Collaborators {
            embedder,
            translator,
            transcriber,
            images,
            weather,
            prices,
        } = collaborators;

        Self {
            auth: Arc::new(AuthService::new(db.clone())),
            profiles: Arc::new(ProfileService::new(db.clone())),
            items: Arc::new(ItemService::new(db.clone())),
            bookings: Arc::new(BookingService::new(db.clone())),
            chats: Arc::new(ChatHistoryService::new(db.clone())),
            prices: Arc::new(PriceService::new(prices)),
            recommendations: Arc::new(RecommendationService::new(
                db.clone(),
                knowledge.crop_model,
                knowledge.catalog,
                weather.clone(),
            )),
            alerts: Arc::new(WeatherAlertService::new(
                db.clone(),
                weather,
                knowledge.risk_rules,
            )),
            diagnosis: Arc::new(DiagnosisService::new(
                embedder,
                translator.clone(),
                knowledge.symptoms,
                knowledge.embeddings_path,
            )),
            transcriber,
            translator,
            images,
            db,
        }
    }
}

fn cors_layer(cors_origin: Option<&str>) -> Result<CorsLayer> {
    let methods = [
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::PUT,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ];
    let cors = match cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(
            origin
                .parse::<axum::http::HeaderValue>()
                .map_err(|e| anyhow!("Invalid CORS origin: {}", e))?,
        ),
        None => CorsLayer::new().allow_origin(Any),
    };
    Ok(cors
        .allow_methods(methods)
        .allow_headers(Any)
        .allow_credentials(false))
}

pub fn create_app(state: AppState, cors_origin: Option<&str>) -> Result<Router> {
    let cors = cors_layer(cors_origin)?;

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/register/", post(accounts::register))
        .route("/login/", post(accounts::login))
        .route(
            "/profile/",
            get(accounts::get_profile).put(accounts::update_profile),
        )
        .route("/items/", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id/",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        .route("/items/:id/slots/", get(items::item_slots))
        .route(
            "/bookings/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/bookings/:id/respond/", post(bookings::respond))
        .route("/detect_disease/", post(disease::detect_disease))
        .route(
            "/transcribe_audio/",
            post(disease::transcribe_audio).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/translate/", post(disease::translate))
        .route(
            "/diagnose_image/",
            post(disease::diagnose_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/chat-sessions/",
            get(chat_sessions::list_sessions).post(chat_sessions::create_session),
        )
        .route(
            "/chat-sessions/:id/",
            get(chat_sessions::get_session).delete(chat_sessions::delete_session),
        )
        .route("/chat-sessions/:id/messages/", post(chat_sessions::add_message))
        .route("/api/crop-prices/", get(crop_prices::get_price))
        .route("/api/crop-prices/crops/", get(crop_prices::list_crops))
        .route("/api/crop-prices/states/", get(crop_prices::list_states))
        .route("/api/crop-prices/bulk/", post(crop_prices::bulk_prices))
        .route("/api/crop/recommend/", post(crop_recommendation::recommend))
        .route("/api/crop/history/", get(crop_recommendation::history))
        .route("/api/crop/model-info/", get(crop_recommendation::model_info))
        .route("/api/crop/weather/", get(crop_recommendation::weather))
        .route("/api/crop/crop-info/", get(crop_recommendation::crop_info))
        .route("/api/weather/alerts/", get(weather_alerts::list_alerts))
        .route("/api/weather/alerts/active/", get(weather_alerts::active_alerts))
        .route("/api/weather/alerts/:id/read/", post(weather_alerts::mark_read))
        .route(
            "/api/weather/alerts/mark-all-read/",
            post(weather_alerts::mark_all_read),
        )
        .route("/api/weather/alerts/refresh/", post(weather_alerts::refresh))
        .route("/api/weather/alerts/generate/", post(weather_alerts::generate))
        .route("/api/weather/weather/", get(weather_alerts::current_weather))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}
