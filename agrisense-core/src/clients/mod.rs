//! Outbound HTTP clients for the external collaborators.
//!
//! Each collaborator sits behind a trait so request handlers and services can
//! be exercised with in-process fakes. The reqwest implementations apply the
//! fixed timeouts from [`AgriConfig`](crate::config::AgriConfig).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagnosis::language::Language;
use crate::errors::{UpstreamError, UpstreamResult};

pub mod agmarknet;
pub mod embeddings;
pub mod notebook;
pub mod openweather;

pub use agmarknet::{AgmarknetClient, PriceFilter, PriceRecord};
pub use embeddings::OllamaEmbedder;
pub use notebook::{ImageServerClient, NotebookClient};
pub use openweather::{CurrentWeather, OpenWeatherClient, WeatherAverages};

/// File received from the mobile client and forwarded upstream.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcription {
    pub transcript: String,
    pub translated: String,
    pub detected_language: String,
    pub translation_applied: bool,
    #[serde(default)]
    pub engine: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopPrediction {
    pub class_name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageDiagnosis {
    pub disease: String,
    pub class_name: String,
    pub confidence: f64,
    #[serde(default)]
    pub top_predictions: Vec<TopPrediction>,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> UpstreamResult<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> UpstreamResult<String>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: UploadedFile) -> UpstreamResult<Transcription>;
}

#[async_trait]
pub trait ImageClassifier: Send + Sync {
    async fn classify(&self, image: UploadedFile, crop: &str) -> UpstreamResult<ImageDiagnosis>;
}

/// Weather lookups never fail; providers substitute documented defaults.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> CurrentWeather;

    async fn forecast_average(&self, latitude: f64, longitude: f64) -> WeatherAverages;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn records(&self, filter: &PriceFilter) -> UpstreamResult<Vec<PriceRecord>>;

    async fn commodities(&self) -> UpstreamResult<Vec<String>>;
}

pub(crate) fn build_http_client(
    service: &'static str,
    timeout: Duration,
) -> UpstreamResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::Connect {
            service,
            reason: format!("failed to create HTTP client: {}", e),
        })
}

/// Turn a non-success response into [`UpstreamError::Status`].
pub(crate) async fn ensure_success(
    service: &'static str,
    response: reqwest::Response,
) -> UpstreamResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}
