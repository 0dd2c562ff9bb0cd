use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{
    build_http_client, ensure_success, ImageClassifier, ImageDiagnosis, TopPrediction,
    Transcriber, Transcription, Translator, UploadedFile,
};
use crate::config::AgriConfig;
use crate::diagnosis::language::Language;
use crate::errors::{UpstreamError, UpstreamResult};

const NOTEBOOK: &str = "Notebook server";
const IMAGE_SERVER: &str = "Model server";

fn file_part(file: UploadedFile, service: &'static str) -> UpstreamResult<Part> {
    let part = Part::bytes(file.bytes).file_name(file.file_name);
    match file.content_type {
        Some(mime) => part.mime_str(&mime).map_err(|e| UpstreamError::Connect {
            service,
            reason: format!("invalid content type {}: {}", mime, e),
        }),
        None => Ok(part),
    }
}

/// Whisper transcription and text translation hosted in a notebook.
pub struct NotebookClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translated: String,
}

impl NotebookClient {
    pub fn new(config: &AgriConfig) -> UpstreamResult<Self> {
        Ok(Self {
            client: build_http_client(NOTEBOOK, config.model_server_timeout)?,
            base_url: config.notebook_api_url.clone(),
        })
    }

    fn url(&self, path: &str) -> UpstreamResult<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, path))
            .ok_or(UpstreamError::NotConfigured { service: NOTEBOOK })
    }
}

#[async_trait]
impl Transcriber for NotebookClient {
    async fn transcribe(&self, audio: UploadedFile) -> UpstreamResult<Transcription> {
        let url = self.url("/api/transcribe")?;
        info!(file = %audio.file_name, bytes = audio.bytes.len(), "Forwarding audio for transcription");

        let form = Form::new().part("audio", file_part(audio, NOTEBOOK)?);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(NOTEBOOK, e))?;
        ensure_success(NOTEBOOK, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(NOTEBOOK, e))
    }
}

#[async_trait]
impl Translator for NotebookClient {
    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> UpstreamResult<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        let url = self.url("/api/translate")?;

        let response = self
            .client
            .post(url)
            .json(&TranslateRequest {
                text,
                source_language: source.code(),
                target_language: target.code(),
            })
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(NOTEBOOK, e))?;
        let body: TranslateResponse = ensure_success(NOTEBOOK, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(NOTEBOOK, e))?;
        Ok(body.translated.trim().to_string())
    }
}

/// Image classifier served from the notebook's `/diagnose` endpoint.
pub struct ImageServerClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

#[derive(Deserialize)]
struct DiagnoseResponse {
    #[serde(default)]
    disease: Option<String>,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    top_predictions: Vec<TopPrediction>,
}

impl ImageServerClient {
    pub fn new(config: &AgriConfig) -> UpstreamResult<Self> {
        let endpoint = config.image_api_url.as_ref().map(|url| {
            if url.ends_with("/diagnose") {
                url.clone()
            } else {
                format!("{}/diagnose", url)
            }
        });
        Ok(Self {
            client: build_http_client(IMAGE_SERVER, config.model_server_timeout)?,
            endpoint,
        })
    }
}

#[async_trait]
impl ImageClassifier for ImageServerClient {
    async fn classify(&self, image: UploadedFile, crop: &str) -> UpstreamResult<ImageDiagnosis> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or(UpstreamError::NotConfigured {
                service: IMAGE_SERVER,
            })?;
        info!(crop, endpoint = %endpoint, "Forwarding image for diagnosis");

        let form = Form::new()
            .part("image", file_part(image, IMAGE_SERVER)?)
            .text("crop", crop.to_string());
        let response = self
            .client
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Image model server request failed");
                UpstreamError::from_reqwest(IMAGE_SERVER, e)
            })?;
        let body: DiagnoseResponse = ensure_success(IMAGE_SERVER, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(IMAGE_SERVER, e))?;

        let disease = body.disease.unwrap_or_else(|| "unknown".to_string());
        Ok(ImageDiagnosis {
            class_name: body.class_name.unwrap_or_else(|| disease.clone()),
            disease,
            confidence: body.confidence,
            top_predictions: body.top_predictions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn image_endpoint_appends_diagnose_once() {
        let mut values = HashMap::new();
        values.insert(
            "COLAB_IMAGE_API_URL".to_string(),
            "https://abc.ngrok-free.app".to_string(),
        );
        let client = ImageServerClient::new(&AgriConfig::from_map(&values)).unwrap();
        assert_eq!(
            client.endpoint.as_deref(),
            Some("https://abc.ngrok-free.app/diagnose")
        );

        values.insert(
            "COLAB_IMAGE_API_URL".to_string(),
            "https://abc.ngrok-free.app/diagnose".to_string(),
        );
        let client = ImageServerClient::new(&AgriConfig::from_map(&values)).unwrap();
        assert_eq!(
            client.endpoint.as_deref(),
            Some("https://abc.ngrok-free.app/diagnose")
        );
    }

    #[tokio::test]
    async fn unconfigured_notebook_is_reported() {
        let client = NotebookClient::new(&AgriConfig::default()).unwrap();
        let err = client
            .translate("पत्तों पर धब्बे", Language::Hindi, Language::English)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured { .. }));

        let same = client
            .translate("brown spots", Language::English, Language::English)
            .await
            .unwrap();
        assert_eq!(same, "brown spots");
    }
}
