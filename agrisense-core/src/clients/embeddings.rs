use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{build_http_client, ensure_success, Embedder};
use crate::config::AgriConfig;
use crate::errors::{UpstreamError, UpstreamResult};

const SERVICE: &str = "Embedding server";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Sentence encoder served by an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &AgriConfig) -> UpstreamResult<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, config.model_server_timeout)?,
            endpoint: format!("{}/api/embed", config.embedding_base_url),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> UpstreamResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.model,
            count = texts.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;
        let body: EmbedResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;

        if body.embeddings.len() != texts.len() {
            tracing::error!(
                expected = texts.len(),
                received = body.embeddings.len(),
                "Embedding count mismatch"
            );
            return Err(UpstreamError::Decode {
                service: SERVICE,
                reason: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    body.embeddings.len()
                ),
            });
        }

        Ok(body.embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
