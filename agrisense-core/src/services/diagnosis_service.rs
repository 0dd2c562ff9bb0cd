use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::clients::{Embedder, Translator};
use crate::diagnosis::{
    detect, is_supported_crop, Candidate, EmbeddingTable, FinalPrediction, FollowupChoice,
    KnowledgeBase, Language, MatchOutcome, SymptomIndex, SymptomMatch, TOP_K,
};
use crate::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetectionResponse {
    Diagnosis {
        final_prediction: FinalPrediction,
        candidates: Vec<Candidate>,
        input_language: Language,
        translated_text: Option<String>,
        used_followup: bool,
    },
    FollowUp {
        need_followup: bool,
        candidates: Vec<Candidate>,
        followup_questions: Vec<String>,
        message: String,
        input_language: Language,
        translated_text: Option<String>,
    },
}

impl DetectionResponse {
    /// Text stored as the bot reply when the exchange is saved to a chat session.
    pub fn reply_text(&self) -> String {
        match self {
            DetectionResponse::Diagnosis {
                final_prediction, ..
            } => format!(
                "Detected {} on {} ({:.1}% match).\nTreatment: {}\nPrevention: {}",
                final_prediction.disease_name,
                final_prediction.crop,
                final_prediction.confidence * 100.0,
                final_prediction.treatment,
                final_prediction.prevention
            ),
            DetectionResponse::FollowUp { message, .. } => message.clone(),
        }
    }
}

/// Symptom text to diagnosis, translating non-English input on the way in
/// and the advice on the way out.
pub struct DiagnosisService {
    embedder: Arc<dyn Embedder>,
    translator: Arc<dyn Translator>,
    kb: KnowledgeBase,
    embeddings_path: Option<PathBuf>,
    index: OnceCell<SymptomIndex>,
}

impl DiagnosisService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        translator: Arc<dyn Translator>,
        kb: KnowledgeBase,
        embeddings_path: Option<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            translator,
            kb,
            embeddings_path,
            index: OnceCell::new(),
        }
    }

    fn load_table(&self) -> Option<SymptomIndex> {
        let path = self.embeddings_path.as_deref().filter(|path| path.exists())?;
        let loaded = EmbeddingTable::read(path).and_then(|table| {
            if table.model != self.embedder.model_name() {
                return Err(CoreError::validation(format!(
                    "Embedding table was built with {}",
                    table.model
                )));
            }
            SymptomIndex::from_table(self.kb.clone(), table)
        });
        match loaded {
            Ok(index) => {
                tracing::info!(path = %path.display(), "Loaded symptom embeddings");
                Some(index)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring symptom embedding table");
                None
            }
        }
    }

    /// The symptom index, loaded or embedded on first use.
    pub async fn index(&self) -> CoreResult<&SymptomIndex> {
        self.index
            .get_or_try_init(|| async {
                match self.load_table() {
                    Some(index) => Ok(index),
                    None => SymptomIndex::build(self.kb.clone(), self.embedder.as_ref()).await,
                }
            })
            .await
    }

    async fn embed_query(&self, text: &str) -> CoreResult<Vec<f32>> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::unavailable("Embedding server returned no vectors"))
    }

    async fn back_translate(&self, text: &str, target: Language) -> String {
        match self
            .translator
            .translate(text, Language::English, target)
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(
                    target_language = target.code(),
                    error = %e,
                    "Back-translation failed, keeping English advice"
                );
                text.to_string()
            }
        }
    }

    pub async fn detect(
        &self,
        symptom_text: &str,
        crop: &str,
        followup_choice: Option<FollowupChoice>,
    ) -> CoreResult<DetectionResponse> {
        let crop = crop.trim().to_lowercase();
        if !is_supported_crop(&crop) {
            return Err(CoreError::validation("Please select a valid crop"));
        }
        if self.kb.indices_for_crop(&crop).is_empty() {
            return Err(CoreError::validation(format!(
                "No disease data available for {}",
                crop
            )));
        }
        let symptom_text = symptom_text.trim();
        if symptom_text.is_empty() {
            return Err(CoreError::validation("symptom_text is required")
                .with_field("field", "symptom_text"));
        }

        let detected = detect(symptom_text);
        let input_language = detected.language;
        let translated_text = if detected.needs_translation() {
            Some(
                self.translator
                    .translate(symptom_text, input_language, Language::English)
                    .await?,
            )
        } else {
            None
        };
        let english = translated_text.as_deref().unwrap_or(symptom_text);

        let index = self.index().await?;
        let query = self.embed_query(english).await?;
        let top = index.search(&crop, &query, TOP_K);
        tracing::debug!(
            crop = %crop,
            language = input_language.code(),
            top_score = top.first().map(|row| row.score).unwrap_or_default(),
            "Ranked symptom rows"
        );

        let kb = index.knowledge_base();
        let outcome = SymptomMatch::new(top, kb).resolve(kb, &crop, followup_choice)?;

        match outcome {
            MatchOutcome::Diagnosis {
                mut prediction,
                candidates,
                used_followup,
            } => {
                if input_language != Language::English {
                    prediction.treatment =
                        self.back_translate(&prediction.treatment, input_language).await;
                    prediction.prevention =
                        self.back_translate(&prediction.prevention, input_language).await;
                }
                Ok(DetectionResponse::Diagnosis {
                    final_prediction: prediction,
                    candidates,
                    input_language,
                    translated_text,
                    used_followup,
                })
            }
            MatchOutcome::FollowUp {
                candidates,
                questions,
                message,
            } => Ok(DetectionResponse::FollowUp {
                need_followup: true,
                candidates,
                followup_questions: questions,
                message,
                input_language,
                translated_text,
            }),
        }
    }
}
