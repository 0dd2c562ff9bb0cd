//! Symptom-based disease diagnosis.
//!
//! - [`language`]: script based language identification
//! - [`knowledge_base`]: crop disease rows with canned treatment advice
//! - [`index`]: symptom embeddings, built through an [`Embedder`](crate::clients::Embedder)
//!   or loaded from disk
//! - [`matcher`]: ranking, per-disease aggregation and the follow-up policy

pub mod index;
pub mod knowledge_base;
pub mod language;
pub mod matcher;

pub use index::{EmbeddingTable, SymptomIndex};
pub use knowledge_base::{is_supported_crop, KnowledgeBase, SymptomRow, SUPPORTED_CROPS};
pub use language::{detect, DetectedLanguage, Language};
pub use matcher::{
    Candidate, FinalPrediction, FollowupChoice, MatchOutcome, ScoredRow, SymptomMatch,
    CONFIDENCE_THRESHOLD, TOP_K,
};
