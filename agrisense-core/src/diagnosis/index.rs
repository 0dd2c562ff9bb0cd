use std::path::Path;

use serde::{Deserialize, Serialize};

use super::knowledge_base::KnowledgeBase;
use super::matcher::{top_k, ScoredRow};
use crate::clients::Embedder;
use crate::errors::{CoreError, CoreResult};

/// Precomputed symptom embeddings as written by `kb embed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingTable {
    pub model: String,
    pub symptoms: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl EmbeddingTable {
    pub fn read(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::internal(format!("Failed to read embedding table {}", path.display()))
                .with_source(e)
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::internal("Failed to parse embedding table").with_source(e))
    }

    pub fn write(&self, path: &Path) -> CoreResult<()> {
        let raw = serde_json::to_string(self)
            .map_err(|e| CoreError::internal("Failed to serialize embedding table").with_source(e))?;
        std::fs::write(path, raw).map_err(|e| {
            CoreError::internal(format!("Failed to write embedding table {}", path.display()))
                .with_source(e)
        })
    }
}

/// Knowledge base rows paired with their symptom embeddings.
#[derive(Debug, Clone)]
pub struct SymptomIndex {
    kb: KnowledgeBase,
    embeddings: Vec<Vec<f32>>,
    model: String,
}

impl SymptomIndex {
    /// Embed every symptom description in one upstream call.
    pub async fn build(kb: KnowledgeBase, embedder: &dyn Embedder) -> CoreResult<Self> {
        let symptoms: Vec<String> = kb
            .rows()
            .iter()
            .map(|row| row.symptom_description.clone())
            .collect();

        tracing::info!(
            rows = symptoms.len(),
            model = embedder.model_name(),
            "Building symptom embedding index"
        );
        let embeddings = embedder.embed(&symptoms).await?;

        Ok(Self {
            kb,
            embeddings,
            model: embedder.model_name().to_string(),
        })
    }

    /// Reuse a precomputed table; rejected when it was produced for other rows.
    pub fn from_table(kb: KnowledgeBase, table: EmbeddingTable) -> CoreResult<Self> {
        let matches_rows = table.symptoms.len() == kb.len()
            && table.embeddings.len() == kb.len()
            && kb
                .rows()
                .iter()
                .zip(table.symptoms.iter())
                .all(|(row, symptom)| &row.symptom_description == symptom);
        if !matches_rows {
            return Err(CoreError::validation(
                "Embedding table does not match the disease knowledge base",
            ));
        }

        Ok(Self {
            kb,
            embeddings: table.embeddings,
            model: table.model,
        })
    }

    pub fn to_table(&self) -> EmbeddingTable {
        EmbeddingTable {
            model: self.model.clone(),
            symptoms: self
                .kb
                .rows()
                .iter()
                .map(|row| row.symptom_description.clone())
                .collect(),
            embeddings: self.embeddings.clone(),
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Best `k` rows of `crop` for the query embedding.
    pub fn search(&self, crop: &str, query: &[f32], k: usize) -> Vec<ScoredRow> {
        let rows = self.kb.indices_for_crop(crop).into_iter().filter_map(|index| {
            self.embeddings
                .get(index)
                .map(|embedding| (index, embedding.as_slice()))
        });
        top_k(query, rows, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::knowledge_base::SymptomRow;

    fn kb() -> KnowledgeBase {
        let row = |crop: &str, disease: &str, symptom: &str| SymptomRow {
            crop: crop.into(),
            disease_name: disease.into(),
            symptom_description: symptom.into(),
            treatment: String::new(),
            prevention: String::new(),
        };
        KnowledgeBase::from_rows(vec![
            row("Rice", "Blast", "grey lesions"),
            row("Wheat", "Rust", "yellow stripes"),
            row("Rice", "Brown Spot", "brown spots"),
        ])
    }

    fn table() -> EmbeddingTable {
        EmbeddingTable {
            model: "test".into(),
            symptoms: vec![
                "grey lesions".into(),
                "yellow stripes".into(),
                "brown spots".into(),
            ],
            embeddings: vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
        }
    }

    #[test]
    fn search_only_scores_selected_crop() {
        let index = SymptomIndex::from_table(kb(), table()).unwrap();
        let top = index.search("rice", &[0.0, 1.0], 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].row_index, 2);
        assert!(top.iter().all(|row| row.row_index != 1));
    }

    #[test]
    fn stale_table_is_rejected() {
        let mut stale = table();
        stale.symptoms[0] = "something else".into();
        assert!(SymptomIndex::from_table(kb(), stale).is_err());
    }

    #[test]
    fn table_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        let index = SymptomIndex::from_table(kb(), table()).unwrap();
        index.to_table().write(&path).unwrap();

        let reloaded = SymptomIndex::from_table(kb(), EmbeddingTable::read(&path).unwrap()).unwrap();
        assert_eq!(reloaded.model(), "test");
    }
}
