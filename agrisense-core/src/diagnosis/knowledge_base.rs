//! Crop disease knowledge base: one row per (disease, symptom) pair.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

const BUILTIN_KB: &str = include_str!("../../resources/crop_disease_kb.json");

/// Crops the symptom matcher accepts.
pub const SUPPORTED_CROPS: &[&str] = &["rice", "wheat", "apple", "tomato", "potato"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomRow {
    pub crop: String,
    pub disease_name: String,
    pub symptom_description: String,
    pub treatment: String,
    pub prevention: String,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rows: Vec<SymptomRow>,
}

impl KnowledgeBase {
    pub fn from_rows(rows: Vec<SymptomRow>) -> Self {
        Self { rows }
    }

    pub fn builtin() -> CoreResult<Self> {
        Self::parse(BUILTIN_KB)
    }

    /// Load from `path` when given, otherwise use the compiled-in rows.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    CoreError::internal(format!(
                        "Failed to read disease knowledge base {}",
                        path.display()
                    ))
                    .with_source(e)
                })?;
                Self::parse(&raw)
            }
            None => Self::builtin(),
        }
    }

    fn parse(raw: &str) -> CoreResult<Self> {
        let rows: Vec<SymptomRow> = serde_json::from_str(raw).map_err(|e| {
            CoreError::internal("Failed to parse disease knowledge base").with_source(e)
        })?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[SymptomRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indices into [`rows`](Self::rows) for one crop, compared case-insensitively.
    pub fn indices_for_crop(&self, crop: &str) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.crop.eq_ignore_ascii_case(crop))
            .map(|(index, _)| index)
            .collect()
    }
}

pub fn is_supported_crop(crop: &str) -> bool {
    SUPPORTED_CROPS.contains(&crop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_supported_crop() {
        let kb = KnowledgeBase::builtin().unwrap();
        for crop in SUPPORTED_CROPS {
            assert!(
                !kb.indices_for_crop(crop).is_empty(),
                "no rows for {}",
                crop
            );
        }
    }

    #[test]
    fn crop_filter_is_case_insensitive() {
        let kb = KnowledgeBase::from_rows(vec![SymptomRow {
            crop: "Tomato".into(),
            disease_name: "Early Blight".into(),
            symptom_description: "rings".into(),
            treatment: "t".into(),
            prevention: "p".into(),
        }]);
        assert_eq!(kb.indices_for_crop("tomato"), vec![0]);
        assert!(kb.indices_for_crop("rice").is_empty());
    }

    #[test]
    fn unknown_crop_is_rejected() {
        assert!(is_supported_crop("wheat"));
        assert!(!is_supported_crop("cotton"));
        assert!(!is_supported_crop("Wheat"));
    }
}
