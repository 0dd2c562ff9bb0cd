//! Nearest-neighbour symptom matching and the follow-up policy.
//!
//! A query embedding is scored against every symptom row of the selected
//! crop. The best `TOP_K` rows are grouped per disease and ranked by their
//! mean similarity. The policy then either commits to a diagnosis or asks the
//! farmer to pick the symptom that matches best.

use serde::Serialize;
use serde_json::Value;

use super::knowledge_base::KnowledgeBase;
use crate::errors::{CoreError, CoreResult};

pub const TOP_K: usize = 5;
pub const CONFIDENCE_THRESHOLD: f64 = 0.55;
/// Follow-up messages list at most this many symptom descriptions.
pub const FOLLOWUP_PREVIEW: usize = 3;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredRow {
    /// Index into the knowledge base rows.
    pub row_index: usize,
    pub score: f64,
}

/// Score `candidates` against `query` and keep the best `k`, highest first.
pub fn top_k<'a, I>(query: &[f32], candidates: I, k: usize) -> Vec<ScoredRow>
where
    I: IntoIterator<Item = (usize, &'a [f32])>,
{
    let mut scored: Vec<ScoredRow> = candidates
        .into_iter()
        .map(|(row_index, embedding)| ScoredRow {
            row_index,
            score: cosine_similarity(query, embedding),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub disease_name: String,
    pub crop: String,
    pub symptoms: Vec<String>,
    pub treatments: Vec<String>,
    pub preventions: Vec<String>,
    pub indices: Vec<usize>,
    pub max_score: f64,
    pub avg_score: f64,
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|existing| existing == value) {
        values.push(value.to_string());
    }
}

/// Group scored rows per disease, ranked by mean score (descending).
pub fn aggregate(top: &[ScoredRow], kb: &KnowledgeBase) -> Vec<Candidate> {
    let mut candidates: Vec<(Candidate, Vec<f64>)> = Vec::new();

    for scored in top {
        let Some(row) = kb.rows().get(scored.row_index) else {
            continue;
        };
        let position = candidates
            .iter()
            .position(|(candidate, _)| candidate.disease_name == row.disease_name);
        let (candidate, scores) = match position {
            Some(position) => &mut candidates[position],
            None => {
                candidates.push((
                    Candidate {
                        disease_name: row.disease_name.clone(),
                        crop: row.crop.clone(),
                        symptoms: Vec::new(),
                        treatments: Vec::new(),
                        preventions: Vec::new(),
                        indices: Vec::new(),
                        max_score: scored.score,
                        avg_score: 0.0,
                    },
                    Vec::new(),
                ));
                let last = candidates.len() - 1;
                &mut candidates[last]
            }
        };
        push_unique(&mut candidate.symptoms, &row.symptom_description);
        push_unique(&mut candidate.treatments, &row.treatment);
        push_unique(&mut candidate.preventions, &row.prevention);
        candidate.indices.push(scored.row_index);
        candidate.max_score = candidate.max_score.max(scored.score);
        scores.push(scored.score);
    }

    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .map(|(mut candidate, scores)| {
            candidate.avg_score = scores.iter().sum::<f64>() / scores.len() as f64;
            candidate
        })
        .collect();
    ranked.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score));
    ranked
}

/// The farmer's answer to a follow-up question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupChoice {
    /// Zero-based position in the ranked rows.
    Index(i64),
    /// Anything that is not an integer; resolved to the top row.
    Unparsable,
}

impl FollowupChoice {
    /// `null` means no choice was made.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(number) => Some(
                number
                    .as_i64()
                    .map(FollowupChoice::Index)
                    .unwrap_or(FollowupChoice::Unparsable),
            ),
            Value::String(text) => Some(
                text.trim()
                    .parse::<i64>()
                    .map(FollowupChoice::Index)
                    .unwrap_or(FollowupChoice::Unparsable),
            ),
            _ => Some(FollowupChoice::Unparsable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalPrediction {
    pub disease_name: String,
    pub crop: String,
    pub matched_symptom: String,
    pub treatment: String,
    pub prevention: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Diagnosis {
        prediction: FinalPrediction,
        candidates: Vec<Candidate>,
        used_followup: bool,
    },
    FollowUp {
        candidates: Vec<Candidate>,
        questions: Vec<String>,
        message: String,
    },
}

/// Ranked rows for one query, ready for the follow-up policy.
#[derive(Debug, Clone)]
pub struct SymptomMatch {
    pub top: Vec<ScoredRow>,
    pub candidates: Vec<Candidate>,
}

impl SymptomMatch {
    pub fn new(top: Vec<ScoredRow>, kb: &KnowledgeBase) -> Self {
        let candidates = aggregate(&top, kb);
        Self { top, candidates }
    }

    pub fn top_score(&self) -> f64 {
        self.top.first().map(|row| row.score).unwrap_or(0.0)
    }

    /// Diseases with at least one row at or above the threshold.
    pub fn confident_diseases(&self) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| candidate.max_score >= CONFIDENCE_THRESHOLD)
            .count()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.top_score() < CONFIDENCE_THRESHOLD || self.confident_diseases() > 1
    }

    pub fn resolve(
        self,
        kb: &KnowledgeBase,
        crop: &str,
        choice: Option<FollowupChoice>,
    ) -> CoreResult<MatchOutcome> {
        if let Some(choice) = choice {
            return self.resolve_choice(kb, choice);
        }

        if self.is_ambiguous() {
            return Ok(self.follow_up(kb, crop));
        }

        let Some(best) = self.candidates.first() else {
            return Ok(self.follow_up(kb, crop));
        };
        let prediction = FinalPrediction {
            disease_name: best.disease_name.clone(),
            crop: best.crop.clone(),
            matched_symptom: best.symptoms.first().cloned().unwrap_or_default(),
            treatment: best.treatments.first().cloned().unwrap_or_default(),
            prevention: best.preventions.first().cloned().unwrap_or_default(),
            confidence: best.avg_score,
        };
        Ok(MatchOutcome::Diagnosis {
            prediction,
            candidates: self.candidates,
            used_followup: false,
        })
    }

    fn resolve_choice(self, kb: &KnowledgeBase, choice: FollowupChoice) -> CoreResult<MatchOutcome> {
        let no_match = || CoreError::validation("No matching row found.");
        let scored = match choice {
            FollowupChoice::Index(index) => {
                let index = usize::try_from(index).map_err(|_| no_match())?;
                self.top.get(index).copied().ok_or_else(no_match)?
            }
            FollowupChoice::Unparsable => self.top.first().copied().ok_or_else(no_match)?,
        };
        let row = kb.rows().get(scored.row_index).ok_or_else(no_match)?;

        Ok(MatchOutcome::Diagnosis {
            prediction: FinalPrediction {
                disease_name: row.disease_name.clone(),
                crop: row.crop.clone(),
                matched_symptom: row.symptom_description.clone(),
                treatment: row.treatment.clone(),
                prevention: row.prevention.clone(),
                confidence: scored.score,
            },
            candidates: self.candidates,
            used_followup: true,
        })
    }

    fn follow_up(self, kb: &KnowledgeBase, crop: &str) -> MatchOutcome {
        let questions: Vec<String> = self
            .top
            .iter()
            .enumerate()
            .filter_map(|(position, scored)| {
                kb.rows()
                    .get(scored.row_index)
                    .map(|row| format!("{}. {}", position + 1, row.symptom_description))
            })
            .collect();
        let message = followup_message(crop, &questions);
        MatchOutcome::FollowUp {
            candidates: self.candidates,
            questions,
            message,
        }
    }
}

pub fn followup_message(crop: &str, questions: &[String]) -> String {
    let preview: Vec<&str> = questions
        .iter()
        .take(FOLLOWUP_PREVIEW)
        .map(String::as_str)
        .collect();
    format!(
        "I'm analyzing your {} symptoms but need more details for accurate diagnosis.\n\
         Which of these symptoms best matches what you see on your crop?\n{}",
        crop,
        preview.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::knowledge_base::SymptomRow;
    use serde_json::json;

    fn row(disease: &str, symptom: &str) -> SymptomRow {
        SymptomRow {
            crop: "Tomato".into(),
            disease_name: disease.into(),
            symptom_description: symptom.into(),
            treatment: format!("treat {}", disease),
            prevention: format!("prevent {}", disease),
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::from_rows(vec![
            row("Early Blight", "target rings"),
            row("Early Blight", "yellow lower leaves"),
            row("Late Blight", "water soaked patches"),
            row("Leaf Curl", "curled leaves"),
        ])
    }

    fn scored(pairs: &[(usize, f64)]) -> Vec<ScoredRow> {
        pairs
            .iter()
            .map(|(row_index, score)| ScoredRow {
                row_index: *row_index,
                score: *score,
            })
            .collect()
    }

    #[test]
    fn cosine_handles_zero_and_parallel_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let embeddings: Vec<Vec<f32>> = vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.7, 0.7],
        ];
        let top = top_k(
            &[1.0, 0.1],
            embeddings.iter().enumerate().map(|(i, e)| (i, e.as_slice())),
            2,
        );
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].row_index, 1);
        assert_eq!(top[1].row_index, 2);
    }

    #[test]
    fn aggregate_ranks_by_mean_score() {
        let kb = kb();
        let candidates = aggregate(&scored(&[(2, 0.8), (0, 0.75), (1, 0.7), (3, 0.2)]), &kb);

        assert_eq!(candidates[0].disease_name, "Late Blight");
        assert_eq!(candidates[1].disease_name, "Early Blight");
        assert_eq!(candidates[1].symptoms.len(), 2);
        assert_eq!(candidates[1].treatments.len(), 1);
        assert!((candidates[1].avg_score - 0.725).abs() < 1e-9);
        assert!((candidates[1].max_score - 0.75).abs() < 1e-9);
        assert_eq!(candidates[1].indices, vec![0, 1]);
    }

    #[test]
    fn single_confident_disease_is_diagnosed() {
        let kb = kb();
        let outcome = SymptomMatch::new(scored(&[(0, 0.9), (1, 0.8), (3, 0.3)]), &kb)
            .resolve(&kb, "tomato", None)
            .unwrap();
        match outcome {
            MatchOutcome::Diagnosis {
                prediction,
                used_followup,
                ..
            } => {
                assert_eq!(prediction.disease_name, "Early Blight");
                assert_eq!(prediction.matched_symptom, "target rings");
                assert!((prediction.confidence - 0.85).abs() < 1e-9);
                assert!(!used_followup);
            }
            other => panic!("expected diagnosis, got {:?}", other),
        }
    }

    #[test]
    fn low_top_score_asks_follow_up() {
        let kb = kb();
        let outcome = SymptomMatch::new(
            scored(&[(2, 0.5), (0, 0.4), (3, 0.3), (1, 0.2)]),
            &kb,
        )
        .resolve(&kb, "tomato", None)
        .unwrap();
        match outcome {
            MatchOutcome::FollowUp {
                questions, message, ..
            } => {
                assert_eq!(questions.len(), 4);
                assert_eq!(questions[0], "1. water soaked patches");
                assert!(message.starts_with("I'm analyzing your tomato symptoms"));
                assert!(message.contains("3. curled leaves"));
                assert!(!message.contains("4. yellow lower leaves"));
            }
            other => panic!("expected follow-up, got {:?}", other),
        }
    }

    #[test]
    fn two_confident_diseases_ask_follow_up() {
        let kb = kb();
        let matched = SymptomMatch::new(scored(&[(2, 0.7), (0, 0.65)]), &kb);
        assert_eq!(matched.confident_diseases(), 2);
        assert!(matches!(
            matched.resolve(&kb, "tomato", None).unwrap(),
            MatchOutcome::FollowUp { .. }
        ));
    }

    #[test]
    fn followup_choice_picks_ranked_row() {
        let kb = kb();
        let outcome = SymptomMatch::new(scored(&[(2, 0.7), (0, 0.65)]), &kb)
            .resolve(&kb, "tomato", Some(FollowupChoice::Index(1)))
            .unwrap();
        match outcome {
            MatchOutcome::Diagnosis {
                prediction,
                used_followup,
                ..
            } => {
                assert_eq!(prediction.disease_name, "Early Blight");
                assert!((prediction.confidence - 0.65).abs() < 1e-9);
                assert!(used_followup);
            }
            other => panic!("expected diagnosis, got {:?}", other),
        }
    }

    #[test]
    fn followup_choice_out_of_range_is_rejected() {
        let kb = kb();
        for index in [2, -1] {
            let err = SymptomMatch::new(scored(&[(2, 0.7), (0, 0.65)]), &kb)
                .resolve(&kb, "tomato", Some(FollowupChoice::Index(index)))
                .unwrap_err();
            assert_eq!(err.message(), "No matching row found.");
            assert_eq!(err.http_status_code(), 400);
        }
    }

    #[test]
    fn unparsable_choice_uses_top_row() {
        assert_eq!(FollowupChoice::from_json(&json!(null)), None);
        assert_eq!(
            FollowupChoice::from_json(&json!("2")),
            Some(FollowupChoice::Index(2))
        );
        let choice = FollowupChoice::from_json(&json!("the first one"));
        assert_eq!(choice, Some(FollowupChoice::Unparsable));

        let kb = kb();
        let outcome = SymptomMatch::new(scored(&[(3, 0.4), (0, 0.3)]), &kb)
            .resolve(&kb, "tomato", choice)
            .unwrap();
        match outcome {
            MatchOutcome::Diagnosis { prediction, .. } => {
                assert_eq!(prediction.disease_name, "Leaf Curl")
            }
            other => panic!("expected diagnosis, got {:?}", other),
        }
    }
}
