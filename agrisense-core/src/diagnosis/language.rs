//! Script-based language identification for symptom text.
//!
//! Farmers type in English, Hindi or Marathi, frequently mixing Devanagari
//! with romanised words. Devanagari text is split into Hindi and Marathi by
//! counting marker words that are common in one language and rare in the
//! other.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "mr")]
    Marathi,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Marathi => "mr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Language::English),
            "hi" | "hindi" => Some(Language::Hindi),
            "mr" | "marathi" => Some(Language::Marathi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedLanguage {
    pub language: Language,
    /// Both Devanagari and Latin letters appear in the text.
    pub code_mixed: bool,
}

impl DetectedLanguage {
    pub fn needs_translation(&self) -> bool {
        self.language != Language::English
    }
}

const MARATHI_MARKERS: &[&str] = &[
    "आहे", "आहेत", "नाही", "मध्ये", "आणि", "झाले", "झाली", "झाला", "पाने", "पानांवर", "वर",
    "माझ्या", "माझे", "पिकावर", "कसे", "काय", "येत", "दिसत", "होत", "करावे",
];

const HINDI_MARKERS: &[&str] = &[
    "है", "हैं", "नहीं", "में", "और", "पर", "के", "की", "का", "रहा", "रही", "रहे", "हो", "गए",
    "गया", "पत्तों", "पत्ते", "मेरी", "मेरे", "क्या",
];

static MARATHI: Lazy<HashSet<&'static str>> =
    Lazy::new(|| MARATHI_MARKERS.iter().copied().collect());
static HINDI: Lazy<HashSet<&'static str>> = Lazy::new(|| HINDI_MARKERS.iter().copied().collect());

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

pub fn detect(text: &str) -> DetectedLanguage {
    let has_devanagari = text.chars().any(is_devanagari);
    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());

    if !has_devanagari {
        return DetectedLanguage {
            language: Language::English,
            code_mixed: false,
        };
    }

    let words: Vec<&str> = text
        .split(|c: char| !is_devanagari(c))
        .filter(|word| !word.is_empty())
        .collect();
    let marathi = words
        .iter()
        .filter(|word| MARATHI.contains(**word))
        .count()
        // ळ is frequent in Marathi and essentially absent from Hindi
        + text.matches('ळ').count();
    let hindi = words
        .iter()
        .filter(|word| HINDI.contains(**word))
        .count();

    // Code-mixed text defaults to Hindi unless Marathi clearly dominates.
    let language = if marathi > hindi {
        Language::Marathi
    } else {
        Language::Hindi
    };

    DetectedLanguage {
        language,
        code_mixed: has_latin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_text_is_english() {
        let detected = detect("Brown spots with yellow halo on leaves");
        assert_eq!(detected.language, Language::English);
        assert!(!detected.needs_translation());
    }

    #[test]
    fn hindi_markers_win() {
        let detected = detect("पत्तों पर भूरे धब्बे हैं और पौधा सूख रहा है");
        assert_eq!(detected.language, Language::Hindi);
        assert!(!detected.code_mixed);
    }

    #[test]
    fn marathi_markers_win() {
        let detected = detect("माझ्या पिकावर पिवळे डाग आहेत आणि पाने वाळत आहेत");
        assert_eq!(detected.language, Language::Marathi);
    }

    #[test]
    fn mixed_script_defaults_to_hindi() {
        let detected = detect("leaves पर brown धब्बे");
        assert_eq!(detected.language, Language::Hindi);
        assert!(detected.code_mixed);
        assert!(detected.needs_translation());
    }

    #[test]
    fn codes_round_trip() {
        assert_eq!(Language::from_code("MR"), Some(Language::Marathi));
        assert_eq!(Language::Hindi.code(), "hi");
        assert_eq!(Language::from_code("ta"), None);
    }
}
