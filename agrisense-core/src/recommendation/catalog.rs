use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

const BUILTIN_CATALOG: &str = include_str!("../../resources/crop_catalog.json");

/// Agronomic reference data for one crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropInfo {
    pub crop: String,
    pub ideal_temp: String,
    pub ideal_rainfall: String,
    #[serde(rename = "yield")]
    pub expected_yield: String,
    pub reason: String,
    pub suggestion: String,
    pub season: String,
    pub duration: String,
}

impl CropInfo {
    pub fn unavailable(crop: &str) -> Self {
        Self {
            crop: crop.to_string(),
            ideal_temp: "Data unavailable".into(),
            ideal_rainfall: "Data unavailable".into(),
            expected_yield: "Varies by region".into(),
            reason: "Crop information not available in database.".into(),
            suggestion: "Consult local agricultural extension office for guidance.".into(),
            season: "Varies".into(),
            duration: "Unknown".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CropCatalog {
    entries: Vec<CropInfo>,
}

impl CropCatalog {
    pub fn builtin() -> CoreResult<Self> {
        let entries: Vec<CropInfo> = serde_json::from_str(BUILTIN_CATALOG)
            .map_err(|e| CoreError::internal("Failed to parse crop catalog").with_source(e))?;
        Ok(Self { entries })
    }

    pub fn get(&self, crop: &str) -> Option<&CropInfo> {
        let crop = crop.trim();
        self.entries
            .iter()
            .find(|entry| entry.crop.eq_ignore_ascii_case(crop))
    }

    pub fn get_or_unavailable(&self, crop: &str) -> CropInfo {
        self.get(crop)
            .cloned()
            .unwrap_or_else(|| CropInfo::unavailable(crop))
    }

    pub fn crops(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.crop.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let catalog = CropCatalog::builtin().unwrap();
        let rice = catalog.get("Rice").unwrap();
        assert_eq!(rice.season, "Kharif (Monsoon)");
        assert!(catalog.crops().count() >= 20);
    }

    #[test]
    fn unknown_crop_gets_placeholder() {
        let catalog = CropCatalog::builtin().unwrap();
        let info = catalog.get_or_unavailable("dragonfruit");
        assert_eq!(info.ideal_temp, "Data unavailable");
        assert_eq!(info.duration, "Unknown");
    }
}
