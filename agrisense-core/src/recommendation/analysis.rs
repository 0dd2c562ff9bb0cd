//! Soil and nutrient advice derived from the raw measurements.

use serde::Serialize;

use super::features::FieldConditions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Nutrient {
    #[serde(rename = "N")]
    Nitrogen,
    #[serde(rename = "P")]
    Phosphorus,
    #[serde(rename = "K")]
    Potassium,
}

impl Nutrient {
    pub fn symbol(&self) -> &'static str {
        match self {
            Nutrient::Nitrogen => "N",
            Nutrient::Phosphorus => "P",
            Nutrient::Potassium => "K",
        }
    }

    /// Optimal (low, high) range in kg/ha.
    pub fn optimal_range(&self) -> (f64, f64) {
        match self {
            Nutrient::Nitrogen => (50.0, 100.0),
            Nutrient::Phosphorus => (35.0, 70.0),
            Nutrient::Potassium => (35.0, 80.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NutrientStatus {
    Low,
    Optimal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientAdvice {
    pub status: NutrientStatus,
    pub recommendation: String,
    pub quantity: String,
    pub timing: String,
}

pub fn analyze_nutrient(nutrient: Nutrient, value: f64) -> NutrientAdvice {
    let (low, high) = nutrient.optimal_range();
    let advice = |status, recommendation: &str, quantity: &str, timing: &str| NutrientAdvice {
        status,
        recommendation: recommendation.to_string(),
        quantity: quantity.to_string(),
        timing: timing.to_string(),
    };

    if value < low {
        match nutrient {
            Nutrient::Nitrogen => advice(
                NutrientStatus::Low,
                "Add urea (46-0-0) or ammonium sulfate (21-0-0)",
                "Apply 50-100 kg/ha of urea",
                "Split application: 1/3 at sowing, 1/3 at vegetative stage, 1/3 at flowering",
            ),
            Nutrient::Phosphorus => advice(
                NutrientStatus::Low,
                "Add single superphosphate (SSP) or di-ammonium phosphate (DAP)",
                "Apply 100-150 kg/ha of DAP",
                "Full dose as basal application at sowing",
            ),
            Nutrient::Potassium => advice(
                NutrientStatus::Low,
                "Add muriate of potash (MOP) or sulfate of potash",
                "Apply 50-75 kg/ha of MOP",
                "Split application: Half at sowing, half at flowering",
            ),
        }
    } else if value > high {
        match nutrient {
            Nutrient::Nitrogen => advice(
                NutrientStatus::High,
                "Avoid nitrogen fertilizer this season",
                "No additional nitrogen needed",
                "Monitor soil after harvest",
            ),
            Nutrient::Phosphorus => advice(
                NutrientStatus::High,
                "Avoid phosphate fertilizer this season",
                "No additional phosphorus needed",
                "Test soil again next season",
            ),
            Nutrient::Potassium => advice(
                NutrientStatus::High,
                "Avoid potash fertilizer this season",
                "No additional potassium needed",
                "Natural depletion will occur",
            ),
        }
    } else {
        NutrientAdvice {
            status: NutrientStatus::Optimal,
            recommendation: format!("{} levels are in optimal range", nutrient.symbol()),
            quantity: "Maintain current levels with balanced fertilization".into(),
            timing: "Regular soil testing recommended".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutrientAnalysis {
    #[serde(rename = "N")]
    pub nitrogen: NutrientAdvice,
    #[serde(rename = "P")]
    pub phosphorus: NutrientAdvice,
    #[serde(rename = "K")]
    pub potassium: NutrientAdvice,
}

impl NutrientAnalysis {
    pub fn of(conditions: &FieldConditions) -> Self {
        Self {
            nitrogen: analyze_nutrient(Nutrient::Nitrogen, conditions.n),
            phosphorus: analyze_nutrient(Nutrient::Phosphorus, conditions.p),
            potassium: analyze_nutrient(Nutrient::Potassium, conditions.k),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilAssessment {
    pub soil_quality_index: f64,
    pub soil_quality_status: &'static str,
    pub ph_level: f64,
    pub ph_status: &'static str,
    pub ph_recommendation: &'static str,
}

impl SoilAssessment {
    pub fn of(conditions: &FieldConditions) -> Self {
        let quality = conditions.soil_quality();
        let soil_quality_status = if quality > 80.0 {
            "Excellent"
        } else if quality > 60.0 {
            "Good"
        } else if quality > 40.0 {
            "Fair"
        } else {
            "Poor"
        };

        let ph = conditions.ph;
        let (ph_status, ph_recommendation) = if ph < 6.0 {
            ("Slightly acidic", "Add lime to raise pH")
        } else if ph > 7.5 {
            ("Slightly alkaline", "Add sulfur or organic matter to lower pH")
        } else {
            ("Optimal", "pH is optimal for most crops")
        };

        Self {
            soil_quality_index: round2(quality),
            soil_quality_status,
            ph_level: ph,
            ph_status,
            ph_recommendation,
        }
    }
}

/// Synthetic yield index from nutrients and rainfall, never negative.
pub fn yield_index(conditions: &FieldConditions) -> f64 {
    let value = conditions.n * 0.5 + conditions.p * 0.3 + conditions.k * 0.2 + conditions.rainfall * 0.1;
    round2(value.max(0.0))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(n: f64, p: f64, k: f64, ph: f64) -> FieldConditions {
        FieldConditions {
            n,
            p,
            k,
            ph,
            temperature: 25.0,
            humidity: 70.0,
            rainfall: 10.0,
        }
    }

    #[test]
    fn nutrient_bounds_are_inclusive_optimal() {
        assert_eq!(analyze_nutrient(Nutrient::Nitrogen, 50.0).status, NutrientStatus::Optimal);
        assert_eq!(analyze_nutrient(Nutrient::Nitrogen, 100.0).status, NutrientStatus::Optimal);
        assert_eq!(analyze_nutrient(Nutrient::Nitrogen, 49.9).status, NutrientStatus::Low);
        assert_eq!(analyze_nutrient(Nutrient::Potassium, 80.1).status, NutrientStatus::High);
    }

    #[test]
    fn low_phosphorus_recommends_dap() {
        let advice = analyze_nutrient(Nutrient::Phosphorus, 10.0);
        assert_eq!(advice.quantity, "Apply 100-150 kg/ha of DAP");
        assert_eq!(advice.timing, "Full dose as basal application at sowing");
    }

    #[test]
    fn optimal_advice_names_nutrient() {
        let analysis = NutrientAnalysis::of(&conditions(60.0, 40.0, 40.0, 6.5));
        assert_eq!(analysis.nitrogen.recommendation, "N levels are in optimal range");
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["K"]["status"], "Optimal");
    }

    #[test]
    fn soil_status_thresholds() {
        assert_eq!(SoilAssessment::of(&conditions(90.0, 90.0, 90.0, 6.5)).soil_quality_status, "Excellent");
        assert_eq!(SoilAssessment::of(&conditions(70.0, 70.0, 70.0, 6.5)).soil_quality_status, "Good");
        assert_eq!(SoilAssessment::of(&conditions(50.0, 50.0, 50.0, 6.5)).soil_quality_status, "Fair");
        assert_eq!(SoilAssessment::of(&conditions(40.0, 40.0, 40.0, 6.5)).soil_quality_status, "Poor");
    }

    #[test]
    fn ph_advice() {
        let acidic = SoilAssessment::of(&conditions(60.0, 40.0, 40.0, 5.2));
        assert_eq!(acidic.ph_status, "Slightly acidic");
        assert_eq!(acidic.ph_recommendation, "Add lime to raise pH");

        let alkaline = SoilAssessment::of(&conditions(60.0, 40.0, 40.0, 8.1));
        assert_eq!(alkaline.ph_status, "Slightly alkaline");

        let optimal = SoilAssessment::of(&conditions(60.0, 40.0, 40.0, 7.5));
        assert_eq!(optimal.ph_status, "Optimal");
    }

    #[test]
    fn yield_index_is_deterministic() {
        let c = conditions(100.0, 50.0, 50.0, 6.5);
        assert_eq!(yield_index(&c), 50.0 + 15.0 + 10.0 + 1.0);
        assert_eq!(yield_index(&c), yield_index(&c));
    }
}
