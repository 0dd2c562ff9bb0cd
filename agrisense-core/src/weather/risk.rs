//! Weather-driven disease risk rules.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, CoreResult};

const BUILTIN_RULES: &str = include_str!("../../resources/weather_disease_kb.json");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskConditions {
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub min_humidity: Option<f64>,
    #[serde(default)]
    pub max_humidity: Option<f64>,
    #[serde(default)]
    pub min_rainfall: Option<f64>,
    #[serde(default)]
    pub max_rainfall: Option<f64>,
    pub alert: String,
}

impl RiskConditions {
    /// Every bound that is present must hold.
    pub fn holds(&self, weather: &WeatherReading) -> bool {
        let within = |value: f64, min: Option<f64>, max: Option<f64>| {
            min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
        };
        within(weather.temperature, self.min_temp, self.max_temp)
            && within(weather.humidity, self.min_humidity, self.max_humidity)
            && within(weather.rainfall, self.min_rainfall, self.max_rainfall)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRule {
    pub crop_name: String,
    pub disease_name: String,
    pub risk_conditions: RiskConditions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAlert {
    pub disease_name: String,
    pub crop_name: String,
    pub alert_message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RiskRules {
    rules: Vec<RiskRule>,
}

impl RiskRules {
    pub fn new(rules: Vec<RiskRule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> CoreResult<Self> {
        Self::parse(BUILTIN_RULES)
    }

    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::internal(format!("Failed to read weather risk rules {}", path.display()))
                .with_source(e)
        })?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> CoreResult<Self> {
        let rules: Vec<RiskRule> = serde_json::from_str(raw)
            .map_err(|e| CoreError::internal("Failed to parse weather risk rules").with_source(e))?;
        tracing::debug!(rules = rules.len(), "Loaded weather risk rules");
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules for the user's crops whose conditions hold for `weather`.
    pub fn evaluate(&self, weather: &WeatherReading, user_crops: &[String]) -> Vec<RiskAlert> {
        self.rules
            .iter()
            .filter(|rule| {
                user_crops
                    .iter()
                    .any(|crop| crop.trim().eq_ignore_ascii_case(rule.crop_name.trim()))
            })
            .filter(|rule| rule.risk_conditions.holds(weather))
            .map(|rule| {
                tracing::info!(
                    disease = %rule.disease_name,
                    crop = %rule.crop_name,
                    "Weather risk detected"
                );
                RiskAlert {
                    disease_name: rule.disease_name.clone(),
                    crop_name: rule.crop_name.clone(),
                    alert_message: rule.risk_conditions.alert.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(crop: &str, conditions: RiskConditions) -> RiskRule {
        RiskRule {
            crop_name: crop.into(),
            disease_name: format!("{} disease", crop),
            risk_conditions: conditions,
        }
    }

    fn reading(temperature: f64, humidity: f64, rainfall: f64) -> WeatherReading {
        WeatherReading {
            temperature,
            humidity,
            rainfall,
        }
    }

    #[test]
    fn absent_bounds_always_hold() {
        let conditions = RiskConditions {
            alert: "any".into(),
            ..Default::default()
        };
        assert!(conditions.holds(&reading(-10.0, 0.0, 0.0)));
    }

    #[test]
    fn bounds_are_inclusive() {
        let conditions = RiskConditions {
            min_temp: Some(20.0),
            max_temp: Some(30.0),
            min_humidity: Some(80.0),
            alert: "blast".into(),
            ..Default::default()
        };
        assert!(conditions.holds(&reading(20.0, 80.0, 0.0)));
        assert!(conditions.holds(&reading(30.0, 95.0, 0.0)));
        assert!(!conditions.holds(&reading(30.5, 95.0, 0.0)));
        assert!(!conditions.holds(&reading(25.0, 79.0, 0.0)));
    }

    #[test]
    fn only_user_crops_fire() {
        let rules = RiskRules::new(vec![
            rule("Rice", RiskConditions {
                min_humidity: Some(80.0),
                alert: "rice alert".into(),
                ..Default::default()
            }),
            rule("Wheat", RiskConditions {
                alert: "wheat alert".into(),
                ..Default::default()
            }),
        ]);

        let alerts = rules.evaluate(&reading(28.0, 82.0, 12.0), &["rice".to_string()]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].crop_name, "Rice");
        assert_eq!(alerts[0].alert_message, "rice alert");

        assert!(rules.evaluate(&reading(28.0, 82.0, 12.0), &[]).is_empty());
    }

    #[test]
    fn test_mode_weather_triggers_builtin_rice_rules() {
        let rules = RiskRules::builtin().unwrap();
        let alerts = rules.evaluate(&reading(28.0, 82.0, 12.0), &["rice".to_string()]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].disease_name, "Bacterial Leaf Blight");
    }
}
