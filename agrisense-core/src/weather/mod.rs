//! Weather-based disease risk evaluation.

pub mod risk;

pub use risk::{RiskAlert, RiskConditions, RiskRule, RiskRules, WeatherReading};

/// Centre of India, used when neither the request nor the profile has coordinates.
pub const DEFAULT_COORDINATES: (f64, f64) = (20.5937, 78.9629);
