use serde::{Deserialize, Serialize};

/// Number of model inputs: seven measured plus six engineered features.
pub const FEATURE_COUNT: usize = 13;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "N",
    "P",
    "K",
    "temperature",
    "humidity",
    "ph",
    "rainfall",
    "N_P_ratio",
    "N_K_ratio",
    "P_K_ratio",
    "temp_humidity",
    "temp_rainfall",
    "soil_quality",
];

const RATIO_EPSILON: f64 = 1e-8;

/// Raw measurements the model is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldConditions {
    #[serde(rename = "N")]
    pub n: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "K")]
    pub k: f64,
    pub ph: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

impl FieldConditions {
    pub fn soil_quality(&self) -> f64 {
        (self.n + self.p + self.k) / 3.0
    }

    /// Feature vector in [`FEATURE_NAMES`] order.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.n,
            self.p,
            self.k,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
            self.n / (self.p + RATIO_EPSILON),
            self.n / (self.k + RATIO_EPSILON),
            self.p / (self.k + RATIO_EPSILON),
            self.temperature * self.humidity,
            self.temperature * self.rainfall,
            self.soil_quality(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engineered_features_follow_raw_inputs() {
        let conditions = FieldConditions {
            n: 90.0,
            p: 45.0,
            k: 0.0,
            ph: 6.5,
            temperature: 25.0,
            humidity: 80.0,
            rainfall: 4.0,
        };
        let features = conditions.features();

        assert!((features[7] - 2.0).abs() < 1e-6);
        // K of zero relies on the epsilon instead of dividing by zero
        assert!(features[8].is_finite());
        assert_eq!(features[10], 2000.0);
        assert_eq!(features[11], 100.0);
        assert_eq!(features[12], 45.0);
    }
}
