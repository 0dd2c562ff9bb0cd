use std::{collections::HashMap, path::PathBuf, time::Duration};

pub const DEFAULT_AGMARKNET_BASE_URL: &str = "https://api.data.gov.in/resource";
pub const DEFAULT_AGMARKNET_RESOURCE_ID: &str = "9ef84268-d588-465a-a308-a864a43d0070";
pub const DEFAULT_OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Runtime configuration loaded from environment variables.
///
/// Every external collaborator is optional: a missing key or URL switches the
/// matching client to its documented fallback instead of failing startup.
#[derive(Clone, Debug)]
pub struct AgriConfig {
    pub openweather_api_key: Option<String>,
    pub openweather_base_url: String,
    pub agmarknet_api_key: Option<String>,
    pub agmarknet_base_url: String,
    pub agmarknet_resource_id: String,
    pub notebook_api_url: Option<String>,
    pub image_api_url: Option<String>,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub crop_model_path: Option<PathBuf>,
    pub disease_kb_path: Option<PathBuf>,
    pub symptom_embeddings_path: Option<PathBuf>,
    pub weather_kb_path: Option<PathBuf>,
    pub upstream_timeout: Duration,
    pub model_server_timeout: Duration,
}

impl Default for AgriConfig {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl AgriConfig {
    fn tracked_keys() -> &'static [(&'static str, &'static str)] {
        &[
            ("OPENWEATHER_API_KEY", ""),
            ("OPENWEATHER_BASE_URL", DEFAULT_OPENWEATHER_BASE_URL),
            ("AGMARKNET_API_KEY", ""),
            ("AGMARKNET_BASE_URL", DEFAULT_AGMARKNET_BASE_URL),
            ("AGMARKNET_RESOURCE_ID", DEFAULT_AGMARKNET_RESOURCE_ID),
            ("NOTEBOOK_API_URL", ""),
            ("COLAB_IMAGE_API_URL", ""),
            ("EMBEDDING_BASE_URL", "http://localhost:11434"),
            ("EMBEDDING_MODEL", "all-minilm"),
            ("CROP_MODEL_PATH", ""),
            ("DISEASE_KB_PATH", ""),
            ("SYMPTOM_EMBEDDINGS_PATH", ""),
            ("WEATHER_KB_PATH", ""),
            ("AGRISENSE_UPSTREAM_TIMEOUT_SECS", "10"),
            ("AGRISENSE_MODEL_SERVER_TIMEOUT_SECS", "30"),
        ]
    }

    pub fn from_env() -> Self {
        let mut values = HashMap::new();
        for (key, default) in Self::tracked_keys() {
            let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
            values.insert(key.to_string(), value);
        }
        Self::from_map(&values)
    }

    /// Build a config from explicit values; keys that are absent or empty fall
    /// back to their defaults.
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        fn value(values: &HashMap<String, String>, key: &str) -> Option<String> {
            values
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }

        fn read(values: &HashMap<String, String>, key: &str) -> String {
            value(values, key).unwrap_or_else(|| {
                AgriConfig::tracked_keys()
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, default)| default.to_string())
                    .unwrap_or_default()
            })
        }

        fn secs(values: &HashMap<String, String>, key: &str, default: u64) -> Duration {
            Duration::from_secs(
                value(values, key)
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(default),
            )
        }

        Self {
            openweather_api_key: value(values, "OPENWEATHER_API_KEY"),
            openweather_base_url: read(values, "OPENWEATHER_BASE_URL"),
            agmarknet_api_key: value(values, "AGMARKNET_API_KEY"),
            agmarknet_base_url: read(values, "AGMARKNET_BASE_URL"),
            agmarknet_resource_id: read(values, "AGMARKNET_RESOURCE_ID"),
            notebook_api_url: value(values, "NOTEBOOK_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            image_api_url: value(values, "COLAB_IMAGE_API_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            embedding_base_url: read(values, "EMBEDDING_BASE_URL")
                .trim_end_matches('/')
                .to_string(),
            embedding_model: read(values, "EMBEDDING_MODEL"),
            crop_model_path: value(values, "CROP_MODEL_PATH").map(PathBuf::from),
            disease_kb_path: value(values, "DISEASE_KB_PATH").map(PathBuf::from),
            symptom_embeddings_path: value(values, "SYMPTOM_EMBEDDINGS_PATH").map(PathBuf::from),
            weather_kb_path: value(values, "WEATHER_KB_PATH").map(PathBuf::from),
            upstream_timeout: secs(values, "AGRISENSE_UPSTREAM_TIMEOUT_SECS", 10),
            model_server_timeout: secs(values, "AGRISENSE_MODEL_SERVER_TIMEOUT_SECS", 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_keys_missing() {
        let config = AgriConfig::from_map(&HashMap::new());
        assert!(config.openweather_api_key.is_none());
        assert_eq!(config.agmarknet_resource_id, DEFAULT_AGMARKNET_RESOURCE_ID);
        assert_eq!(config.embedding_model, "all-minilm");
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert_eq!(config.model_server_timeout, Duration::from_secs(30));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let config = AgriConfig::from_map(&map(&[
            ("OPENWEATHER_API_KEY", "  "),
            ("AGRISENSE_UPSTREAM_TIMEOUT_SECS", "oops"),
        ]));
        assert!(config.openweather_api_key.is_none());
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn urls_lose_trailing_slash() {
        let config = AgriConfig::from_map(&map(&[
            ("COLAB_IMAGE_API_URL", "https://abc.ngrok-free.app/"),
            ("EMBEDDING_BASE_URL", "http://gpu-box:11434/"),
        ]));
        assert_eq!(
            config.image_api_url.as_deref(),
            Some("https://abc.ngrok-free.app")
        );
        assert_eq!(config.embedding_base_url, "http://gpu-box:11434");
    }
}
