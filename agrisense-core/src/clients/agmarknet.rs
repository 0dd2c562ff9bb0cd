use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::{build_http_client, ensure_success, PriceSource};
use crate::config::AgriConfig;
use crate::errors::{UpstreamError, UpstreamResult};

const SERVICE: &str = "AGMARKNET";

/// Query against the data.gov.in daily commodity price resource.
#[derive(Debug, Clone, Default)]
pub struct PriceFilter {
    pub commodity: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PriceRecord {
    #[serde(default)]
    pub commodity: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub modal_price: f64,
    #[serde(default)]
    pub arrival_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    records: Vec<PriceRecord>,
}

// The API reports prices as strings ("2150") but occasionally as numbers.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

pub struct AgmarknetClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl AgmarknetClient {
    pub fn new(config: &AgriConfig) -> UpstreamResult<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, config.upstream_timeout)?,
            endpoint: format!(
                "{}/{}",
                config.agmarknet_base_url.trim_end_matches('/'),
                config.agmarknet_resource_id
            ),
            api_key: config.agmarknet_api_key.clone(),
        })
    }

    fn query_params(&self, filter: &PriceFilter) -> UpstreamResult<Vec<(String, String)>> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(UpstreamError::NotConfigured { service: SERVICE })?;

        let mut params = vec![
            ("api-key".to_string(), api_key),
            ("format".to_string(), "json".to_string()),
            ("limit".to_string(), filter.limit.to_string()),
        ];
        if let Some(commodity) = &filter.commodity {
            params.push(("filters[commodity]".to_string(), commodity.clone()));
        }
        if let Some(state) = &filter.state {
            params.push(("filters[state]".to_string(), state.clone()));
        }
        if let Some(district) = &filter.district {
            params.push(("filters[district]".to_string(), district.clone()));
        }
        if let Some(date) = filter.arrival_date {
            params.push((
                "filters[arrival_date]".to_string(),
                date.format("%d/%m/%Y").to_string(),
            ));
        }
        Ok(params)
    }
}

#[async_trait]
impl PriceSource for AgmarknetClient {
    async fn records(&self, filter: &PriceFilter) -> UpstreamResult<Vec<PriceRecord>> {
        let params = self.query_params(filter)?;
        debug!(
            commodity = ?filter.commodity,
            arrival_date = ?filter.arrival_date,
            "Querying AGMARKNET"
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;
        let page: RecordsPage = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;

        Ok(page.records)
    }

    async fn commodities(&self) -> UpstreamResult<Vec<String>> {
        let records = self
            .records(&PriceFilter {
                limit: 1000,
                ..Default::default()
            })
            .await?;

        let mut crops: Vec<String> = records
            .into_iter()
            .filter_map(|record| record.commodity)
            .filter(|name| !name.trim().is_empty())
            .collect();
        crops.sort();
        crops.dedup();
        Ok(crops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn modal_price_accepts_strings_and_numbers() {
        let page: RecordsPage = serde_json::from_str(
            r#"{"records":[
                {"commodity":"Tomato","market":"Lasalgaon","modal_price":"1850"},
                {"commodity":"Onion","market":"Pimpalgaon","modal_price":2100.5},
                {"commodity":"Potato"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.records[0].modal_price, 1850.0);
        assert_eq!(page.records[1].modal_price, 2100.5);
        assert_eq!(page.records[2].modal_price, 0.0);
    }

    #[test]
    fn query_params_format_arrival_date() {
        let mut values = HashMap::new();
        values.insert("AGMARKNET_API_KEY".to_string(), "demo".to_string());
        let client = AgmarknetClient::new(&AgriConfig::from_map(&values)).unwrap();
        let params = client
            .query_params(&PriceFilter {
                commodity: Some("Tomato".into()),
                arrival_date: NaiveDate::from_ymd_opt(2024, 3, 7),
                limit: 100,
                ..Default::default()
            })
            .unwrap();
        assert!(params.contains(&("filters[arrival_date]".to_string(), "07/03/2024".to_string())));
        assert!(params.contains(&("limit".to_string(), "100".to_string())));
        assert!(!params.iter().any(|(k, _)| k == "filters[state]"));
    }

    #[test]
    fn missing_api_key_is_reported() {
        let client = AgmarknetClient::new(&AgriConfig::from_map(&HashMap::new())).unwrap();
        assert!(matches!(
            client.query_params(&PriceFilter::default()),
            Err(UpstreamError::NotConfigured { .. })
        ));
    }
}
