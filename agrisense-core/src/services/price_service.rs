use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::TtlCache;
use crate::clients::{PriceFilter, PriceSource};
use crate::errors::{CoreError, CoreErrorKind, CoreResult};
use crate::recommendation::analysis::round2;

pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const COMMODITY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Today plus the seven days before it.
pub const LOOKBACK_DAYS: i64 = 8;
pub const MAX_BULK_QUERIES: usize = 10;
const RECORDS_PER_LOOKUP: u32 = 100;

pub const STATES: [&str; 28] = [
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub crop_name: String,
    pub market: String,
    pub state: String,
    pub district: String,
    pub modal_price_per_quintal: f64,
    pub price_per_kg: f64,
    pub date: String,
    pub unit: String,
    pub success: bool,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    pub crop_name: String,
    pub state: String,
    pub district: String,
}

impl PriceQuery {
    pub fn cache_key(&self) -> String {
        format!(
            "crop_price_{}_{}_{}",
            self.crop_name, self.state, self.district
        )
        .to_lowercase()
        .replace(' ', "_")
    }
}

/// Modal prices are quoted per quintal (100 kg).
fn per_kg(modal_price: f64) -> f64 {
    if modal_price > 0.0 {
        round2(modal_price / 100.0)
    } else {
        0.0
    }
}

/// Commodity price lookups with in-process caching
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    quotes: TtlCache<PriceQuote>,
    commodities: TtlCache<Vec<String>>,
}

impl PriceService {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            quotes: TtlCache::new(PRICE_CACHE_TTL),
            commodities: TtlCache::new(COMMODITY_CACHE_TTL),
        }
    }

    pub async fn quote(&self, query: &PriceQuery) -> CoreResult<PriceQuote> {
        self.quote_on(query, Local::now().date_naive()).await
    }

    /// Most recent record between `today` and seven days earlier
    pub async fn quote_on(&self, query: &PriceQuery, today: NaiveDate) -> CoreResult<PriceQuote> {
        let key = query.cache_key();
        if let Some(mut quote) = self.quotes.get(&key) {
            tracing::info!(crop = %query.crop_name, "Returning cached price data");
            quote.cached = true;
            return Ok(quote);
        }

        for days_back in 0..LOOKBACK_DAYS {
            let date = today - chrono::Duration::days(days_back);
            tracing::debug!(
                crop = %query.crop_name,
                state = %query.state,
                district = %query.district,
                date = %date,
                "Searching price records"
            );

            let filter = PriceFilter {
                commodity: Some(query.crop_name.clone()),
                state: Some(query.state.clone()),
                district: Some(query.district.clone()),
                arrival_date: Some(date),
                limit: RECORDS_PER_LOOKUP,
            };
            let records = self.source.records(&filter).await.map_err(|e| {
                tracing::error!(error = %e, "Price request failed");
                CoreError::new(
                    CoreErrorKind::NotFound,
                    format!("Failed to fetch price data: {}", e),
                )
                .with_source(e)
            })?;

            if let Some(record) = records.into_iter().next() {
                let quote = PriceQuote {
                    crop_name: query.crop_name.clone(),
                    market: record.market.unwrap_or_else(|| "Unknown Market".to_string()),
                    state: query.state.clone(),
                    district: query.district.clone(),
                    modal_price_per_quintal: record.modal_price,
                    price_per_kg: per_kg(record.modal_price),
                    date: date.format("%Y-%m-%d").to_string(),
                    unit: "₹/kg".to_string(),
                    success: true,
                    cached: false,
                };
                self.quotes.insert(key, quote.clone());
                return Ok(quote);
            }
        }

        tracing::warn!(
            crop = %query.crop_name,
            district = %query.district,
            state = %query.state,
            "No price data found"
        );
        Err(CoreError::new(
            CoreErrorKind::NotFound,
            format!(
                "No price data available for {} in {} or nearby dates",
                query.crop_name, query.district
            ),
        ))
    }

    /// Distinct commodity names; an unreachable source yields an empty list
    pub async fn commodities(&self) -> (Vec<String>, bool) {
        const KEY: &str = "available_crops";
        if let Some(crops) = self.commodities.get(KEY) {
            return (crops, true);
        }
        match self.source.commodities().await {
            Ok(crops) => {
                if !crops.is_empty() {
                    self.commodities.insert(KEY, crops.clone());
                }
                (crops, false)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch available crops");
                (Vec::new(), false)
            }
        }
    }

    /// Process up to [`MAX_BULK_QUERIES`] raw queries, one result object each
    pub async fn bulk(&self, queries: &[Value]) -> Vec<Value> {
        let mut results = Vec::new();
        for raw in queries.iter().take(MAX_BULK_QUERIES) {
            let field = |name: &str| {
                raw.get(name)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string()
            };
            let query = PriceQuery {
                crop_name: field("crop_name"),
                state: field("state"),
                district: field("district"),
            };
            if query.crop_name.is_empty() || query.state.is_empty() || query.district.is_empty() {
                results.push(json!({
                    "query": raw,
                    "error": "Missing required fields",
                    "success": false,
                }));
                continue;
            }

            let result = match self.quote(&query).await {
                Ok(quote) => serde_json::to_value(&quote).unwrap_or_else(|_| json!({})),
                Err(e) => json!({ "error": e.message(), "success": false }),
            };
            results.push(result);
        }
        results
    }

    pub fn purge_expired(&self) -> usize {
        self.quotes.purge_expired() + self.commodities.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::PriceRecord;
    use crate::errors::{UpstreamError, UpstreamResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves one record for a single arrival date and counts calls.
    struct FakeSource {
        available_on: Option<NaiveDate>,
        calls: Mutex<Vec<NaiveDate>>,
        fail: bool,
    }

    #[async_trait]
    impl PriceSource for FakeSource {
        async fn records(&self, filter: &PriceFilter) -> UpstreamResult<Vec<PriceRecord>> {
            if self.fail {
                return Err(UpstreamError::Timeout {
                    service: "AGMARKNET",
                });
            }
            let date = filter.arrival_date.unwrap();
            self.calls.lock().unwrap().push(date);
            if Some(date) == self.available_on {
                return Ok(vec![PriceRecord {
                    commodity: filter.commodity.clone(),
                    market: Some("Lasalgaon".into()),
                    state: filter.state.clone(),
                    district: filter.district.clone(),
                    modal_price: 2150.0,
                    arrival_date: None,
                }]);
            }
            Ok(Vec::new())
        }

        async fn commodities(&self) -> UpstreamResult<Vec<String>> {
            Ok(vec!["Onion".into(), "Tomato".into()])
        }
    }

    fn query() -> PriceQuery {
        PriceQuery {
            crop_name: "Onion".into(),
            state: "Maharashtra".into(),
            district: "Nashik".into(),
        }
    }

    fn source(available_on: Option<NaiveDate>, fail: bool) -> Arc<FakeSource> {
        Arc::new(FakeSource {
            available_on,
            calls: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[test]
    fn test_cache_key() {
        let query = PriceQuery {
            crop_name: "Green Chilli".into(),
            state: "Tamil Nadu".into(),
            district: "Salem".into(),
        };
        assert_eq!(query.cache_key(), "crop_price_green_chilli_tamil_nadu_salem");
    }

    #[tokio::test]
    async fn test_walks_back_to_most_recent_record() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 8).unwrap();
        let fake = source(NaiveDate::from_ymd_opt(2025, 10, 5), false);
        let service = PriceService::new(fake.clone());

        let quote = service.quote_on(&query(), today).await.unwrap();
        assert_eq!(quote.date, "2025-10-05");
        assert_eq!(quote.price_per_kg, 21.5);
        assert_eq!(quote.market, "Lasalgaon");
        assert!(!quote.cached);
        assert_eq!(fake.calls.lock().unwrap().len(), 4);

        let again = service.quote_on(&query(), today).await.unwrap();
        assert!(again.cached);
        assert_eq!(fake.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_eight_days() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 8).unwrap();
        let fake = source(NaiveDate::from_ymd_opt(2025, 9, 30), false);
        let service = PriceService::new(fake.clone());

        let err = service.quote_on(&query(), today).await.unwrap_err();
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(
            err.message(),
            "No price data available for Onion in Nashik or nearby dates"
        );
        assert_eq!(fake.calls.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_found() {
        let service = PriceService::new(source(None, true));
        let err = service.quote(&query()).await.unwrap_err();
        assert_eq!(err.http_status_code(), 404);
        assert!(err.message().starts_with("Failed to fetch price data:"));
    }

    #[tokio::test]
    async fn test_bulk_limits_and_flags_incomplete_queries() {
        let service = PriceService::new(source(Some(Local::now().date_naive()), false));
        let mut queries = vec![json!({"crop_name": "Onion", "state": "Maharashtra"})];
        for _ in 0..12 {
            queries.push(json!({"crop_name": "Onion", "state": "Maharashtra", "district": "Nashik"}));
        }

        let results = service.bulk(&queries).await;
        assert_eq!(results.len(), MAX_BULK_QUERIES);
        assert_eq!(results[0]["error"], "Missing required fields");
        assert_eq!(results[1]["success"], true);
        assert_eq!(results[2]["cached"], true);
    }

    #[tokio::test]
    async fn test_commodities_are_cached() {
        let service = PriceService::new(source(None, false));
        let (crops, cached) = service.commodities().await;
        assert_eq!(crops, vec!["Onion", "Tomato"]);
        assert!(!cached);
        assert!(service.commodities().await.1);
    }
}
