use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{build_http_client, ensure_success, WeatherProvider};
use crate::config::AgriConfig;
use crate::errors::{UpstreamError, UpstreamResult};

const SERVICE: &str = "OpenWeather";
const MAX_FORECAST_DAYS: usize = 14;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub description: String,
}

impl CurrentWeather {
    /// Values used when no API key is configured; they trip most rain-driven
    /// disease rules so the alert flow can be exercised end to end.
    pub fn test_mode() -> Self {
        Self {
            temperature: 28.0,
            humidity: 82.0,
            rainfall: 12.0,
            description: "Heavy rain - Test mode".to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            temperature: 25.0,
            humidity: 70.0,
            rainfall: 0.0,
            description: "Unknown".to_string(),
        }
    }
}

/// Forecast averages fed to the crop recommender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeatherAverages {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

impl Default for WeatherAverages {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            humidity: 70.0,
            rainfall: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: MainBlock,
    #[serde(default)]
    rain: Option<RainBlock>,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize, Default)]
struct RainBlock {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    daily: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    temp: DailyTemp,
    humidity: f64,
    #[serde(default)]
    rain: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyTemp {
    day: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    dt: i64,
    main: MainBlock,
    #[serde(default)]
    rain: Option<RainBlock>,
}

pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(config: &AgriConfig) -> UpstreamResult<Self> {
        Ok(Self {
            client: build_http_client(SERVICE, config.upstream_timeout)?,
            base_url: config.openweather_base_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        latitude: f64,
        longitude: f64,
        extra: &[(&str, &str)],
    ) -> UpstreamResult<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::NotConfigured { service: SERVICE })?;
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let mut params = vec![
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("appid", api_key),
            ("units", "metric"),
        ];
        params.extend_from_slice(extra);

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&params)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))?;
        ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::from_reqwest(SERVICE, e))
    }

    pub async fn fetch_current(&self, latitude: f64, longitude: f64) -> UpstreamResult<CurrentWeather> {
        let body: CurrentResponse = self
            .get("/data/2.5/weather", latitude, longitude, &[])
            .await?;
        Ok(CurrentWeather {
            temperature: body.main.temp,
            humidity: body.main.humidity,
            rainfall: body.rain.and_then(|rain| rain.one_hour).unwrap_or(0.0),
            description: body
                .weather
                .into_iter()
                .next()
                .map(|condition| condition.description)
                .unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    async fn fetch_daily_average(&self, latitude: f64, longitude: f64) -> UpstreamResult<WeatherAverages> {
        let body: OneCallResponse = self
            .get(
                "/data/3.0/onecall",
                latitude,
                longitude,
                &[("exclude", "current,minutely,hourly,alerts")],
            )
            .await?;
        let days: Vec<(f64, f64, f64)> = body
            .daily
            .iter()
            .take(MAX_FORECAST_DAYS)
            .map(|day| (day.temp.day, day.humidity, day.rain.unwrap_or(0.0)))
            .collect();
        mean_of(&days).ok_or(UpstreamError::Decode {
            service: SERVICE,
            reason: "one call response has no daily forecast".to_string(),
        })
    }

    async fn fetch_three_hour_average(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> UpstreamResult<WeatherAverages> {
        let body: ForecastResponse = self
            .get("/data/2.5/forecast", latitude, longitude, &[])
            .await?;
        let slots: Vec<(i64, f64, f64, f64)> = body
            .list
            .iter()
            .map(|slot| {
                let rain = slot
                    .rain
                    .as_ref()
                    .and_then(|rain| rain.three_hours)
                    .unwrap_or(0.0);
                (slot.dt, slot.main.temp, slot.main.humidity, rain / 3.0)
            })
            .collect();
        average_by_day(&slots).ok_or(UpstreamError::Decode {
            service: SERVICE,
            reason: "forecast response has no entries".to_string(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, latitude: f64, longitude: f64) -> CurrentWeather {
        if self.api_key.is_none() {
            warn!("OPENWEATHER_API_KEY not set, using test mode weather");
            return CurrentWeather::test_mode();
        }
        match self.fetch_current(latitude, longitude).await {
            Ok(weather) => {
                info!(
                    latitude,
                    longitude,
                    temperature = weather.temperature,
                    humidity = weather.humidity,
                    rainfall = weather.rainfall,
                    "Fetched current weather"
                );
                weather
            }
            Err(e) => {
                warn!(error = %e, "Current weather lookup failed, using defaults");
                CurrentWeather::unknown()
            }
        }
    }

    async fn forecast_average(&self, latitude: f64, longitude: f64) -> WeatherAverages {
        if self.api_key.is_none() {
            warn!("OPENWEATHER_API_KEY not set, using default forecast averages");
            return WeatherAverages::default();
        }
        match self.fetch_daily_average(latitude, longitude).await {
            Ok(averages) => return averages,
            Err(e) => info!(error = %e, "One Call forecast unavailable, falling back to 5 day forecast"),
        }
        match self.fetch_three_hour_average(latitude, longitude).await {
            Ok(averages) => averages,
            Err(e) => {
                warn!(error = %e, "Forecast lookup failed, using default averages");
                WeatherAverages::default()
            }
        }
    }
}

fn mean_of(days: &[(f64, f64, f64)]) -> Option<WeatherAverages> {
    if days.is_empty() {
        return None;
    }
    let n = days.len() as f64;
    Some(WeatherAverages {
        temperature: days.iter().map(|d| d.0).sum::<f64>() / n,
        humidity: days.iter().map(|d| d.1).sum::<f64>() / n,
        rainfall: days.iter().map(|d| d.2).sum::<f64>() / n,
    })
}

/// Group `(unix_ts, temp, humidity, rain)` samples by calendar day, average
/// each day, then average the (at most 14) daily means.
fn average_by_day(slots: &[(i64, f64, f64, f64)]) -> Option<WeatherAverages> {
    let mut by_day: BTreeMap<NaiveDate, Vec<(f64, f64, f64)>> = BTreeMap::new();
    for (ts, temp, humidity, rain) in slots {
        let Some(moment) = DateTime::<Utc>::from_timestamp(*ts, 0) else {
            continue;
        };
        by_day
            .entry(moment.date_naive())
            .or_default()
            .push((*temp, *humidity, *rain));
    }

    let daily: Vec<(f64, f64, f64)> = by_day
        .values()
        .take(MAX_FORECAST_DAYS)
        .filter_map(|samples| mean_of(samples))
        .map(|avg| (avg.temperature, avg.humidity, avg.rainfall))
        .collect();
    mean_of(&daily)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_grouping_weights_days_equally() {
        // 2024-06-01 00:00 and 03:00 UTC, then 2024-06-02 00:00 UTC
        let slots = vec![
            (1_717_200_000, 20.0, 60.0, 0.0),
            (1_717_210_800, 30.0, 80.0, 3.0),
            (1_717_286_400, 40.0, 90.0, 0.0),
        ];
        let avg = average_by_day(&slots).unwrap();
        assert!((avg.temperature - 32.5).abs() < 1e-9);
        assert!((avg.humidity - 80.0).abs() < 1e-9);
        assert!((avg.rainfall - 0.75).abs() < 1e-9);
    }

    #[test]
    fn empty_forecast_has_no_average() {
        assert!(average_by_day(&[]).is_none());
        assert!(mean_of(&[]).is_none());
    }

    #[test]
    fn current_response_reads_hourly_rain() {
        let body: CurrentResponse = serde_json::from_str(
            r#"{"main":{"temp":29.4,"humidity":88},"rain":{"1h":4.2},"weather":[{"description":"moderate rain"}]}"#,
        )
        .unwrap();
        assert_eq!(body.rain.unwrap().one_hour, Some(4.2));
        assert_eq!(body.weather[0].description, "moderate rain");
    }

    #[tokio::test]
    async fn missing_key_uses_test_mode() {
        let client = OpenWeatherClient::new(&AgriConfig::default()).unwrap();
        assert_eq!(client.current(20.59, 78.96).await, CurrentWeather::test_mode());
        assert_eq!(
            client.forecast_average(20.59, 78.96).await,
            WeatherAverages::default()
        );
    }
}
