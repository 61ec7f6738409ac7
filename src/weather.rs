use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

use crate::config::{Config, WeatherSettings};
use crate::error::WeatherUnavailable;
use crate::types::{Sourced, WeatherSnapshot};

/// Source of a race-time forecast for a named track.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, track: &str) -> Result<WeatherSnapshot, WeatherUnavailable>;
}

/// The documented snapshot used whenever the provider fails.
pub fn default_snapshot(settings: &WeatherSettings) -> WeatherSnapshot {
    WeatherSnapshot {
        temperature_c: settings.default_temperature_c,
        rain_probability: settings.default_rain_probability,
    }
}

/// Fetch the forecast for `track`, substituting the configured defaults on
/// any failure.
pub async fn fetch_weather<W: WeatherProvider + ?Sized>(
    provider: &W,
    track: &str,
    settings: &WeatherSettings,
) -> Sourced<WeatherSnapshot> {
    match provider.fetch(track).await {
        Ok(snapshot) => {
            tracing::info!(
                "weather forecast loaded: temp={:.1}C rain={:.0}%",
                snapshot.temperature_c,
                snapshot.rain_probability * 100.0
            );
            Sourced::live(snapshot)
        }
        Err(e) => {
            let fallback = default_snapshot(settings);
            tracing::warn!(
                "weather unavailable: {}; using defaults (T={}C, R={})",
                e,
                fallback.temperature_c,
                fallback.rain_probability
            );
            Sourced::fallback(fallback, e)
        }
    }
}

// ---------- OpenWeatherMap ----------

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Option<Vec<ForecastEntry>>,
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    dt_txt: Option<String>,
    main: Option<ForecastMain>,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastMain {
    temp: Option<f64>,
}

#[derive(Debug, Clone)]
struct TrackSlot {
    latitude: f64,
    longitude: f64,
    forecast_time: Option<String>,
}

/// Client for the OpenWeatherMap 5-day / 3-hour forecast endpoint.
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_temperature_c: f64,
    tracks: BTreeMap<String, TrackSlot>,
}

impl OpenWeatherClient {
    pub fn new(config: &Config) -> Result<Self, WeatherUnavailable> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.weather.timeout_secs))
            .build()?;
        let tracks = config
            .tracks
            .iter()
            .map(|(name, t)| {
                (
                    name.to_lowercase(),
                    TrackSlot {
                        latitude: t.latitude,
                        longitude: t.longitude,
                        forecast_time: t.forecast_time.clone(),
                    },
                )
            })
            .collect();
        Ok(Self {
            http,
            base_url: config.weather.base_url.clone(),
            api_key: config.secrets.weather_api_key.clone(),
            default_temperature_c: config.weather.default_temperature_c,
            tracks,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch(&self, track: &str) -> Result<WeatherSnapshot, WeatherUnavailable> {
        let key = track.to_lowercase();
        let slot = self
            .tracks
            .get(&key)
            .ok_or_else(|| WeatherUnavailable::UnknownTrack(track.to_string()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(WeatherUnavailable::MissingApiKey)?;
        let forecast_time =
            slot.forecast_time
                .as_deref()
                .ok_or_else(|| WeatherUnavailable::NoForecastSlot {
                    track: key.clone(),
                    slot: "<none configured>".into(),
                })?;

        tracing::info!("fetching weather data for {}", key);
        let body = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", slot.latitude.to_string()),
                ("lon", slot.longitude.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .text()
            .await?;

        select_forecast(&body, &key, forecast_time, self.default_temperature_c)
    }
}

/// Pick the entry whose `dt_txt` matches `slot` out of a forecast body.
///
/// A missing `pop` reads as 0 and a missing temperature as `default_temp`.
pub fn select_forecast(
    body: &str,
    track: &str,
    slot: &str,
    default_temp: f64,
) -> Result<WeatherSnapshot, WeatherUnavailable> {
    let resp: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| WeatherUnavailable::Malformed(e.to_string()))?;

    let list = match resp.list {
        Some(list) => list,
        None => {
            return Err(match resp.message {
                Some(serde_json::Value::String(m)) => WeatherUnavailable::Api(m),
                Some(other) => WeatherUnavailable::Api(other.to_string()),
                None => WeatherUnavailable::Malformed("response has no 'list' key".into()),
            })
        }
    };

    let entry = list
        .into_iter()
        .find(|e| e.dt_txt.as_deref() == Some(slot))
        .ok_or_else(|| WeatherUnavailable::NoForecastSlot {
            track: track.to_string(),
            slot: slot.to_string(),
        })?;

    Ok(WeatherSnapshot {
        temperature_c: entry
            .main
            .and_then(|m| m.temp)
            .unwrap_or(default_temp),
        rain_probability: entry.pop.unwrap_or(0.0),
    })
}

/// Provider that always fails; used for `--offline` runs.
pub struct OfflineWeather;

#[async_trait]
impl WeatherProvider for OfflineWeather {
    async fn fetch(&self, _track: &str) -> Result<WeatherSnapshot, WeatherUnavailable> {
        Err(WeatherUnavailable::Offline)
    }
}
