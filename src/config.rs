use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, path::PathBuf};

use crate::error::ConfigError;

const DEFAULT_CONFIG: &str = include_str!("../config/default.json");

pub const WEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Immutable snapshot of everything static the pipeline needs.
///
/// Built once at start (embedded document or a user file, plus secrets from the
/// environment) and handed around by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracks: BTreeMap<String, TrackInfo>,
    pub drivers: BTreeMap<String, DriverInfo>,
    pub team_points: BTreeMap<String, u32>,
    pub models: ModelDefaults,
    pub weather: WeatherSettings,
    pub session: SessionSettings,
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub latitude: f64,
    pub longitude: f64,
    /// Forecast slot in the provider's `dt_txt` format, UTC.
    pub forecast_time: Option<String>,
    /// Grid in qualifying order; `time_s` is null when the driver set no time.
    pub qualifying: Vec<QualifyingEntry>,
    #[serde(default)]
    pub clean_air_race_pace: BTreeMap<String, f64>,
    #[serde(default)]
    pub average_position_change: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifyingEntry {
    pub driver: String,
    pub time_s: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverInfo {
    pub full_name: String,
    pub team: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefaults {
    pub test_size: f64,
    pub random_state: u64,
    pub min_training_rows: usize,
    pub gradient_boosting: BoostingParams,
    pub lightgbm: HistogramParams,
    pub decision_tree: TreeSettings,
    pub random_forest: ForestParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

/// Boosting over histogram-binned features.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistogramParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub max_bin: usize,
    pub min_data_in_leaf: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeSettings {
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub default_temperature_c: f64,
    pub default_rain_probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

/// Values read from the environment, never serialized.
#[derive(Clone, Default)]
pub struct Secrets {
    pub weather_api_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field(
                "weather_api_key",
                &self.weather_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        let weather_api_key = std::env::var(WEATHER_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self { weather_api_key }
    }
}

impl Config {
    /// The configuration shipped with the binary, without secrets.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_CONFIG)
    }

    /// Parse and validate a configuration document. Track names are
    /// lowercased so lookups are case-insensitive.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let mut cfg: Config = serde_json::from_str(text)?;
        let mut tracks = BTreeMap::new();
        for (name, info) in std::mem::take(&mut cfg.tracks) {
            let key = name.to_lowercase();
            if tracks.insert(key, info).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "track '{name}' is configured more than once"
                )));
            }
        }
        cfg.tracks = tracks;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path` when given, else the built-in document; secrets always
    /// come from the process environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => {
                let data = fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_string(),
                    source,
                })?;
                Self::from_json(&data)?
            }
            None => Self::builtin()?,
        };
        cfg.secrets = Secrets::from_env();
        Ok(cfg)
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.models;
        if !(0.0..1.0).contains(&m.test_size) {
            return Err(ConfigError::Invalid(format!(
                "models.test_size must be in [0, 1), got {}",
                m.test_size
            )));
        }
        if m.min_training_rows < 2 {
            return Err(ConfigError::Invalid(
                "models.min_training_rows must be at least 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.weather.default_rain_probability) {
            return Err(ConfigError::Invalid(
                "weather.default_rain_probability must be in [0, 1]".into(),
            ));
        }
        if m.lightgbm.max_bin < 2 {
            return Err(ConfigError::Invalid(
                "models.lightgbm.max_bin must be at least 2".into(),
            ));
        }
        if m.gradient_boosting.max_depth == 0 || m.lightgbm.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "boosting max_depth must be at least 1".into(),
            ));
        }
        for (name, track) in &self.tracks {
            if track.qualifying.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "track '{name}' has an empty qualifying grid"
                )));
            }
        }
        Ok(())
    }

    /// Case-insensitive track lookup.
    pub fn track(&self, name: &str) -> Option<&TrackInfo> {
        self.tracks.get(&name.to_lowercase())
    }

    pub fn driver(&self, code: &str) -> Option<&DriverInfo> {
        self.drivers.get(code)
    }

    /// Team championship points normalised by the leading team.
    pub fn team_performance_score(&self, team: &str) -> Option<f64> {
        let max = self.team_points.values().copied().max()?;
        if max == 0 {
            return None;
        }
        self.team_points
            .get(team)
            .map(|&points| points as f64 / max as f64)
    }
}
