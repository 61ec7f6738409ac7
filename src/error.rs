use thiserror::Error;

/// Session timing could not be obtained from the provider (or its cache).
#[derive(Debug, Error)]
pub enum DataUnavailable {
    #[error("HTTP request to session provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no {session} session for round {round} of {year}")]
    SessionNotFound { year: u16, round: u8, session: String },

    #[error("provider returned no laps")]
    NoLaps,

    #[error("session {session_key} returned no usable laps")]
    EmptySession { session_key: u64 },

    #[error("failed to decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("session provider disabled (offline mode)")]
    Offline,
}

/// The forecast provider could not produce a snapshot for the track.
#[derive(Debug, Error)]
pub enum WeatherUnavailable {
    #[error("OPENWEATHER_API_KEY is not set")]
    MissingApiKey,

    #[error("track '{0}' has no configured coordinates")]
    UnknownTrack(String),

    #[error("no forecast entry for {track} at {slot}")]
    NoForecastSlot { track: String, slot: String },

    #[error("HTTP request to weather provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather API error: {0}")]
    Api(String),

    #[error("malformed weather response: {0}")]
    Malformed(String),

    #[error("weather provider disabled (offline mode)")]
    Offline,
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("track '{0}' has no qualifying grid in the configuration")]
    UnknownTrack(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrainError {
    #[error("insufficient data: {rows} rows, need at least {required}")]
    InsufficientData { rows: usize, required: usize },

    #[error("shape mismatch: {rows} feature rows but {targets} targets")]
    ShapeMismatch { rows: usize, targets: usize },

    #[error("model fit failed: {0}")]
    Model(String),
}

impl From<smartcore::error::Failed> for TrainError {
    fn from(e: smartcore::error::Failed) -> Self {
        TrainError::Model(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}
