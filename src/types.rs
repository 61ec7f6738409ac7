use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ---------- Session identity ----------

/// Session codes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    Race,
    Qualifying,
    Sprint,
    SprintQualifying,
    Practice1,
    Practice2,
    Practice3,
}

impl SessionType {
    pub fn code(&self) -> &'static str {
        match self {
            SessionType::Race => "R",
            SessionType::Qualifying => "Q",
            SessionType::Sprint => "S",
            SessionType::SprintQualifying => "SQ",
            SessionType::Practice1 => "FP1",
            SessionType::Practice2 => "FP2",
            SessionType::Practice3 => "FP3",
        }
    }

    /// Session name as published by the timing provider.
    pub fn provider_name(&self) -> &'static str {
        match self {
            SessionType::Race => "Race",
            SessionType::Qualifying => "Qualifying",
            SessionType::Sprint => "Sprint",
            SessionType::SprintQualifying => "Sprint Qualifying",
            SessionType::Practice1 => "Practice 1",
            SessionType::Practice2 => "Practice 2",
            SessionType::Practice3 => "Practice 3",
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "R" => Ok(SessionType::Race),
            "Q" => Ok(SessionType::Qualifying),
            "S" => Ok(SessionType::Sprint),
            "SQ" => Ok(SessionType::SprintQualifying),
            "FP1" => Ok(SessionType::Practice1),
            "FP2" => Ok(SessionType::Practice2),
            "FP3" => Ok(SessionType::Practice3),
            other => Err(format!(
                "unknown session type '{other}' (expected R, Q, S, SQ, FP1, FP2 or FP3)"
            )),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------- Timing ----------

/// One timed lap, all durations in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    pub driver: String,
    pub lap_time: f64,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
}

/// Per-driver mean sector times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorTimes {
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
}

impl SectorTimes {
    pub fn total(&self) -> f64 {
        self.sector1 + self.sector2 + self.sector3
    }
}

// ---------- Driver ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub code: String,
    pub full_name: String,
    pub team: String,
    /// 1-based position in the qualifying grid.
    pub grid_position: usize,
    pub qualifying_time: Option<f64>,
    pub clean_air_race_pace: Option<f64>,
    pub average_position_change: Option<f64>,
    pub sector_times: Option<SectorTimes>,
}

/// Who a feature row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverIdentity {
    pub code: String,
    pub full_name: String,
    pub team: String,
    pub grid_position: usize,
}

impl From<&DriverRecord> for DriverIdentity {
    fn from(r: &DriverRecord) -> Self {
        Self {
            code: r.code.clone(),
            full_name: r.full_name.clone(),
            team: r.team.clone(),
            grid_position: r.grid_position,
        }
    }
}

// ---------- Weather ----------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub rain_probability: f64,
}

// ---------- Provenance ----------

/// Whether a value came from its provider or from the documented fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Cached,
    Fallback { reason: String },
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    pub provenance: Provenance,
}

impl<T> Sourced<T> {
    pub fn live(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Live,
        }
    }

    pub fn cached(value: T) -> Self {
        Self {
            value,
            provenance: Provenance::Cached,
        }
    }

    pub fn fallback(value: T, reason: impl fmt::Display) -> Self {
        Self {
            value,
            provenance: Provenance::Fallback {
                reason: reason.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_codes_parse_case_insensitively() {
        assert_eq!("r".parse::<SessionType>().unwrap(), SessionType::Race);
        assert_eq!("Q".parse::<SessionType>().unwrap(), SessionType::Qualifying);
        assert_eq!("fp2".parse::<SessionType>().unwrap(), SessionType::Practice2);
        assert_eq!("SQ".parse::<SessionType>().unwrap().provider_name(), "Sprint Qualifying");
        assert!("X".parse::<SessionType>().is_err());
    }

    #[test]
    fn provenance_serializes_with_tag() {
        let p = Provenance::Fallback {
            reason: "offline".into(),
        };
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"source":"fallback","reason":"offline"}"#);
        assert!(p.is_fallback());
        assert!(!Provenance::Live.is_fallback());
    }

    #[test]
    fn sector_total() {
        let s = SectorTimes {
            sector1: 20.0,
            sector2: 21.5,
            sector3: 22.25,
        };
        assert_eq!(s.total(), 63.75);
    }
}
