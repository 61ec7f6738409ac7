use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    time::Duration,
};

use crate::config::SessionSettings;
use crate::error::DataUnavailable;
use crate::types::{LapRecord, SectorTimes, SessionType, Sourced};

/// Drivers of the synthetic dataset used when the provider is unavailable.
pub const FALLBACK_DRIVERS: [&str; 13] = [
    "VER", "NOR", "PIA", "RUS", "SAI", "ALB", "LEC", "OCO", "HAM", "STR", "GAS", "ALO", "HUL",
];
const FALLBACK_LAPS_PER_DRIVER: usize = 3;
const FALLBACK_SEED: u64 = 42;

/// Source of per-lap timing for one session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn fetch_laps(
        &self,
        year: u16,
        round: u8,
        session: SessionType,
    ) -> Result<Vec<LapRecord>, DataUnavailable>;
}

/// Load laps for a session, preferring the on-disk cache, then the provider.
///
/// Never returns an empty collection: provider failures are replaced by
/// [`fallback_laps`] and recorded in the provenance.
pub async fn load_session<P: SessionProvider + ?Sized>(
    provider: &P,
    cache: Option<&SessionCache>,
    year: u16,
    round: u8,
    session: SessionType,
) -> Sourced<Vec<LapRecord>> {
    if let Some(cache) = cache {
        match cache.read(year, round, session) {
            Ok(Some(laps)) if !laps.is_empty() => {
                tracing::info!(
                    "loaded {} laps for {} round {} {} from cache",
                    laps.len(),
                    year,
                    round,
                    session
                );
                return Sourced::cached(laps);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("ignoring unreadable session cache: {}", e),
        }
    }

    tracing::info!("loading {} round {} {} session data", year, round, session);
    match provider.fetch_laps(year, round, session).await {
        Ok(laps) if !laps.is_empty() => {
            tracing::info!("loaded {} laps from provider", laps.len());
            if let Some(cache) = cache {
                if let Err(e) = cache.write(year, round, session, &laps) {
                    tracing::warn!("could not write session cache: {}", e);
                }
            }
            Sourced::live(laps)
        }
        Ok(_) => {
            let reason = DataUnavailable::NoLaps;
            tracing::warn!("{}; using synthetic fallback laps", reason);
            Sourced::fallback(fallback_laps(), reason)
        }
        Err(e) => {
            tracing::warn!("session data unavailable: {}; using synthetic fallback laps", e);
            Sourced::fallback(fallback_laps(), e)
        }
    }
}

/// Fixed synthetic laps: 13 drivers x 3 laps, lap times in [73, 76) s and
/// sectors in [20, 25) s, drawn from a fixed seed.
pub fn fallback_laps() -> Vec<LapRecord> {
    let mut rng = StdRng::seed_from_u64(FALLBACK_SEED);
    let n = FALLBACK_DRIVERS.len() * FALLBACK_LAPS_PER_DRIVER;

    // Column by column, lap i belongs to driver i % 13.
    let lap_times: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 3.0 + 73.0).collect();
    let s1: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 5.0 + 20.0).collect();
    let s2: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 5.0 + 20.0).collect();
    let s3: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 5.0 + 20.0).collect();

    (0..n)
        .map(|i| LapRecord {
            driver: FALLBACK_DRIVERS[i % FALLBACK_DRIVERS.len()].to_string(),
            lap_time: lap_times[i],
            sector1: s1[i],
            sector2: s2[i],
            sector3: s3[i],
        })
        .collect()
}

// ---------- Aggregation ----------

#[derive(Default)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn push(&mut self, x: f64) {
        self.sum += x;
        self.n += 1;
    }

    fn value(&self) -> f64 {
        self.sum / self.n as f64
    }
}

/// Mean sector times per driver.
pub fn aggregate_sectors(laps: &[LapRecord]) -> BTreeMap<String, SectorTimes> {
    let mut acc: BTreeMap<&str, [Mean; 3]> = BTreeMap::new();
    for lap in laps {
        let m = acc.entry(lap.driver.as_str()).or_default();
        m[0].push(lap.sector1);
        m[1].push(lap.sector2);
        m[2].push(lap.sector3);
    }
    acc.into_iter()
        .map(|(driver, m)| {
            (
                driver.to_string(),
                SectorTimes {
                    sector1: m[0].value(),
                    sector2: m[1].value(),
                    sector3: m[2].value(),
                },
            )
        })
        .collect()
}

/// Mean lap time per driver.
pub fn average_lap_times(laps: &[LapRecord]) -> BTreeMap<String, f64> {
    let mut acc: BTreeMap<&str, Mean> = BTreeMap::new();
    for lap in laps {
        acc.entry(lap.driver.as_str()).or_default().push(lap.lap_time);
    }
    acc.into_iter()
        .map(|(driver, m)| (driver.to_string(), m.value()))
        .collect()
}

// ---------- Cache ----------

/// JSON files of previously fetched sessions, one per (year, round, session).
#[derive(Debug, Clone)]
pub struct SessionCache {
    root: PathBuf,
}

impl SessionCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, year: u16, round: u8, session: SessionType) -> PathBuf {
        self.root
            .join(format!("{}-r{:02}-{}.json", year, round, session.code()))
    }

    pub fn read(
        &self,
        year: u16,
        round: u8,
        session: SessionType,
    ) -> Result<Option<Vec<LapRecord>>, DataUnavailable> {
        let path = self.path(year, round, session);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn write(
        &self,
        year: u16,
        round: u8,
        session: SessionType,
        laps: &[LapRecord],
    ) -> Result<(), DataUnavailable> {
        fs::create_dir_all(&self.root)?;
        let data = serde_json::to_string(laps)?;
        fs::write(self.path(year, round, session), data)?;
        Ok(())
    }
}

// ---------- OpenF1 ----------

#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    pub session_key: u64,
    pub session_name: String,
    pub date_start: String,
}

#[derive(Debug, Deserialize)]
pub struct DriverEntry {
    pub driver_number: u32,
    pub name_acronym: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LapEntry {
    pub driver_number: u32,
    pub lap_duration: Option<f64>,
    pub duration_sector_1: Option<f64>,
    pub duration_sector_2: Option<f64>,
    pub duration_sector_3: Option<f64>,
}

/// OpenF1 REST client (`/sessions`, `/drivers`, `/laps`).
pub struct OpenF1Client {
    http: reqwest::Client,
    base_url: String,
}

impl OpenF1Client {
    pub fn new(settings: &SessionSettings) -> Result<Self, DataUnavailable> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataUnavailable> {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("GET {} {:?}", url, query);
        let body = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl SessionProvider for OpenF1Client {
    async fn fetch_laps(
        &self,
        year: u16,
        round: u8,
        session: SessionType,
    ) -> Result<Vec<LapRecord>, DataUnavailable> {
        let sessions: Vec<SessionInfo> = self
            .get(
                "sessions",
                &[
                    ("year", year.to_string()),
                    ("session_name", session.provider_name().to_string()),
                ],
            )
            .await?;
        let key = pick_session(sessions, round).ok_or_else(|| DataUnavailable::SessionNotFound {
            year,
            round,
            session: session.provider_name().to_string(),
        })?;

        let drivers: Vec<DriverEntry> = self
            .get("drivers", &[("session_key", key.to_string())])
            .await?;
        let laps: Vec<LapEntry> = self
            .get("laps", &[("session_key", key.to_string())])
            .await?;

        let laps = laps_from_entries(&drivers, laps);
        if laps.is_empty() {
            return Err(DataUnavailable::EmptySession { session_key: key });
        }
        Ok(laps)
    }
}

/// Session key of the `round`-th session (1-based) in start-date order.
pub fn pick_session(mut sessions: Vec<SessionInfo>, round: u8) -> Option<u64> {
    if round == 0 {
        return None;
    }
    sessions.sort_by(|a, b| a.date_start.cmp(&b.date_start));
    sessions.get(round as usize - 1).map(|s| s.session_key)
}

/// Join laps to driver acronyms, dropping laps with any missing duration.
pub fn laps_from_entries(drivers: &[DriverEntry], laps: Vec<LapEntry>) -> Vec<LapRecord> {
    let codes: HashMap<u32, &str> = drivers
        .iter()
        .filter_map(|d| d.name_acronym.as_deref().map(|a| (d.driver_number, a)))
        .collect();

    laps.into_iter()
        .filter_map(|l| {
            let driver = codes.get(&l.driver_number)?;
            Some(LapRecord {
                driver: driver.to_string(),
                lap_time: l.lap_duration?,
                sector1: l.duration_sector_1?,
                sector2: l.duration_sector_2?,
                sector3: l.duration_sector_3?,
            })
        })
        .collect()
}

/// Provider that always fails; used for `--offline` runs.
pub struct OfflineSessions;

#[async_trait]
impl SessionProvider for OfflineSessions {
    async fn fetch_laps(
        &self,
        _year: u16,
        _round: u8,
        _session: SessionType,
    ) -> Result<Vec<LapRecord>, DataUnavailable> {
        Err(DataUnavailable::Offline)
    }
}
