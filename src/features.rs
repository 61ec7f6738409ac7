use serde::Serialize;
use std::{cmp::Ordering, collections::BTreeSet};

use crate::config::{Config, QualifyingEntry};
use crate::error::FeatureError;
use crate::loader::{aggregate_sectors, average_lap_times};
use crate::types::{DriverIdentity, DriverRecord, LapRecord, WeatherSnapshot};

pub const FEATURE_COUNT: usize = 7;

/// Column order of every feature vector.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "QualifyingTime",
    "RainProbability",
    "Temperature",
    "TeamPerformanceScore",
    "CleanAirRacePace",
    "AveragePositionChange",
    "TotalSectorTime",
];

/// One driver's features; `None` marks a value left for imputation.
pub type FeatureVector = [Option<f64>; FEATURE_COUNT];

/// Driver identities and their feature rows, kept index-aligned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureTable {
    identities: Vec<DriverIdentity>,
    rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: DriverIdentity, row: FeatureVector) {
        self.identities.push(identity);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn identities(&self) -> &[DriverIdentity] {
        &self.identities
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    /// Sub-table with the given row indices, in that order.
    pub fn select(&self, indices: &[usize]) -> FeatureTable {
        let mut out = FeatureTable::new();
        for &i in indices {
            out.push(self.identities[i].clone(), self.rows[i]);
        }
        out
    }
}

/// 1-based grid slot per configured entry: fastest qualifying time first,
/// drivers without a time behind everyone else, ties in configured order.
pub fn grid_positions(qualifying: &[QualifyingEntry]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..qualifying.len()).collect();
    order.sort_by(|&a, &b| match (qualifying[a].time_s, qualifying[b].time_s) {
        (Some(x), Some(y)) => x.total_cmp(&y).then(a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(&b),
    });
    let mut grid = vec![0; qualifying.len()];
    for (slot, idx) in order.into_iter().enumerate() {
        grid[idx] = slot + 1;
    }
    grid
}

/// Driver records for `track`: the configured qualifying grid, restricted to
/// drivers that appear in the lap data.
pub fn build_driver_records(
    config: &Config,
    track: &str,
    laps: &[LapRecord],
) -> Result<Vec<DriverRecord>, FeatureError> {
    let info = config
        .track(track)
        .ok_or_else(|| FeatureError::UnknownTrack(track.to_string()))?;
    let sectors = aggregate_sectors(laps);
    let present: BTreeSet<&str> = laps.iter().map(|l| l.driver.as_str()).collect();
    let grid = grid_positions(&info.qualifying);

    let mut records = Vec::with_capacity(info.qualifying.len());
    for (idx, entry) in info.qualifying.iter().enumerate() {
        let code = entry.driver.as_str();
        if !present.contains(code) {
            tracing::debug!("{} has no laps in this session; skipped", code);
            continue;
        }
        let (full_name, team) = match config.driver(code) {
            Some(d) => (d.full_name.clone(), d.team.clone()),
            None => (code.to_string(), "Unknown".to_string()),
        };
        records.push(DriverRecord {
            code: code.to_string(),
            full_name,
            team,
            grid_position: grid[idx],
            qualifying_time: entry.time_s,
            clean_air_race_pace: info.clean_air_race_pace.get(code).copied(),
            average_position_change: info.average_position_change.get(code).copied(),
            sector_times: sectors.get(code).copied(),
        });
    }
    Ok(records)
}

pub fn feature_vector(
    record: &DriverRecord,
    weather: &WeatherSnapshot,
    config: &Config,
) -> FeatureVector {
    [
        record.qualifying_time,
        Some(weather.rain_probability),
        Some(weather.temperature_c),
        config.team_performance_score(&record.team),
        record.clean_air_race_pace,
        record.average_position_change,
        record.sector_times.map(|s| s.total()),
    ]
}

/// One row per record, in record order.
pub fn build_feature_table(
    records: &[DriverRecord],
    weather: &WeatherSnapshot,
    config: &Config,
) -> FeatureTable {
    let mut table = FeatureTable::new();
    for r in records {
        table.push(DriverIdentity::from(r), feature_vector(r, weather, config));
    }
    table
}

/// Mean lap time per record; drivers without laps get the mean over drivers.
pub fn build_targets(records: &[DriverRecord], laps: &[LapRecord]) -> Vec<f64> {
    let avg = average_lap_times(laps);
    let overall = if avg.is_empty() {
        0.0
    } else {
        avg.values().sum::<f64>() / avg.len() as f64
    };
    records
        .iter()
        .map(|r| avg.get(&r.code).copied().unwrap_or(overall))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::fallback_laps;

    fn weather() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: 25.0,
            rain_probability: 0.0,
        }
    }

    #[test]
    fn one_row_per_record_even_with_gaps() {
        let cfg = Config::builtin().unwrap();
        let laps = fallback_laps();
        let records = build_driver_records(&cfg, "monaco", &laps).unwrap();
        assert_eq!(records.len(), 13);

        let table = build_feature_table(&records, &weather(), &cfg);
        assert_eq!(table.len(), records.len());

        // RUS has no Monaco qualifying time, ALB/GAS no clean-air pace.
        let rus = table
            .identities()
            .iter()
            .position(|i| i.code == "RUS")
            .unwrap();
        assert!(table.rows()[rus][0].is_none());
        let gas = table
            .identities()
            .iter()
            .position(|i| i.code == "GAS")
            .unwrap();
        assert!(table.rows()[gas][4].is_none());
    }

    #[test]
    fn drivers_without_laps_are_dropped() {
        let cfg = Config::builtin().unwrap();
        let laps: Vec<LapRecord> = fallback_laps()
            .into_iter()
            .filter(|l| l.driver != "HAM")
            .collect();
        let records = build_driver_records(&cfg, "mexico", &laps).unwrap();
        assert_eq!(records.len(), 12);
        assert!(records.iter().all(|r| r.code != "HAM"));
        // grid positions still refer to the full grid
        let str_ = records.iter().find(|r| r.code == "STR").unwrap();
        assert_eq!(str_.grid_position, 13);
    }

    #[test]
    fn feature_vector_layout() {
        let cfg = Config::builtin().unwrap();
        let laps = fallback_laps();
        let records = build_driver_records(&cfg, "mexico", &laps).unwrap();
        let ver = &records[0];
        let row = feature_vector(ver, &weather(), &cfg);
        assert_eq!(row[0], Some(71.350));
        assert_eq!(row[1], Some(0.0));
        assert_eq!(row[2], Some(25.0));
        assert_eq!(row[3], Some(131.0 / 279.0));
        assert_eq!(row[4], Some(74.800));
        assert_eq!(row[5], Some(-0.5));
        assert!(row[6].unwrap() > 60.0);
        assert_eq!(FEATURE_NAMES.len(), row.len());
    }

    #[test]
    fn grid_follows_qualifying_times() {
        let cfg = Config::builtin().unwrap();
        let records = build_driver_records(&cfg, "mexico", &fallback_laps()).unwrap();
        let grid = |code: &str| {
            records
                .iter()
                .find(|r| r.code == code)
                .map(|r| r.grid_position)
                .unwrap()
        };
        assert_eq!(grid("VER"), 1);
        assert_eq!(grid("LEC"), 2);
        assert_eq!(grid("NOR"), 3);
        assert_eq!(grid("STR"), 13);

        let tied = crate::report::rank(
            &records.iter().map(DriverIdentity::from).collect::<Vec<_>>(),
            &vec![75.0; records.len()],
        );
        let codes: Vec<&str> = tied.iter().map(|r| r.identity.code.as_str()).collect();
        assert_eq!(&codes[..3], &["VER", "LEC", "NOR"]);
    }

    #[test]
    fn missing_time_starts_last() {
        let cfg = Config::builtin().unwrap();
        let records = build_driver_records(&cfg, "monaco", &fallback_laps()).unwrap();
        let rus = records.iter().find(|r| r.code == "RUS").unwrap();
        assert_eq!(rus.grid_position, 13);
        let nor = records.iter().find(|r| r.code == "NOR").unwrap();
        assert_eq!(nor.grid_position, 1);
    }

    #[test]
    fn equal_times_keep_configured_order() {
        let entries: Vec<QualifyingEntry> = [("AAA", Some(80.0)), ("BBB", None), ("CCC", Some(80.0))]
            .iter()
            .map(|(d, t)| QualifyingEntry {
                driver: d.to_string(),
                time_s: *t,
            })
            .collect();
        assert_eq!(grid_positions(&entries), vec![1, 3, 2]);
    }

    #[test]
    fn unknown_track_is_an_error() {
        let cfg = Config::builtin().unwrap();
        let err = build_driver_records(&cfg, "spa", &fallback_laps()).unwrap_err();
        assert!(matches!(err, FeatureError::UnknownTrack(_)));
    }

    #[test]
    fn targets_are_mean_lap_times() {
        let cfg = Config::builtin().unwrap();
        let laps = fallback_laps();
        let records = build_driver_records(&cfg, "mexico", &laps).unwrap();
        let targets = build_targets(&records, &laps);
        assert_eq!(targets.len(), records.len());
        let ver: Vec<f64> = laps
            .iter()
            .filter(|l| l.driver == "VER")
            .map(|l| l.lap_time)
            .collect();
        let expected = ver.iter().sum::<f64>() / ver.len() as f64;
        assert!((targets[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn select_keeps_rows_and_identities_together() {
        let cfg = Config::builtin().unwrap();
        let laps = fallback_laps();
        let records = build_driver_records(&cfg, "mexico", &laps).unwrap();
        let table = build_feature_table(&records, &weather(), &cfg);
        let sub = table.select(&[2, 0]);
        assert_eq!(sub.identities()[0].code, "PIA");
        assert_eq!(sub.rows()[0], table.rows()[2]);
        assert_eq!(sub.identities()[1].code, "VER");
        assert_eq!(sub.rows()[1], table.rows()[0]);
    }
}
