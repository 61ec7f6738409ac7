//! End-to-end runs of the prediction pipeline against fake providers.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use async_trait::async_trait;

use race_predictor::config::Config;
use race_predictor::error::{DataUnavailable, FeatureError, TrainError, WeatherUnavailable};
use race_predictor::loader::{fallback_laps, load_session, OfflineSessions, SessionProvider};
use race_predictor::model::ModelFamily;
use race_predictor::pipeline::{run, RunOptions, RunOutcome};
use race_predictor::report::{self, podium, rank};
use race_predictor::types::{DriverIdentity, LapRecord, Provenance, SessionType, WeatherSnapshot};
use race_predictor::weather::{OfflineWeather, WeatherProvider};

struct FixedSessions(Vec<LapRecord>);

#[async_trait]
impl SessionProvider for FixedSessions {
    async fn fetch_laps(
        &self,
        _year: u16,
        _round: u8,
        _session: SessionType,
    ) -> Result<Vec<LapRecord>, DataUnavailable> {
        Ok(self.0.clone())
    }
}

struct FixedWeather(WeatherSnapshot);

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn fetch(&self, _track: &str) -> Result<WeatherSnapshot, WeatherUnavailable> {
        Ok(self.0)
    }
}

struct BrokenWeather;

#[async_trait]
impl WeatherProvider for BrokenWeather {
    async fn fetch(&self, _track: &str) -> Result<WeatherSnapshot, WeatherUnavailable> {
        Err(WeatherUnavailable::Api("503 Service Unavailable".into()))
    }
}

fn options(track: &str, families: &[ModelFamily]) -> RunOptions {
    RunOptions {
        track: track.into(),
        year: 2024,
        round: 20,
        session: SessionType::Race,
        families: families.to_vec(),
    }
}

fn ranking_codes(outcome: &RunOutcome, family: ModelFamily) -> Vec<String> {
    let result = outcome
        .family(family)
        .expect("family requested")
        .result
        .as_ref()
        .expect("family trained");
    result
        .ranking
        .iter()
        .map(|r| r.identity.code.clone())
        .collect()
}

#[tokio::test]
async fn test_offline_run_is_deterministic() {
    println!("\n=== Test: Offline Run Is Deterministic ===");
    let cfg = Config::builtin().unwrap();
    let families = [ModelFamily::GradientBoosting];

    let first = run(&cfg, options("mexico", &families), &OfflineSessions, &OfflineWeather, None)
        .await
        .unwrap();
    let second = run(&cfg, options("mexico", &families), &OfflineSessions, &OfflineWeather, None)
        .await
        .unwrap();

    assert!(first.session.is_fallback());
    assert!(first.weather.provenance.is_fallback());
    assert_eq!(first.lap_count, 39);
    assert_eq!(first.table.len(), 13);

    let a = ranking_codes(&first, ModelFamily::GradientBoosting);
    let b = ranking_codes(&second, ModelFamily::GradientBoosting);
    assert_eq!(a, b);
    assert_eq!(a.len(), 13);
    println!("✓ Same ranking on both runs: {:?}", &a[..3]);
}

#[tokio::test]
async fn test_weather_failure_uses_defaults() {
    println!("\n=== Test: Weather Failure Uses Defaults ===");
    let cfg = Config::builtin().unwrap();
    let outcome = run(
        &cfg,
        options("mexico", &[ModelFamily::DecisionTree]),
        &FixedSessions(fallback_laps()),
        &BrokenWeather,
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.session, Provenance::Live);
    assert_eq!(outcome.weather.value.temperature_c, 25.0);
    assert_eq!(outcome.weather.value.rain_probability, 0.0);
    match &outcome.weather.provenance {
        Provenance::Fallback { reason } => assert!(reason.contains("503")),
        other => panic!("expected fallback, got {other:?}"),
    }
    for row in outcome.table.rows() {
        assert_eq!(row[1], Some(0.0));
        assert_eq!(row[2], Some(25.0));
    }
    println!("✓ Defaults 25.0°C / 0.0 rain applied to every row");
}

#[tokio::test]
async fn test_live_weather_reaches_features() {
    println!("\n=== Test: Live Weather Reaches Features ===");
    let cfg = Config::builtin().unwrap();
    let snapshot = WeatherSnapshot {
        temperature_c: 18.5,
        rain_probability: 0.6,
    };
    let outcome = run(
        &cfg,
        options("Monaco", &[ModelFamily::RandomForest]),
        &OfflineSessions,
        &FixedWeather(snapshot),
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.weather.provenance, Provenance::Live);
    assert!(outcome.table.rows().iter().all(|r| r[1] == Some(0.6) && r[2] == Some(18.5)));
    assert_eq!(report::provenance_warnings(&outcome).len(), 1);
    println!("✓ Forecast copied into {} rows", outcome.table.len());
}

#[tokio::test]
async fn test_loader_never_returns_empty() {
    println!("\n=== Test: Loader Never Returns Empty ===");
    let empty = load_session(&FixedSessions(Vec::new()), None, 2024, 20, SessionType::Race).await;
    assert!(!empty.value.is_empty());
    assert!(empty.provenance.is_fallback());

    let offline = load_session(&OfflineSessions, None, 2024, 20, SessionType::Qualifying).await;
    assert_eq!(offline.value, fallback_laps());
    println!("✓ Fallback dataset served ({} laps)", offline.value.len());
}

#[tokio::test]
async fn test_too_few_drivers_trains_nothing() {
    println!("\n=== Test: Too Few Drivers Trains Nothing ===");
    let cfg = Config::builtin().unwrap();
    let laps: Vec<LapRecord> = fallback_laps()
        .into_iter()
        .filter(|l| ["VER", "NOR", "LEC"].contains(&l.driver.as_str()))
        .collect();

    let outcome = run(
        &cfg,
        options("mexico", &[]),
        &FixedSessions(laps),
        &OfflineWeather,
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.table.len(), 3);
    assert_eq!(outcome.families.len(), ModelFamily::ALL.len());
    for f in &outcome.families {
        assert_eq!(
            f.result.as_ref().unwrap_err(),
            &TrainError::InsufficientData {
                rows: 3,
                required: 5
            }
        );
    }
    let text = report::render_text(&outcome, false);
    assert!(text.contains("No model trained"));
    println!("✓ Every family reported InsufficientData");
}

#[tokio::test]
async fn test_unknown_track_aborts() {
    println!("\n=== Test: Unknown Track Aborts ===");
    let cfg = Config::builtin().unwrap();
    let err = run(&cfg, options("spa", &[]), &OfflineSessions, &OfflineWeather, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureError::UnknownTrack(ref t) if t == "spa"));
    println!("✓ {}", err);
}

#[tokio::test]
async fn test_every_family_produces_a_report() {
    println!("\n=== Test: Every Family Produces A Report ===");
    let cfg = Config::builtin().unwrap();
    let outcome = run(&cfg, options("mexico", &[]), &OfflineSessions, &OfflineWeather, None)
        .await
        .unwrap();

    for family in ModelFamily::ALL {
        let codes = ranking_codes(&outcome, family);
        assert_eq!(codes.len(), 13, "{family}");
        let result = outcome.family(family).unwrap().result.as_ref().unwrap();
        assert!(result.evaluation.held_out);
        assert_eq!(result.evaluation.metrics.samples, 4);
        assert_eq!(result.fitted.len(), outcome.table.len());
    }

    let text = report::render_text(&outcome, true);
    assert!(text.contains("🥇 P1:"));
    assert!(text.contains("Model comparison"));
    assert!(text.contains("Feature importance:"));
    assert!(text.contains("Predicted (s)"));
    assert!(text.contains("Actual (s)"));
    assert!(text.contains("Session data unavailable"));

    let json: serde_json::Value = serde_json::from_str(&report::render_json(&outcome).unwrap()).unwrap();
    assert_eq!(json["models"].as_array().unwrap().len(), 4);
    assert_eq!(json["session_data"]["source"], "fallback");
    assert_eq!(json["models"][1]["family"], "lightgbm");
    assert_eq!(json["models"][0]["podium"].as_array().unwrap().len(), 3);
    println!("✓ Text and JSON reports rendered ({} chars)", text.len());
}

#[test]
fn test_podium_order() {
    println!("\n=== Test: Podium Order ===");
    let ids: Vec<DriverIdentity> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, c)| DriverIdentity {
            code: c.to_string(),
            full_name: format!("Driver {c}"),
            team: "Team".into(),
            grid_position: 3 - i,
        })
        .collect();
    let ranked = rank(&ids, &[74.8, 74.9, 75.1]);
    let top: Vec<&str> = podium(&ranked).iter().map(|r| r.identity.code.as_str()).collect();
    assert_eq!(top, vec!["A", "B", "C"]);
    println!("✓ Podium {:?}", top);
}
