//! One prediction run: load inputs, build features, train every requested
//! family and rank the drivers with each model.

use crate::config::Config;
use crate::error::{FeatureError, TrainError};
use crate::features::{build_driver_records, build_feature_table, build_targets, FeatureTable};
use crate::loader::{load_session, SessionCache, SessionProvider};
use crate::model::ModelFamily;
use crate::report::{rank, RankedPrediction};
use crate::trainer::{train_and_evaluate, Evaluation};
use crate::types::{Provenance, SessionType, Sourced, WeatherSnapshot};
use crate::weather::{fetch_weather, WeatherProvider};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub track: String,
    pub year: u16,
    pub round: u8,
    pub session: SessionType,
    /// Families to train, in report order; empty means all of them.
    pub families: Vec<ModelFamily>,
}

#[derive(Debug)]
pub struct FamilyResult {
    pub evaluation: Evaluation,
    /// Predictions for every row of the feature table, in table order.
    pub fitted: Vec<f64>,
    pub ranking: Vec<RankedPrediction>,
}

#[derive(Debug)]
pub struct FamilyOutcome {
    pub family: ModelFamily,
    pub result: Result<FamilyResult, TrainError>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub options: RunOptions,
    pub session: Provenance,
    pub lap_count: usize,
    pub weather: Sourced<WeatherSnapshot>,
    pub table: FeatureTable,
    pub targets: Vec<f64>,
    pub families: Vec<FamilyOutcome>,
}

impl RunOutcome {
    /// Outcome of `family`, if it was requested.
    pub fn family(&self, family: ModelFamily) -> Option<&FamilyOutcome> {
        self.families.iter().find(|f| f.family == family)
    }
}

fn requested_families(requested: &[ModelFamily]) -> Vec<ModelFamily> {
    if requested.is_empty() {
        return ModelFamily::ALL.to_vec();
    }
    let mut out: Vec<ModelFamily> = Vec::with_capacity(requested.len());
    for f in requested {
        if !out.contains(f) {
            out.push(*f);
        }
    }
    out
}

fn run_family(
    config: &Config,
    table: &FeatureTable,
    targets: &[f64],
    family: ModelFamily,
) -> Result<FamilyResult, TrainError> {
    let evaluation = train_and_evaluate(table, targets, family, &config.models)?;
    let fitted = evaluation.model.predict(table.rows())?;
    let ranking = rank(table.identities(), &fitted);
    Ok(FamilyResult {
        evaluation,
        fitted,
        ranking,
    })
}

/// Execute one run.
///
/// Provider failures never abort the run; they show up as fallback
/// provenance. A family that cannot be trained is reported in its
/// [`FamilyOutcome`] while the others continue.
pub async fn run<S, W>(
    config: &Config,
    options: RunOptions,
    sessions: &S,
    weather: &W,
    cache: Option<&SessionCache>,
) -> Result<RunOutcome, FeatureError>
where
    S: SessionProvider + ?Sized,
    W: WeatherProvider + ?Sized,
{
    if config.track(&options.track).is_none() {
        return Err(FeatureError::UnknownTrack(options.track.clone()));
    }

    let (laps, forecast) = tokio::join!(
        load_session(sessions, cache, options.year, options.round, options.session),
        fetch_weather(weather, &options.track, &config.weather),
    );

    let records = build_driver_records(config, &options.track, &laps.value)?;
    let table = build_feature_table(&records, &forecast.value, config);
    let targets = build_targets(&records, &laps.value);
    tracing::info!(
        "built {} feature rows from {} laps for {}",
        table.len(),
        laps.value.len(),
        options.track
    );

    let families = requested_families(&options.families)
        .into_iter()
        .map(|family| {
            let result = run_family(config, &table, &targets, family);
            if let Err(e) = &result {
                tracing::warn!("{} not trained: {}", family, e);
            }
            FamilyOutcome { family, result }
        })
        .collect();

    Ok(RunOutcome {
        options,
        session: laps.provenance,
        lap_count: laps.value.len(),
        weather: forecast,
        table,
        targets,
        families,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_means_every_family() {
        assert_eq!(requested_families(&[]), ModelFamily::ALL.to_vec());
    }

    #[test]
    fn duplicate_families_run_once() {
        let got = requested_families(&[
            ModelFamily::RandomForest,
            ModelFamily::DecisionTree,
            ModelFamily::RandomForest,
        ]);
        assert_eq!(got, vec![ModelFamily::RandomForest, ModelFamily::DecisionTree]);
    }
}
