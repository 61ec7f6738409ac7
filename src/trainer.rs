use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::config::ModelDefaults;
use crate::error::TrainError;
use crate::features::{FeatureTable, FeatureVector, FEATURE_NAMES};
use crate::imputer::MedianImputer;
use crate::metrics::Metrics;
use crate::model::{ModelFamily, Regressor};

/// A fitted regressor together with the imputer fitted on its training rows.
#[derive(Debug)]
pub struct TrainedModel {
    pub family: ModelFamily,
    pub regressor: Regressor,
    pub imputer: MedianImputer,
    pub training_rows: usize,
}

impl TrainedModel {
    /// Predict with the training-time imputer applied to `rows`.
    pub fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, TrainError> {
        self.regressor.predict(&self.imputer.transform(rows))
    }

    pub fn feature_importances(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.regressor.feature_importances().iter().copied())
            .collect()
    }
}

#[derive(Debug)]
pub struct Evaluation {
    pub model: TrainedModel,
    pub metrics: Metrics,
    /// False when the split left no rows for testing and metrics are in-sample.
    pub held_out: bool,
}

fn check_shape(rows: usize, targets: usize) -> Result<(), TrainError> {
    if rows != targets {
        return Err(TrainError::ShapeMismatch { rows, targets });
    }
    Ok(())
}

fn fit(
    rows: &[FeatureVector],
    targets: &[f64],
    family: ModelFamily,
    defaults: &ModelDefaults,
) -> Result<TrainedModel, TrainError> {
    let imputer = MedianImputer::fit(rows);
    let x = imputer.transform(rows);
    let regressor = Regressor::fit(family, &x, targets, defaults)?;
    Ok(TrainedModel {
        family,
        regressor,
        imputer,
        training_rows: rows.len(),
    })
}

/// Fit `family` on every row.
///
/// Fails with [`TrainError::InsufficientData`] below `min_training_rows`.
pub fn train(
    rows: &[FeatureVector],
    targets: &[f64],
    family: ModelFamily,
    defaults: &ModelDefaults,
) -> Result<TrainedModel, TrainError> {
    check_shape(rows.len(), targets.len())?;
    if rows.len() < defaults.min_training_rows {
        return Err(TrainError::InsufficientData {
            rows: rows.len(),
            required: defaults.min_training_rows,
        });
    }
    fit(rows, targets, family, defaults)
}

pub fn evaluate(
    model: &TrainedModel,
    rows: &[FeatureVector],
    targets: &[f64],
) -> Result<Metrics, TrainError> {
    Ok(Metrics::compute(targets, &model.predict(rows)?))
}

/// Shuffle `0..n` with `seed` and cut off `ceil(n * test_size)` test indices.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    idx.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n.saturating_sub(1));
    let test = idx.split_off(n - n_test);
    (idx, test)
}

/// Train on a seeded split of `table` and score on the held-out part.
///
/// The row-count check applies to the whole table, before splitting.
pub fn train_and_evaluate(
    table: &FeatureTable,
    targets: &[f64],
    family: ModelFamily,
    defaults: &ModelDefaults,
) -> Result<Evaluation, TrainError> {
    check_shape(table.len(), targets.len())?;
    if table.len() < defaults.min_training_rows {
        return Err(TrainError::InsufficientData {
            rows: table.len(),
            required: defaults.min_training_rows,
        });
    }

    let (train_idx, test_idx) = train_test_split(table.len(), defaults.test_size, defaults.random_state);
    let pick = |idx: &[usize]| -> (Vec<FeatureVector>, Vec<f64>) {
        (
            idx.iter().map(|&i| table.rows()[i]).collect(),
            idx.iter().map(|&i| targets[i]).collect(),
        )
    };
    let (x_train, y_train) = pick(&train_idx);
    let model = fit(&x_train, &y_train, family, defaults)?;

    let (metrics, held_out) = if test_idx.is_empty() {
        (evaluate(&model, &x_train, &y_train)?, false)
    } else {
        let (x_test, y_test) = pick(&test_idx);
        (evaluate(&model, &x_test, &y_test)?, true)
    };

    tracing::info!(
        "{} evaluation ({} rows, {}): MAE={:.3}s RMSE={:.3}s R2={:.3}",
        family,
        metrics.samples,
        if held_out { "held-out" } else { "in-sample" },
        metrics.mae,
        metrics.rmse,
        metrics.r2
    );

    Ok(Evaluation {
        model,
        metrics,
        held_out,
    })
}
