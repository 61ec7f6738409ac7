use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::xgboost::{XGRegressor, XGRegressorParameters};

use super::{depth, Matrix};
use crate::config::{BoostingParams, HistogramParams};
use crate::error::TrainError;

pub type Booster = XGRegressor<f64, f64, Matrix, Vec<f64>>;

fn mean(y: &[f64]) -> f64 {
    if y.is_empty() {
        0.0
    } else {
        y.iter().sum::<f64>() / y.len() as f64
    }
}

/// Squared-error boosting starting from the target mean. Child nodes need at
/// least `min_child_weight` rows (unit hessians).
fn booster_params(
    y: &[f64],
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    min_child_weight: usize,
    seed: u64,
) -> XGRegressorParameters {
    XGRegressorParameters::default()
        .with_n_estimators(n_estimators)
        .with_learning_rate(learning_rate)
        .with_max_depth(depth(max_depth))
        .with_min_child_weight(min_child_weight.max(1))
        .with_lambda(0.0)
        .with_base_score(mean(y))
        .with_seed(seed)
}

// ---------- Depth-wise gradient boosting ----------

pub fn fit_gradient_boosting(
    x: &Matrix,
    y: &[f64],
    params: &BoostingParams,
    seed: u64,
) -> Result<Booster, TrainError> {
    let p = booster_params(
        y,
        params.n_estimators,
        params.learning_rate,
        params.max_depth,
        params.min_samples_leaf,
        seed,
    );
    Ok(XGRegressor::fit(x, &y.to_vec(), p)?)
}

// ---------- Histogram boosting ----------

/// Per-feature bin upper bounds; value `v` falls in the first bin whose bound
/// is `>= v`, or the last bin when it exceeds every bound.
#[derive(Debug, Clone)]
pub struct BinMapper {
    bounds: Vec<f64>,
}

impl BinMapper {
    pub fn fit(values: &[f64], max_bin: usize) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mut distinct = sorted.clone();
        distinct.dedup();

        let bounds = if distinct.len() <= max_bin {
            distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
        } else {
            let n = sorted.len();
            let mut bounds: Vec<f64> = (1..max_bin)
                .filter_map(|b| {
                    let i = b * n / max_bin;
                    (i > 0 && i < n && sorted[i - 1] < sorted[i])
                        .then(|| (sorted[i - 1] + sorted[i]) / 2.0)
                })
                .collect();
            bounds.dedup();
            bounds
        };
        Self { bounds }
    }

    pub fn n_bins(&self) -> usize {
        self.bounds.len() + 1
    }

    pub fn bin(&self, v: f64) -> usize {
        self.bounds.partition_point(|b| *b < v)
    }
}

/// Gradient boosting over histogram-binned features, in the manner of
/// LightGBM: every column is quantised into at most `max_bin` buckets fitted
/// on the training rows, and the trees only ever see bucket indices.
#[derive(Debug)]
pub struct HistogramBoosting {
    mappers: Vec<BinMapper>,
    booster: Booster,
}

impl HistogramBoosting {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        params: &HistogramParams,
        seed: u64,
    ) -> Result<Self, TrainError> {
        let n_features = x.first().map_or(0, |r| r.len());
        let mappers: Vec<BinMapper> = (0..n_features)
            .map(|f| {
                let col: Vec<f64> = x.iter().map(|r| r[f]).collect();
                BinMapper::fit(&col, params.max_bin)
            })
            .collect();
        let binned = bin_rows(&mappers, x)?;
        let p = booster_params(
            y,
            params.n_estimators,
            params.learning_rate,
            params.max_depth,
            params.min_data_in_leaf,
            seed,
        );
        let booster = XGRegressor::fit(&binned, &y.to_vec(), p)?;
        Ok(Self { mappers, booster })
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainError> {
        Ok(self.booster.predict(&bin_rows(&self.mappers, x)?)?)
    }
}

fn bin_rows(mappers: &[BinMapper], x: &[Vec<f64>]) -> Result<Matrix, TrainError> {
    let binned: Vec<Vec<f64>> = x
        .iter()
        .map(|r| r.iter().zip(mappers).map(|(v, m)| m.bin(*v) as f64).collect())
        .collect();
    Ok(DenseMatrix::from_2d_vec(&binned)?)
}
