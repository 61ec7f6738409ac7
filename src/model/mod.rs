//! Regression model families trained on imputed feature rows.

pub mod boosting;
pub mod importance;
pub mod trees;

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;

use crate::config::ModelDefaults;
use crate::error::TrainError;
use boosting::{fit_gradient_boosting, Booster, HistogramBoosting};
use trees::{fit_forest, fit_tree, Forest, Tree};

pub type Matrix = DenseMatrix<f64>;

/// Depth limit as the learners take it.
fn depth(max_depth: usize) -> u16 {
    u16::try_from(max_depth).unwrap_or(u16::MAX)
}

fn dense(x: &[Vec<f64>]) -> Result<Matrix, TrainError> {
    Ok(DenseMatrix::from_2d_vec(&x.to_vec())?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    GradientBoosting,
    #[value(name = "lightgbm")]
    #[serde(rename = "lightgbm")]
    LightGbm,
    DecisionTree,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::GradientBoosting,
        ModelFamily::LightGbm,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ModelFamily::GradientBoosting => "Gradient Boosting",
            ModelFamily::LightGbm => "LightGBM",
            ModelFamily::DecisionTree => "Decision Tree",
            ModelFamily::RandomForest => "Random Forest",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug)]
enum Learner {
    GradientBoosting(Booster),
    LightGbm(HistogramBoosting),
    DecisionTree(Tree),
    RandomForest(Forest),
}

/// A fitted model of one family, with permutation importances measured on
/// its training rows.
#[derive(Debug)]
pub struct Regressor {
    learner: Learner,
    importances: Vec<f64>,
}

impl Regressor {
    /// Fit `family` on dense rows with the configured hyperparameters.
    pub fn fit(
        family: ModelFamily,
        x: &[Vec<f64>],
        y: &[f64],
        defaults: &ModelDefaults,
    ) -> Result<Self, TrainError> {
        tracing::info!("training {} regressor on {} rows", family, y.len());
        let seed = defaults.random_state;
        let learner = match family {
            ModelFamily::GradientBoosting => Learner::GradientBoosting(fit_gradient_boosting(
                &dense(x)?,
                y,
                &defaults.gradient_boosting,
                seed,
            )?),
            ModelFamily::LightGbm => {
                Learner::LightGbm(HistogramBoosting::fit(x, y, &defaults.lightgbm, seed)?)
            }
            ModelFamily::DecisionTree => {
                Learner::DecisionTree(fit_tree(&dense(x)?, y, &defaults.decision_tree, seed)?)
            }
            ModelFamily::RandomForest => {
                let n_features = x.first().map_or(0, |r| r.len());
                Learner::RandomForest(fit_forest(
                    &dense(x)?,
                    y,
                    n_features,
                    &defaults.random_forest,
                    seed,
                )?)
            }
        };

        let mut model = Regressor {
            learner,
            importances: Vec::new(),
        };
        let importances = importance::permutation_importances(x, y, seed, |rows| model.predict(rows))?;
        model.importances = importances;
        Ok(model)
    }

    pub fn family(&self) -> ModelFamily {
        match self.learner {
            Learner::GradientBoosting(_) => ModelFamily::GradientBoosting,
            Learner::LightGbm(_) => ModelFamily::LightGbm,
            Learner::DecisionTree(_) => ModelFamily::DecisionTree,
            Learner::RandomForest(_) => ModelFamily::RandomForest,
        }
    }

    /// One prediction per dense row.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainError> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        match &self.learner {
            Learner::GradientBoosting(m) => Ok(m.predict(&dense(x)?)?),
            Learner::LightGbm(m) => m.predict(x),
            Learner::DecisionTree(m) => Ok(m.predict(&dense(x)?)?),
            Learner::RandomForest(m) => Ok(m.predict(&dense(x)?)?),
        }
    }

    /// Normalised to sum to 1; all zeros when no feature moved the error.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}
