use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use super::{depth, Matrix};
use crate::config::{ForestParams, TreeSettings};
use crate::error::TrainError;

pub type Tree = DecisionTreeRegressor<f64, f64, Matrix, Vec<f64>>;
pub type Forest = RandomForestRegressor<f64, f64, Matrix, Vec<f64>>;

/// A single CART tree; every feature is a split candidate at every node.
pub fn fit_tree(x: &Matrix, y: &[f64], params: &TreeSettings, seed: u64) -> Result<Tree, TrainError> {
    let p = DecisionTreeRegressorParameters {
        max_depth: Some(depth(params.max_depth)),
        min_samples_leaf: 1,
        min_samples_split: params.min_samples_split,
        seed: Some(seed),
    };
    Ok(DecisionTreeRegressor::fit(x, &y.to_vec(), p)?)
}

/// Bootstrap-aggregated trees. All `n_features` columns are considered at
/// each split, so only the bootstrap draw varies between trees.
pub fn fit_forest(
    x: &Matrix,
    y: &[f64],
    n_features: usize,
    params: &ForestParams,
    seed: u64,
) -> Result<Forest, TrainError> {
    let p = RandomForestRegressorParameters {
        max_depth: Some(depth(params.max_depth)),
        min_samples_leaf: 1,
        min_samples_split: params.min_samples_split,
        n_trees: params.n_estimators.max(1),
        m: Some(n_features.max(1)),
        keep_samples: false,
        seed,
    };
    Ok(RandomForestRegressor::fit(x, &y.to_vec(), p)?)
}
