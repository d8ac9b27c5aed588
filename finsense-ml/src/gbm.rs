//! Gradient-boosted regression over squared loss.
//!
//! Plain residual boosting: each round fits a depth-limited tree to the
//! current residuals on a row/feature subsample, and the ensemble adds
//! `learning_rate * leaf`. Validation RMSE is tracked every round; training
//! stops once it has not improved for `early_stopping_rounds` rounds, and
//! the ensemble is cut back to its best round.

use crate::frame::NUM_FEATURES;
use crate::metrics;
use crate::tree::{TreeNode, TreeParams};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("validation set is empty")]
    EmptyValidationSet,

    #[error("model file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("model file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model was trained on {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },
}

/// Boosting hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmParams {
    pub learning_rate: f64,
    /// Upper bound on boosting rounds.
    pub max_rounds: usize,
    /// Stop after this many rounds without a validation improvement.
    pub early_stopping_rounds: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row fraction sampled per tree, without replacement.
    pub subsample: f64,
    /// Feature fraction sampled per tree.
    pub colsample: f64,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            max_rounds: 1000,
            early_stopping_rounds: 50,
            max_depth: 5,
            min_samples_leaf: 5,
            subsample: 0.8,
            colsample: 0.9,
            seed: 42,
        }
    }
}

/// A trained boosted ensemble, JSON-persistable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmModel {
    pub params: GbmParams,
    pub feature_names: Vec<String>,
    /// Mean train label; the ensemble's starting prediction.
    pub base_value: f64,
    /// Trees up to and including the best validation round.
    pub trees: Vec<TreeNode>,
    pub rounds_trained: usize,
    pub best_val_rmse: f64,
}

impl GbmModel {
    /// Fit with early stopping against a held-out validation set.
    pub fn fit(
        train_x: &[[f64; NUM_FEATURES]],
        train_y: &[f64],
        val_x: &[[f64; NUM_FEATURES]],
        val_y: &[f64],
        feature_names: Vec<String>,
        params: GbmParams,
    ) -> Result<Self, ModelError> {
        if train_x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if val_x.is_empty() {
            return Err(ModelError::EmptyValidationSet);
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = train_x.len();
        let base_value = train_y.iter().sum::<f64>() / n as f64;

        let mut pred_train = vec![base_value; n];
        let mut pred_val = vec![base_value; val_x.len()];
        let mut residuals = vec![0.0; n];

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
        };
        let sample_rows = ((params.subsample * n as f64) as usize).clamp(1, n);
        let sample_cols = ((params.colsample * NUM_FEATURES as f64).ceil() as usize)
            .clamp(1, NUM_FEATURES);

        let mut trees: Vec<TreeNode> = Vec::new();
        let mut best_rmse = metrics::rmse(val_y, &pred_val);
        let mut best_rounds = 0;
        let mut stale = 0;

        for round in 0..params.max_rounds {
            for i in 0..n {
                residuals[i] = train_y[i] - pred_train[i];
            }

            let sample: Vec<usize> = rand::seq::index::sample(&mut rng, n, sample_rows).into_vec();
            let mut features: Vec<usize> =
                rand::seq::index::sample(&mut rng, NUM_FEATURES, sample_cols).into_vec();
            features.sort_unstable();

            let tree = TreeNode::fit(train_x, &residuals, &sample, &features, tree_params);

            for (i, x) in train_x.iter().enumerate() {
                pred_train[i] += params.learning_rate * tree.predict(x);
            }
            for (i, x) in val_x.iter().enumerate() {
                pred_val[i] += params.learning_rate * tree.predict(x);
            }
            trees.push(tree);

            let val_rmse = metrics::rmse(val_y, &pred_val);
            if val_rmse < best_rmse {
                best_rmse = val_rmse;
                best_rounds = round + 1;
                stale = 0;
            } else {
                stale += 1;
                if stale >= params.early_stopping_rounds {
                    break;
                }
            }
        }

        let rounds_trained = trees.len();
        trees.truncate(best_rounds);
        info!(
            "boosting stopped after {rounds_trained} rounds, best at {best_rounds} \
             (val rmse {best_rmse:.6})"
        );

        Ok(Self {
            params,
            feature_names,
            base_value,
            trees,
            rounds_trained,
            best_val_rmse: best_rmse,
        })
    }

    pub fn predict(&self, x: &[f64; NUM_FEATURES]) -> f64 {
        self.base_value
            + self.params.learning_rate
                * self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }

    pub fn predict_batch(&self, xs: &[[f64; NUM_FEATURES]]) -> Vec<f64> {
        xs.iter().map(|x| self.predict(x)).collect()
    }

    /// Ensemble-wide constant term: base value plus every tree's root mean.
    ///
    /// This is the attribution baseline; per-row contributions measure the
    /// movement away from it.
    pub fn bias(&self) -> f64 {
        self.base_value
            + self.params.learning_rate * self.trees.iter().map(|t| t.value).sum::<f64>()
    }

    /// Per-feature contributions for one row.
    ///
    /// The returned prediction equals `bias() + contribs.sum()` up to
    /// floating-point rounding, and equals [`GbmModel::predict`].
    pub fn predict_with_contributions(
        &self,
        x: &[f64; NUM_FEATURES],
    ) -> (f64, [f64; NUM_FEATURES]) {
        let mut contribs = [0.0; NUM_FEATURES];
        let mut prediction = self.base_value;
        for tree in &self.trees {
            let mut tree_contribs = [0.0; NUM_FEATURES];
            prediction += self.params.learning_rate
                * tree.predict_with_contributions(x, &mut tree_contribs);
            for f in 0..NUM_FEATURES {
                contribs[f] += self.params.learning_rate * tree_contribs[f];
            }
        }
        (prediction, contribs)
    }

    /// Total split gain per feature, in `feature_names` order.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut gains = [0.0; NUM_FEATURES];
        for tree in &self.trees {
            tree.accumulate_gain(&mut gains);
        }
        self.feature_names
            .iter()
            .cloned()
            .zip(gains)
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model: Self = serde_json::from_str(&content)?;
        if model.feature_names.len() != NUM_FEATURES {
            return Err(ModelError::FeatureCountMismatch {
                expected: NUM_FEATURES,
                actual: model.feature_names.len(),
            });
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::NUM_FEATURES;

    fn feature_names() -> Vec<String> {
        (0..NUM_FEATURES).map(|i| format!("f{i}")).collect()
    }

    /// y depends on features 0 and 1 only, with a deterministic wobble.
    fn synthetic(n: usize) -> (Vec<[f64; NUM_FEATURES]>, Vec<f64>) {
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for i in 0..n {
            let a = (i as f64 * 0.37).sin();
            let b = (i as f64 * 0.11).cos();
            xs.push([a, b, (i % 5) as f64, 0.0, (i % 3) as f64]);
            ys.push(0.8 * a - 0.5 * b + 0.01 * (i % 7) as f64);
        }
        (xs, ys)
    }

    fn quick_params() -> GbmParams {
        GbmParams {
            max_rounds: 60,
            early_stopping_rounds: 15,
            max_depth: 3,
            min_samples_leaf: 2,
            ..GbmParams::default()
        }
    }

    #[test]
    fn boosting_beats_the_mean_baseline() {
        let (xs, ys) = synthetic(300);
        let (train_x, val_x) = xs.split_at(240);
        let (train_y, val_y) = ys.split_at(240);

        let model = GbmModel::fit(
            train_x,
            train_y,
            val_x,
            val_y,
            feature_names(),
            quick_params(),
        )
        .unwrap();

        let mean = train_y.iter().sum::<f64>() / train_y.len() as f64;
        let baseline = metrics::rmse(val_y, &vec![mean; val_y.len()]);
        let fitted = metrics::rmse(val_y, &model.predict_batch(val_x));
        assert!(fitted < baseline, "rmse {fitted} not below baseline {baseline}");
        assert!((fitted - model.best_val_rmse).abs() < 1e-9);
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (xs, ys) = synthetic(200);
        let (train_x, val_x) = xs.split_at(160);
        let (train_y, val_y) = ys.split_at(160);

        let a = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();
        let b = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();
        assert_eq!(a.trees, b.trees);
        assert_eq!(a.predict_batch(val_x), b.predict_batch(val_x));
    }

    #[test]
    fn early_stopping_truncates_to_best_round() {
        let (xs, ys) = synthetic(200);
        let (train_x, val_x) = xs.split_at(160);
        let (train_y, val_y) = ys.split_at(160);

        let model = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();
        assert!(model.trees.len() <= model.rounds_trained);
        assert!(model.rounds_trained <= quick_params().max_rounds);
    }

    #[test]
    fn contributions_sum_to_prediction() {
        let (xs, ys) = synthetic(200);
        let (train_x, val_x) = xs.split_at(160);
        let (train_y, val_y) = ys.split_at(160);

        let model = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();
        let bias = model.bias();
        for x in val_x {
            let (prediction, contribs) = model.predict_with_contributions(x);
            let rebuilt = bias + contribs.iter().sum::<f64>();
            assert!((prediction - rebuilt).abs() < 1e-9);
            assert!((prediction - model.predict(x)).abs() < 1e-9);
        }
    }

    #[test]
    fn importance_concentrates_on_signal_features() {
        let (xs, ys) = synthetic(300);
        let (train_x, val_x) = xs.split_at(240);
        let (train_y, val_y) = ys.split_at(240);

        let model = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();
        let importance = model.feature_importance();
        let signal: f64 = importance[0].1 + importance[1].1;
        let noise: f64 = importance[2..].iter().map(|(_, g)| g).sum();
        assert!(signal > noise);
    }

    #[test]
    fn json_roundtrip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let (xs, ys) = synthetic(150);
        let (train_x, val_x) = xs.split_at(120);
        let (train_y, val_y) = ys.split_at(120);
        let model = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names(), quick_params())
            .unwrap();

        model.save(&path).unwrap();
        let loaded = GbmModel::load(&path).unwrap();
        assert_eq!(model.predict_batch(val_x), loaded.predict_batch(val_x));
    }

    #[test]
    fn empty_sets_are_rejected() {
        let (xs, ys) = synthetic(10);
        assert!(matches!(
            GbmModel::fit(&[], &[], &xs, &ys, feature_names(), quick_params()),
            Err(ModelError::EmptyTrainingSet)
        ));
        assert!(matches!(
            GbmModel::fit(&xs, &ys, &[], &[], feature_names(), quick_params()),
            Err(ModelError::EmptyValidationSet)
        ));
    }
}
