//! Depth-limited regression trees with variance-reduction splits.
//!
//! Each node stores the mean target of the rows that reached it. That makes
//! path attribution exact: walking a row down the tree, the change in node
//! mean at every split is that split feature's contribution, and the leaf
//! value equals the root mean plus the sum of contributions.

use crate::frame::NUM_FEATURES;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Mean target over the rows that reached this node.
    pub value: f64,
    pub split: Option<SplitNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitNode {
    pub feature: usize,
    /// Rows with `x[feature] <= threshold` go left.
    pub threshold: f64,
    /// Sum-of-squared-error reduction achieved by this split.
    pub gain: f64,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl TreeNode {
    /// Fit a tree on the given sample rows, splitting only on `features`.
    ///
    /// `sample` indexes into `rows`/`targets`; boosting passes a
    /// without-replacement row subsample per round.
    pub fn fit(
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        sample: &[usize],
        features: &[usize],
        params: TreeParams,
    ) -> Self {
        Self::fit_node(rows, targets, sample, features, params, 0)
    }

    fn fit_node(
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        sample: &[usize],
        features: &[usize],
        params: TreeParams,
        depth: usize,
    ) -> Self {
        let value = mean(sample.iter().map(|&i| targets[i]));
        if depth >= params.max_depth || sample.len() < 2 * params.min_samples_leaf {
            return Self { value, split: None };
        }

        let Some(best) = best_split(rows, targets, sample, features, params.min_samples_leaf)
        else {
            return Self { value, split: None };
        };

        let (mut left_idx, mut right_idx) = (Vec::new(), Vec::new());
        for &i in sample {
            if rows[i][best.feature] <= best.threshold {
                left_idx.push(i);
            } else {
                right_idx.push(i);
            }
        }

        let left = Self::fit_node(rows, targets, &left_idx, features, params, depth + 1);
        let right = Self::fit_node(rows, targets, &right_idx, features, params, depth + 1);
        Self {
            value,
            split: Some(SplitNode {
                feature: best.feature,
                threshold: best.threshold,
                gain: best.gain,
                left: Box::new(left),
                right: Box::new(right),
            }),
        }
    }

    pub fn predict(&self, x: &[f64; NUM_FEATURES]) -> f64 {
        let mut node = self;
        while let Some(split) = &node.split {
            node = if x[split.feature] <= split.threshold {
                &split.left
            } else {
                &split.right
            };
        }
        node.value
    }

    /// Predict while accumulating each split feature's contribution: the
    /// change in node mean when the row passes that split. On return,
    /// `leaf = self.value + contribs.sum()` holds exactly.
    pub fn predict_with_contributions(
        &self,
        x: &[f64; NUM_FEATURES],
        contribs: &mut [f64; NUM_FEATURES],
    ) -> f64 {
        let mut node = self;
        while let Some(split) = &node.split {
            let child: &TreeNode = if x[split.feature] <= split.threshold {
                &split.left
            } else {
                &split.right
            };
            contribs[split.feature] += child.value - node.value;
            node = child;
        }
        node.value
    }

    /// Add each split's gain into `out`, indexed by feature.
    pub fn accumulate_gain(&self, out: &mut [f64; NUM_FEATURES]) {
        if let Some(split) = &self.split {
            out[split.feature] += split.gain;
            split.left.accumulate_gain(out);
            split.right.accumulate_gain(out);
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn best_split(
    rows: &[[f64; NUM_FEATURES]],
    targets: &[f64],
    sample: &[usize],
    features: &[usize],
    min_samples_leaf: usize,
) -> Option<BestSplit> {
    let n = sample.len() as f64;
    let total: f64 = sample.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = sample.iter().map(|&i| targets[i].powi(2)).sum();
    let parent_sse = total_sq - total * total / n;

    let mut best: Option<BestSplit> = None;
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(sample.len());

    for &feature in features {
        sorted.clear();
        sorted.extend(sample.iter().map(|&i| (rows[i][feature], targets[i])));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..sorted.len() - 1 {
            left_sum += sorted[k].1;
            left_sq += sorted[k].1.powi(2);

            let left_n = k + 1;
            let right_n = sorted.len() - left_n;
            if left_n < min_samples_leaf || right_n < min_samples_leaf {
                continue;
            }
            // No split between equal values.
            if sorted[k].0 == sorted[k + 1].0 {
                continue;
            }

            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / left_n as f64;
            let right_sse = right_sq - right_sum * right_sum / right_n as f64;
            let gain = parent_sse - left_sse - right_sse;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (sorted[k].0 + sorted[k + 1].0) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (mut sum, mut n) = (0.0, 0usize);
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<[f64; NUM_FEATURES]>, Vec<f64>) {
        // Target is a step function of feature 0.
        let rows: Vec<[f64; NUM_FEATURES]> = (0..20)
            .map(|i| [i as f64, 0.0, 0.0, 0.0, 0.0])
            .collect();
        let targets: Vec<f64> = (0..20).map(|i| if i < 10 { -1.0 } else { 1.0 }).collect();
        (rows, targets)
    }

    fn all_features() -> Vec<usize> {
        (0..NUM_FEATURES).collect()
    }

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 3,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn finds_the_step_boundary() {
        let (rows, targets) = step_data();
        let sample: Vec<usize> = (0..rows.len()).collect();
        let tree = TreeNode::fit(&rows, &targets, &sample, &all_features(), params());

        let split = tree.split.as_ref().unwrap();
        assert_eq!(split.feature, 0);
        assert!((split.threshold - 9.5).abs() < 1e-9);
        assert_eq!(tree.predict(&[3.0, 0.0, 0.0, 0.0, 0.0]), -1.0);
        assert_eq!(tree.predict(&[15.0, 0.0, 0.0, 0.0, 0.0]), 1.0);
    }

    #[test]
    fn constant_target_yields_leaf() {
        let rows: Vec<[f64; NUM_FEATURES]> =
            (0..10).map(|i| [i as f64, 0.0, 0.0, 0.0, 0.0]).collect();
        let targets = vec![0.5; 10];
        let sample: Vec<usize> = (0..10).collect();
        let tree = TreeNode::fit(&rows, &targets, &sample, &all_features(), params());
        assert!(tree.split.is_none());
        assert_eq!(tree.value, 0.5);
    }

    #[test]
    fn respects_min_samples_leaf() {
        let (rows, targets) = step_data();
        let sample: Vec<usize> = (0..rows.len()).collect();
        let tree = TreeNode::fit(
            &rows,
            &targets,
            &sample,
            &all_features(),
            TreeParams {
                max_depth: 8,
                min_samples_leaf: 30,
            },
        );
        assert!(tree.split.is_none());
    }

    #[test]
    fn contributions_are_additive() {
        let (rows, targets) = step_data();
        let sample: Vec<usize> = (0..rows.len()).collect();
        let tree = TreeNode::fit(&rows, &targets, &sample, &all_features(), params());

        for row in &rows {
            let mut contribs = [0.0; NUM_FEATURES];
            let leaf = tree.predict_with_contributions(row, &mut contribs);
            let rebuilt = tree.value + contribs.iter().sum::<f64>();
            assert!((leaf - rebuilt).abs() < 1e-12);
            assert_eq!(leaf, tree.predict(row));
        }
    }

    #[test]
    fn gain_lands_on_the_split_feature() {
        let (rows, targets) = step_data();
        let sample: Vec<usize> = (0..rows.len()).collect();
        let tree = TreeNode::fit(&rows, &targets, &sample, &all_features(), params());

        let mut gains = [0.0; NUM_FEATURES];
        tree.accumulate_gain(&mut gains);
        assert!(gains[0] > 0.0);
        assert!(gains[1..].iter().all(|&g| g == 0.0));
    }
}
