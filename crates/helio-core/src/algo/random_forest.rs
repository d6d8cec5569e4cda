//! Random forest regression
//!
//! Bagged CART regression trees: every tree is grown to purity on a bootstrap
//! resample of the training set, choosing at each node the variance-reducing
//! axis-aligned split over all features (visited in a random order, so ties
//! are broken randomly). Predictions average the trees.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub seed: u64,
    /// Smallest node that may still be split
    pub min_samples_split: usize,
    /// Smallest node a split may produce
    pub min_samples_leaf: usize,
    /// Unlimited when `None`
    pub max_depth: Option<usize>,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegNode>,
        right: Box<RegNode>,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    root: RegNode,
}

impl RegressionTree {
    fn predict(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                RegNode::Leaf { value } => return *value,
                RegNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    config: &'a RandomForestConfig,
    n_features: usize,
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Σleft²/n_left + Σright²/n_right; larger = lower squared error
    proxy: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> RegNode {
        let n = indices.len();
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;

        let depth_exhausted = self.config.max_depth.is_some_and(|d| depth >= d);
        let pure = indices.iter().all(|&i| self.y[i] == self.y[indices[0]]);
        if n < self.config.min_samples_split.max(2) || depth_exhausted || pure {
            return RegNode::Leaf { value: mean };
        }

        let Some(split) = self.best_split(&indices, rng) else {
            return RegNode::Leaf { value: mean };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        RegNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<SplitCandidate> {
        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let total: f64 = indices.iter().map(|&i| self.y[i]).sum();

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in features {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.y[sorted[pos - 1]];

                let lo = self.x[sorted[pos - 1]][feature];
                let hi = self.x[sorted[pos]][feature];
                if hi <= lo {
                    continue;
                }
                let n_left = pos;
                let n_right = n - pos;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let proxy = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64;

                if best.as_ref().is_none_or(|b| proxy > b.proxy) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        proxy,
                    });
                }
            }
        }

        best
    }
}

/// Fitted bagged regression forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForestRegressor {
    /// Fit on row-major `x` against `y`.
    ///
    /// Errors are plain messages; callers wrap them into their own taxonomy.
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &RandomForestConfig) -> Result<Self, String> {
        if x.is_empty() {
            return Err("no training rows".to_string());
        }
        if x.len() != y.len() {
            return Err(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.len(),
                y.len()
            ));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err("feature rows must share a non-zero width".to_string());
        }
        if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
            return Err(format!("non-finite target at row {}", pos));
        }
        if config.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }

        let builder = TreeBuilder {
            x,
            y,
            config,
            n_features,
        };
        let n = x.len();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.random::<u64>());
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.random_range(0..n)).collect();
                RegressionTree {
                    root: builder.build(bootstrap, 0, &mut tree_rng),
                }
            })
            .collect();

        Ok(Self { trees, n_features })
    }

    pub fn predict_one(&self, point: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(point)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y = x.iter().map(|r| if r[0] < 20.0 { 1.0 } else { 9.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let forest = RandomForestRegressor::fit(&x, &y, &RandomForestConfig::default()).unwrap();

        assert!((forest.predict_one(&[5.0, 1.0]) - 1.0).abs() < 0.5);
        assert!((forest.predict_one(&[35.0, 1.0]) - 9.0).abs() < 0.5);
        assert_eq!(forest.num_trees(), 100);
    }

    #[test]
    fn test_constant_target_predicts_constant() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![4.2; 10];
        let forest = RandomForestRegressor::fit(&x, &y, &RandomForestConfig::default()).unwrap();
        assert!((forest.predict_one(&[100.0]) - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let (x, y) = step_data();
        let config = RandomForestConfig {
            n_estimators: 10,
            ..Default::default()
        };
        let a = RandomForestRegressor::fit(&x, &y, &config).unwrap();
        let b = RandomForestRegressor::fit(&x, &y, &config).unwrap();
        assert_eq!(a.predict(&x), b.predict(&x));
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = RandomForestConfig::default();
        assert!(RandomForestRegressor::fit(&[], &[], &config).is_err());
        assert!(RandomForestRegressor::fit(&[vec![1.0]], &[1.0, 2.0], &config).is_err());
        assert!(RandomForestRegressor::fit(&[vec![1.0]], &[f64::NAN], &config).is_err());
    }
}
