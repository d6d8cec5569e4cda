//! Isolation Forest for batch multivariate outlier detection
//!
//! Each tree isolates points with random axis-aligned cuts on a subsample of
//! the batch. Points that need fewer cuts to end up alone are more anomalous.
//!
//! Scoring follows the usual convention of `score_samples`: the score is
//! `-2^(-E[h(x)] / c(ψ))`, so it lies in `[-1, 0)` and *higher means more
//! normal*. The decision offset is the `contamination` percentile of the
//! training scores; points strictly below it are outliers.
//!
//! Reference: "Isolation Forest" (Liu, Ting, Zhou, ICDM 2008)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Euler–Mascheroni constant, used for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Score reported when the path normalizer is zero (single-sample fits)
const NEUTRAL_SCORE: f64 = -0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Number of isolation trees
    pub n_estimators: usize,
    /// Subsample size per tree (capped at the batch size)
    pub max_samples: usize,
    /// Expected outlier fraction, in (0, 0.5]
    pub contamination: f64,
    /// Seed for subsampling and cuts
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

/// A node in an isolation tree
#[derive(Debug, Clone)]
enum IsoNode {
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsoNode>,
        right: Box<IsoNode>,
    },
    /// Terminal node; `size` points were still together here
    Leaf { size: usize },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: IsoNode,
}

impl IsolationTree {
    fn build(data: &[Vec<f64>], indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: build_recursive(data, indices, 0, max_depth, rng),
        }
    }

    /// Path length of `point`, with the unresolved-subtree correction at the leaf
    fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                IsoNode::Leaf { size } => return depth + average_path_length(*size),
                IsoNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    depth += 1.0;
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

fn build_recursive(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> IsoNode {
    if depth >= max_depth || indices.len() <= 1 {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can separate points
    let dims = data[indices[0]].len();
    let mut candidates = Vec::with_capacity(dims);
    for feature in 0..dims {
        let (lo, hi) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
            (lo.min(data[i][feature]), hi.max(data[i][feature]))
        });
        if hi > lo {
            candidates.push((feature, lo, hi));
        }
    }

    if candidates.is_empty() {
        return IsoNode::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.random_range(0..candidates.len())];
    let threshold = lo + rng.random::<f64>() * (hi - lo);

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| data[i][feature] <= threshold);

    IsoNode::Internal {
        feature,
        threshold,
        left: Box::new(build_recursive(data, left, depth + 1, max_depth, rng)),
        right: Box::new(build_recursive(data, right, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful BST search over `n` points, c(n)
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile (`q` in [0, 100]) of unsorted values
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Fitted isolation forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Subsample size actually used per tree
    max_samples: usize,
    /// Decision threshold on `score`
    offset: f64,
}

impl IsolationForest {
    /// Fit on a row-major batch. The decision offset is derived from the same batch.
    pub fn fit(data: &[Vec<f64>], config: &IsolationForestConfig) -> Self {
        let n = data.len();
        let max_samples = config.max_samples.max(1).min(n.max(1));
        let max_depth = (max_samples as f64).log2().ceil().max(0.0) as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut trees = Vec::with_capacity(config.n_estimators);
        if n > 0 {
            for _ in 0..config.n_estimators.max(1) {
                let subsample = rand::seq::index::sample(&mut rng, n, max_samples).into_vec();
                let mut tree_rng = StdRng::seed_from_u64(rng.random::<u64>());
                trees.push(IsolationTree::build(data, subsample, max_depth, &mut tree_rng));
            }
        }

        let mut forest = Self {
            trees,
            max_samples,
            offset: 0.0,
        };

        let scores = forest.score_samples(data);
        forest.offset = if scores.is_empty() {
            NEUTRAL_SCORE
        } else {
            percentile(&scores, 100.0 * config.contamination)
        };
        forest
    }

    /// Native score of one point; higher = more normal
    pub fn score(&self, point: &[f64]) -> f64 {
        let normalizer = average_path_length(self.max_samples);
        if self.trees.is_empty() || normalizer == 0.0 {
            return NEUTRAL_SCORE;
        }
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;

        -(2f64.powf(-mean_path / normalizer))
    }

    pub fn score_samples(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|point| self.score(point)).collect()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance to the decision threshold; negative = outlier
    pub fn decision_function(&self, point: &[f64]) -> f64 {
        self.score(point) - self.offset
    }

    pub fn is_outlier(&self, point: &[f64]) -> bool {
        self.decision_function(point) < 0.0
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
