//! Random forest pixel classifier
//!
//! CART decision trees with Gini splits, bootstrap aggregation and
//! sqrt-of-features subsampling at each node. Everything random derives
//! from one seed, so a fixed seed makes fit and predict bit-reproducible;
//! with differing seeds, run-to-run variability is an accepted property
//! of the ensemble.

use crate::classification::{PixelClassifier, SampleSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use settlemap_core::{Error, Result};

/// Random forest hyperparameters.
///
/// `n_trees` defaults to 5; that is a small ensemble and usually worth
/// raising.
#[derive(Debug, Clone)]
pub struct RandomForestParams {
    /// Number of trees in the ensemble
    pub n_trees: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples required in a leaf
    pub min_samples_leaf: usize,
    /// Seed for bootstrap and feature subsampling
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 5,
            max_depth: 16,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// A trained forest. Lifecycle is create → fit → predict → discard; no
/// model persistence.
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: RandomForestParams,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    /// Whether `fit` has been called
    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}

impl PixelClassifier for RandomForest {
    fn fit(&mut self, samples: &SampleSet) -> Result<()> {
        if samples.is_empty() {
            return Err(Error::EmptyInput("training samples"));
        }
        if self.params.n_trees == 0 {
            return Err(Error::InvalidParameter {
                name: "n_trees",
                value: "0".to_string(),
                reason: "ensemble needs at least one tree".to_string(),
            });
        }

        let n_features = samples.n_features();
        let mtry = (n_features as f64).sqrt().ceil() as usize;

        self.trees = (0..self.params.n_trees)
            .map(|t| {
                // Per-tree stream so tree count doesn't shift other trees
                let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(t as u64));
                let indices: Vec<usize> = (0..samples.len())
                    .map(|_| rng.gen_range(0..samples.len()))
                    .collect();
                grow_tree(samples, &indices, mtry, &self.params, 0, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> i32 {
        // Majority vote; ties resolve to the smallest label so prediction
        // is deterministic
        let mut votes: Vec<(i32, usize)> = Vec::with_capacity(self.trees.len());
        for tree in &self.trees {
            let label = tree.predict(features);
            match votes.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => votes.push((label, 1)),
            }
        }
        votes
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(label, _)| label)
            .unwrap_or(0)
    }
}

// ── Trees ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        label: i32,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, features: &[f64]) -> i32 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

fn grow_tree(
    samples: &SampleSet,
    indices: &[usize],
    mtry: usize,
    params: &RandomForestParams,
    depth: usize,
    rng: &mut StdRng,
) -> Tree {
    let mut tree = Tree { nodes: Vec::new() };
    grow_node(samples, indices, mtry, params, depth, rng, &mut tree);
    tree
}

/// Grow a subtree rooted at the next free node slot; returns its index.
fn grow_node(
    samples: &SampleSet,
    indices: &[usize],
    mtry: usize,
    params: &RandomForestParams,
    depth: usize,
    rng: &mut StdRng,
    tree: &mut Tree,
) -> usize {
    let node_index = tree.nodes.len();

    if depth >= params.max_depth
        || indices.len() < 2 * params.min_samples_leaf.max(1)
        || is_pure(samples, indices)
    {
        tree.nodes.push(Node::Leaf {
            label: majority_label(samples, indices),
        });
        return node_index;
    }

    let split = best_split(samples, indices, mtry, rng);
    let Some((feature, threshold)) = split else {
        tree.nodes.push(Node::Leaf {
            label: majority_label(samples, indices),
        });
        return node_index;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| samples.features[i][feature] <= threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        tree.nodes.push(Node::Leaf {
            label: majority_label(samples, indices),
        });
        return node_index;
    }

    // Reserve the slot, then grow children
    tree.nodes.push(Node::Leaf { label: 0 });
    let left = grow_node(samples, &left_idx, mtry, params, depth + 1, rng, tree);
    let right = grow_node(samples, &right_idx, mtry, params, depth + 1, rng, tree);
    tree.nodes[node_index] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    node_index
}

fn is_pure(samples: &SampleSet, indices: &[usize]) -> bool {
    let first = samples.labels[indices[0]];
    indices.iter().all(|&i| samples.labels[i] == first)
}

fn majority_label(samples: &SampleSet, indices: &[usize]) -> i32 {
    let mut counts: Vec<(i32, usize)> = Vec::new();
    for &i in indices {
        let label = samples.labels[i];
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(label, _)| label)
        .unwrap_or(0)
}

/// Best (feature, threshold) over a random subset of `mtry` features,
/// scored by weighted Gini impurity of the induced partition.
fn best_split(
    samples: &SampleSet,
    indices: &[usize],
    mtry: usize,
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let n_features = samples.n_features();
    let mut candidates: Vec<usize> = (0..n_features).collect();
    // Partial Fisher-Yates: the first mtry entries are the chosen subset
    for i in 0..mtry.min(n_features) {
        let j = rng.gen_range(i..n_features);
        candidates.swap(i, j);
    }

    let mut best: Option<(usize, f64, f64)> = None;

    for &feature in &candidates[..mtry.min(n_features)] {
        let mut values: Vec<(f64, i32)> = indices
            .iter()
            .map(|&i| (samples.features[i][feature], samples.labels[i]))
            .collect();
        values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        for w in values.windows(2) {
            let (v0, v1) = (w[0].0, w[1].0);
            if v0 == v1 {
                continue;
            }
            let threshold = (v0 + v1) / 2.0;
            let score = weighted_gini(&values, threshold);
            if best.map(|(_, _, s)| score < s).unwrap_or(true) {
                best = Some((feature, threshold, score));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn weighted_gini(values: &[(f64, i32)], threshold: f64) -> f64 {
    let mut left: Vec<(i32, usize)> = Vec::new();
    let mut right: Vec<(i32, usize)> = Vec::new();
    let mut n_left = 0usize;
    let mut n_right = 0usize;

    for &(value, label) in values {
        let (side, n) = if value <= threshold {
            (&mut left, &mut n_left)
        } else {
            (&mut right, &mut n_right)
        };
        match side.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => side.push((label, 1)),
        }
        *n += 1;
    }

    let gini = |counts: &[(i32, usize)], n: usize| -> f64 {
        if n == 0 {
            return 0.0;
        }
        let mut g = 1.0;
        for &(_, count) in counts {
            let p = count as f64 / n as f64;
            g -= p * p;
        }
        g
    };

    let total = (n_left + n_right) as f64;
    gini(&left, n_left) * n_left as f64 / total + gini(&right, n_right) * n_right as f64 / total
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated clusters in feature space
    fn separable_samples() -> SampleSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let jitter = (i % 5) as f64 * 0.01;
            if i % 2 == 0 {
                features.push(vec![0.1 + jitter, 10.0 + jitter]);
                labels.push(0);
            } else {
                features.push(vec![0.9 + jitter, 90.0 + jitter]);
                labels.push(6);
            }
        }
        SampleSet {
            band_names: vec!["a".into(), "b".into()],
            features,
            labels,
        }
    }

    #[test]
    fn test_fit_and_predict_separable() {
        let mut forest = RandomForest::new(RandomForestParams::default());
        forest.fit(&separable_samples()).unwrap();
        assert!(forest.is_trained());

        assert_eq!(forest.predict(&[0.12, 11.0]), 0);
        assert_eq!(forest.predict(&[0.88, 88.0]), 6);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let samples = separable_samples();
        let params = RandomForestParams {
            n_trees: 7,
            seed: 1234,
            ..Default::default()
        };

        let mut a = RandomForest::new(params.clone());
        let mut b = RandomForest::new(params);
        a.fit(&samples).unwrap();
        b.fit(&samples).unwrap();

        for i in 0..100 {
            let x = i as f64 / 100.0;
            let features = [x, x * 100.0];
            assert_eq!(a.predict(&features), b.predict(&features));
        }
    }

    #[test]
    fn test_empty_samples_rejected() {
        let samples = SampleSet {
            band_names: vec!["a".into()],
            features: vec![],
            labels: vec![],
        };
        let mut forest = RandomForest::new(RandomForestParams::default());
        assert!(matches!(forest.fit(&samples), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_zero_trees_rejected() {
        let mut forest = RandomForest::new(RandomForestParams {
            n_trees: 0,
            ..Default::default()
        });
        assert!(forest.fit(&separable_samples()).is_err());
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let samples = SampleSet {
            band_names: vec!["a".into()],
            features: (0..10).map(|i| vec![i as f64]).collect(),
            labels: vec![3; 10],
        };
        let mut forest = RandomForest::new(RandomForestParams::default());
        forest.fit(&samples).unwrap();
        assert_eq!(forest.predict(&[5.0]), 3);
    }
}
