//! CART classification tree grown on weighted samples.
//!
//! Nodes live in a flat array; a split sends values `<= threshold` left.
//! Impurity is the weighted Gini index and every leaf stores the weighted
//! class distribution of the samples that reached it.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Values closer than this are treated as equal when placing thresholds
const FEATURE_THRESHOLD: f64 = 1e-7;

/// A node in the decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class probabilities (sum to 1)
        distribution: Vec<f64>,
    },
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Non-constant features to evaluate per split
    pub max_features: usize,
}

#[derive(Debug)]
struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(distribution: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - distribution
        .iter()
        .map(|w| (w / total) * (w / total))
        .sum::<f64>()
}

/// A fitted decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

impl DecisionTree {
    /// Grow a tree on the samples with positive weight.
    ///
    /// `weights[i] == 0` excludes row `i` (e.g. not drawn in the bootstrap).
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[usize],
        weights: &[f64],
        n_classes: usize,
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let n_features = features.first().map_or(0, Vec::len);
        let root: Vec<usize> = (0..targets.len()).filter(|&i| weights[i] > 0.0).collect();
        let mut feature_order: Vec<usize> = (0..n_features).collect();

        let mut nodes = vec![Node::Leaf {
            distribution: vec![0.0; n_classes],
        }];
        let mut stack = vec![(0usize, root, 0usize)];

        while let Some((node_id, samples, depth)) = stack.pop() {
            let mut distribution = vec![0.0; n_classes];
            for &i in &samples {
                distribution[targets[i]] += weights[i];
            }
            let total: f64 = distribution.iter().sum();
            let impurity = gini(&distribution, total);

            let splittable = samples.len() >= params.min_samples_split.max(2)
                && params.max_depth.map_or(true, |d| depth < d)
                && impurity > 0.0;

            let split = if splittable {
                feature_order.shuffle(rng);
                best_split(
                    features,
                    targets,
                    weights,
                    &samples,
                    n_classes,
                    &feature_order,
                    params.max_features,
                )
            } else {
                None
            };

            match split {
                Some(split) => {
                    let (left, right): (Vec<usize>, Vec<usize>) = samples
                        .iter()
                        .partition(|&&i| features[i][split.feature] <= split.threshold);
                    let left_id = nodes.len();
                    let right_id = left_id + 1;
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes[node_id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: left_id,
                        right: right_id,
                    };
                    stack.push((right_id, right, depth + 1));
                    stack.push((left_id, left, depth + 1));
                }
                None => {
                    if total > 0.0 {
                        distribution.iter_mut().for_each(|w| *w /= total);
                    }
                    nodes[node_id] = Node::Leaf { distribution };
                }
            }
        }

        Self {
            nodes,
            n_features,
            n_classes,
        }
    }

    /// Class distribution of the leaf reached by `features`
    pub fn predict_proba(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Most probable class (lowest index on ties)
    pub fn predict(&self, features: &[f64]) -> usize {
        argmax(self.predict_proba(features))
    }

    /// Number of nodes in the tree.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Tree depth (longest root-to-leaf path).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max_depth
    }
}

/// Index of the largest value, first one on ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn best_split(
    features: &[Vec<f64>],
    targets: &[usize],
    weights: &[f64],
    samples: &[usize],
    n_classes: usize,
    feature_order: &[usize],
    max_features: usize,
) -> Option<Split> {
    let mut best: Option<Split> = None;
    let mut visited = 0;
    let mut column: Vec<(f64, usize, f64)> = Vec::with_capacity(samples.len());

    for &feature in feature_order {
        if visited >= max_features {
            break;
        }
        column.clear();
        column.extend(
            samples
                .iter()
                .map(|&i| (features[i][feature], targets[i], weights[i])),
        );
        column.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let first = column[0].0;
        let last = column[column.len() - 1].0;
        if last <= first + FEATURE_THRESHOLD {
            continue;
        }
        visited += 1;

        let mut right = vec![0.0; n_classes];
        for &(_, t, w) in column.iter() {
            right[t] += w;
        }
        let total: f64 = right.iter().sum();
        let mut left = vec![0.0; n_classes];
        let mut left_total = 0.0;

        for pos in 0..column.len() - 1 {
            let (value, t, w) = column[pos];
            left[t] += w;
            right[t] -= w;
            left_total += w;

            let next = column[pos + 1].0;
            if next <= value + FEATURE_THRESHOLD {
                continue;
            }
            let right_total = total - left_total;
            let impurity = (left_total * gini(&left, left_total)
                + right_total * gini(&right, right_total))
                / total;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = value / 2.0 + next / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }
    best
}
