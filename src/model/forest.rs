//! Random Forest classifier: bootstrap-aggregated CART trees.
//!
//! Each tree receives its own seed, drawn sequentially from the caller's RNG
//! before any tree is grown, so fitting the trees in parallel gives the same
//! forest as fitting them one after another.

use crate::data::Samples;
use crate::error::PipelineError;
use crate::model::tree::{argmax, DecisionTree, TreeParams};
use crate::model::ForestConfig;
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A fitted Random Forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Fit `config.n_trees` trees on bootstrap samples of `samples`
    pub fn fit(
        config: &ForestConfig,
        samples: &Samples,
        n_classes: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "cannot fit a forest on an empty training set".to_string(),
            ));
        }
        if config.n_trees == 0 {
            return Err(PipelineError::InvalidConfig(
                "forest needs at least one tree".to_string(),
            ));
        }
        let n_features = samples.features[0].len();
        if samples.features.iter().any(|row| row.len() != n_features) {
            return Err(PipelineError::InvalidConfig(
                "inconsistent feature widths in training rows".to_string(),
            ));
        }
        if let Some(&bad) = samples.targets.iter().find(|&&t| t >= n_classes) {
            return Err(PipelineError::LabelMismatch(format!(
                "target {} outside of {} classes",
                bad, n_classes
            )));
        }

        let class_weights = config.class_weight.weights(&samples.targets, n_classes);
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: config.max_features.resolve(n_features),
        };
        info!(
            "Fitting {} trees on {} samples x {} features ({} per split)",
            config.n_trees,
            samples.len(),
            n_features,
            params.max_features
        );

        let seeds: Vec<u64> = (0..config.n_trees).map(|_| rng.gen()).collect();
        let n = samples.len();

        let trees: Vec<DecisionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(seed);
                let mut weights = vec![0.0; n];
                for _ in 0..n {
                    weights[tree_rng.gen_range(0..n)] += 1.0;
                }
                for (w, &t) in weights.iter_mut().zip(&samples.targets) {
                    *w *= class_weights[t];
                }
                DecisionTree::fit(
                    &samples.features,
                    &samples.targets,
                    &weights,
                    n_classes,
                    &params,
                    &mut tree_rng,
                )
            })
            .collect();

        let forest = Self {
            trees,
            n_features,
            n_classes,
        };
        debug!(
            "Forest fitted: {} nodes, average depth {:.1}",
            forest.total_nodes(),
            forest.avg_depth()
        );
        Ok(forest)
    }

    /// Mean of the tree leaf distributions for one row
    pub fn predict_proba_one(&self, features: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.predict_proba(features)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    /// Class probabilities, one row per sample
    pub fn predict_proba(&self, features: &[Vec<f64>]) -> Vec<Vec<f64>> {
        features
            .par_iter()
            .map(|row| self.predict_proba_one(row))
            .collect()
    }

    /// Most probable class per sample
    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<usize> {
        self.predict_proba(features)
            .iter()
            .map(|p| argmax(p))
            .collect()
    }

    /// Number of trees in the forest.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Average tree depth across the forest.
    pub fn avg_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(DecisionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }

    /// Total number of nodes across all trees.
    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }
}
