pub mod forest;
pub mod metrics;
pub mod tree;

use serde::{Deserialize, Serialize};

/// Number of features evaluated per split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// Every feature
    All,
    /// Fixed count, capped at the number of features
    Fixed(usize),
}

impl MaxFeatures {
    /// Resolve against the feature count; never below 1
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(n) => *n,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// `n_samples / (n_classes * count_c)`
    Balanced,
    /// Every class weighs 1
    None,
}

impl ClassWeight {
    /// Weight of each class index given the training targets.
    ///
    /// Classes absent from `targets` get weight 0.
    pub fn weights(&self, targets: &[usize], n_classes: usize) -> Vec<f64> {
        match self {
            ClassWeight::None => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &t in targets {
                    counts[t] += 1;
                }
                let present = counts.iter().filter(|&&c| c > 0).count().max(1);
                counts
                    .iter()
                    .map(|&c| {
                        if c == 0 {
                            0.0
                        } else {
                            targets.len() as f64 / (present as f64 * c as f64)
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Random Forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,
    /// Maximum tree depth (unlimited when `None`)
    pub max_depth: Option<usize>,
    /// Minimum number of distinct samples required to split a node
    pub min_samples_split: usize,
    /// Features evaluated per split
    pub max_features: MaxFeatures,
    /// Class weighting
    pub class_weight: ClassWeight,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl ForestConfig {
    /// Create a small forest for quick runs
    pub fn quick_test() -> Self {
        Self {
            n_trees: 10,
            ..Default::default()
        }
    }
}
