pub mod trainer;

use crate::data::loader::CellTypeSources;
use crate::data::preprocessing::{BinaryLabels, LabelStrategy, SamplingConfig};
use crate::data::DEFAULT_KMER_SIZE;
use crate::error::PipelineError;
use crate::model::ForestConfig;
use crate::utils::validation;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Classification task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Task {
    /// Cancer vs non-cancer
    #[serde(rename = "cancer")]
    #[value(name = "cancer")]
    Cancer,
    /// One class per cell type
    #[serde(rename = "celltype")]
    #[value(name = "celltype")]
    CellType,
}

impl Task {
    /// Tag embedded in artifact file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Cancer => "cancer",
            Task::CellType => "celltype",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline configuration threaded through every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cell-type label to FASTA path
    pub sources: CellTypeSources,
    /// k-mer sizes evaluated in turn
    pub kmers: Vec<usize>,
    /// Seed for sampling, splitting and the forest
    pub seed: u64,
    /// Fraction of rows held out for testing
    pub test_ratio: f64,
    /// Directory receiving the artifacts
    pub output_dir: PathBuf,
    /// Balanced sampling
    pub sampling: SamplingConfig,
    /// Random Forest
    pub forest: ForestConfig,
    /// Cancer / non-cancer grouping of cell types
    pub binary_labels: BinaryLabels,
    /// Keep going with the next k after a failed one
    pub continue_on_error: bool,
    /// Records read per FASTA source (0 = all)
    pub max_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: CellTypeSources::new(),
            kmers: vec![DEFAULT_KMER_SIZE],
            seed: 42,
            test_ratio: 0.2,
            output_dir: PathBuf::from("."),
            sampling: SamplingConfig::default(),
            forest: ForestConfig::default(),
            binary_labels: BinaryLabels::default(),
            continue_on_error: true,
            max_records: 0,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::data_source(path, e))?;
        serde_json::from_str(&json).map_err(|e| PipelineError::data_source(path, e))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one FASTA source is required".to_string(),
            ));
        }
        if self.kmers.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one k-mer size is required".to_string(),
            ));
        }
        for &k in &self.kmers {
            validation::positive(k, "k-mer size")?;
        }
        validation::fraction(self.test_ratio, "test ratio")?;
        validation::positive(self.forest.n_trees, "number of trees")?;
        validation::positive(self.sampling.target_per_class, "target per class")?;

        let overlap: Vec<&String> = self
            .binary_labels
            .positive
            .intersection(&self.binary_labels.negative)
            .collect();
        if !overlap.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "cell types {:?} are labelled both cancer and non-cancer",
                overlap
            )));
        }
        Ok(())
    }

    /// Label strategy for a task
    pub fn label_strategy(&self, task: Task) -> LabelStrategy {
        match task {
            Task::Cancer => LabelStrategy::Binary(self.binary_labels.clone()),
            Task::CellType => LabelStrategy::CellType,
        }
    }
}

/// Outcome of one k iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KmerResult {
    pub k: usize,
    pub auc: f64,
    pub accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub roc_path: PathBuf,
    pub duration_secs: f64,
}

/// Outcome of a full run over every k
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub results: Vec<KmerResult>,
    /// k values whose iteration failed, with the error message
    pub failures: Vec<(usize, String)>,
    pub auc_summary: Option<PathBuf>,
    pub duration_secs: f64,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
