use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised by the feature extraction, sampling and evaluation stages
pub enum PipelineError {
    #[error("Could not read sequence source {path:?}: {reason}")]
    /// Missing, unreadable or malformed FASTA (or other input table)
    DataSource {
        /// Offending file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
    #[error("Group `{group}` has {available} rows but {requested} were requested")]
    /// Sampling without replacement asked for more rows than a group holds
    InsufficientData {
        /// Cell type or class label of the short group
        group: String,
        /// Rows present in the group
        available: usize,
        /// Rows requested by the sampler
        requested: usize,
    },
    #[error("Label mismatch: {0}")]
    /// Class sets of the partitions (or scores) do not line up
    LabelMismatch(String),
    #[error("Invalid configuration: {0}")]
    /// Configuration value out of range
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    /// Plain I/O failure while writing artifacts
    Io(#[from] std::io::Error),
    #[error("Could not read/write tab separated table: {0}")]
    /// Table (de)serialization error
    Csv(#[from] csv::Error),
    #[error("Could not read/write JSON: {0}")]
    /// JSON (de)serialization error
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn data_source<P: Into<PathBuf>, S: ToString>(path: P, reason: S) -> Self {
        PipelineError::DataSource {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
