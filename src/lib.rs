//! # kmerclass: k-mer cell-type classification
//!
//! kmerclass turns DNA sequences grouped by cell type into fixed-width
//! feature vectors (length, GC content, Shannon entropy, k-mer frequencies)
//! and trains Random Forest classifiers on them.
//!
//! ## Features
//!
//! - FASTA input, plain or gzipped, one source per cell type
//! - Balanced sampling for the cancer and per-cell-type tasks
//! - Stratified train/test split and a seeded, parallel Random Forest
//! - Confusion matrix, ROC curve and AUC, persisted per k-mer size
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kmerclass::training::{trainer::Trainer, PipelineConfig, Task};
//!
//! let mut config = PipelineConfig::default();
//! config.sources.insert("HepG2".into(), "data/HepG2.fa".into());
//! config.sources.insert("GM12878".into(), "data/GM12878.fa".into());
//! config.kmers = vec![3, 4, 5];
//!
//! let trainer = Trainer::new(config, Task::Cancer).unwrap();
//! let summary = trainer.run().unwrap();
//! for result in &summary.results {
//!     println!("k={} AUC={:.4}", result.k, result.auc);
//! }
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod training;
pub mod utils;

pub use error::PipelineError;

/// Result type used across the library
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Re-export commonly used types
pub use data::loader::FastaLoader;
pub use data::{Dataset, FeatureTable, FeatureVector, SequenceRecord};
pub use model::{forest::RandomForest, ForestConfig};
pub use training::{PipelineConfig, RunSummary, Task};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - k-mer feature Random Forest classification",
        NAME, VERSION
    )
}
