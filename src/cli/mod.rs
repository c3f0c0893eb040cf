use crate::data::loader::{parse_source, CellTypeSources};
use crate::data::DEFAULT_KMER_SIZE;
use crate::training::{PipelineConfig, Task};
use crate::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kmerclass: k-mer feature extraction and Random Forest cell-type classification
#[derive(Parser, Debug)]
#[command(name = "kmerclass")]
#[command(about = "Classify DNA sequences by cell type and cancer status from k-mer features")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train and evaluate a Random Forest for each k
    Train(TrainArgs),

    /// Write the feature table for one k as TSV
    Extract(ExtractArgs),

    /// Recompute AUCs from persisted ROC tables
    Summarize(SummarizeArgs),
}

/// Training arguments
#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// Classification task
    #[arg(short, long, value_enum, default_value = "cancer")]
    pub task: Task,

    /// FASTA source as LABEL=PATH (repeatable)
    #[arg(short, long = "fasta", value_parser = parse_source)]
    pub fasta: Vec<(String, PathBuf)>,

    /// k-mer sizes, comma separated
    #[arg(short, long, value_delimiter = ',')]
    pub kmers: Option<Vec<usize>>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of trees
    #[arg(long)]
    pub trees: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Test ratio
    #[arg(long)]
    pub test_ratio: Option<f64>,

    /// Rows drawn per cell type for the celltype task
    #[arg(long)]
    pub target_per_class: Option<usize>,

    /// Read at most this many records per FASTA source
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Output directory for the artifacts
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Cancer cell types, comma separated
    #[arg(long, value_delimiter = ',')]
    pub cancer: Option<Vec<String>>,

    /// Non-cancer cell types, comma separated
    #[arg(long, value_delimiter = ',')]
    pub normal: Option<Vec<String>>,

    /// Balance the cancer task without replacement
    #[arg(long)]
    pub without_replacement: bool,

    /// Stop at the first failing k
    #[arg(long)]
    pub fail_fast: bool,
}

impl TrainArgs {
    /// Merge the configuration file (if any) with the command-line overrides
    pub fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if !self.fasta.is_empty() {
            config.sources = self.fasta.into_iter().collect::<CellTypeSources>();
        }
        if let Some(kmers) = self.kmers {
            config.kmers = kmers;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(trees) = self.trees {
            config.forest.n_trees = trees;
        }
        if self.max_depth.is_some() {
            config.forest.max_depth = self.max_depth;
        }
        if let Some(ratio) = self.test_ratio {
            config.test_ratio = ratio;
        }
        if let Some(target) = self.target_per_class {
            config.sampling.target_per_class = target;
        }
        if let Some(max_records) = self.max_records {
            config.max_records = max_records;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(cancer) = self.cancer {
            config.binary_labels.positive = cancer.into_iter().collect();
        }
        if let Some(normal) = self.normal {
            config.binary_labels.negative = normal.into_iter().collect();
        }
        if self.without_replacement {
            config.sampling.binary_with_replacement = false;
        }
        if self.fail_fast {
            config.continue_on_error = false;
        }
        Ok(config)
    }
}

/// Feature extraction arguments
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// FASTA source as LABEL=PATH (repeatable)
    #[arg(short, long = "fasta", required = true, value_parser = parse_source)]
    pub fasta: Vec<(String, PathBuf)>,

    /// k-mer size
    #[arg(short, long, default_value_t = DEFAULT_KMER_SIZE)]
    pub kmer: usize,

    /// Output TSV file
    #[arg(short, long, required = true)]
    pub output: PathBuf,
}

/// ROC summary arguments
#[derive(Parser, Debug)]
pub struct SummarizeArgs {
    /// Task whose ROC tables are scanned
    #[arg(short, long, value_enum)]
    pub task: Task,

    /// Directory holding the ROC tables
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Write the AUC table to this file as well
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
