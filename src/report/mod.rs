//! Evaluation artifacts written per task and k-mer size, and the ROC table
//! scan used to compare curves across k.

use crate::error::PipelineError;
use crate::model::metrics::{checked_auc, ClassMetrics, ConfusionMatrix, RocCurve};
use crate::training::Task;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Header of the AUC summary table
pub const AUC_SUMMARY_HEADER: [&str; 2] = ["k-mer", "AUC"];
/// Header of a ROC table
pub const ROC_HEADER: [&str; 2] = ["FPR", "TPR"];

pub fn roc_file_name(task: Task, k: usize) -> String {
    format!("rocdata_{}_k{}.txt", task, k)
}

pub fn auc_summary_file_name(task: Task) -> String {
    format!("auc_{}.txt", task)
}

pub fn confusion_file_name(task: Task, k: usize) -> String {
    format!("confusion_matrix_{}_k{}.tsv", task, k)
}

pub fn report_file_name(task: Task, k: usize) -> String {
    format!("report_{}_k{}.json", task, k)
}

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer)
}

/// Write (FPR, TPR) points with six decimals under a `FPR\tTPR` header
pub fn write_roc_table<P: AsRef<Path>>(path: P, curve: &RocCurve) -> Result<()> {
    let mut wtr = tsv_writer(File::create(path.as_ref())?);
    wtr.write_record(ROC_HEADER)?;
    for (fpr, tpr) in curve.fpr.iter().zip(&curve.tpr) {
        wtr.write_record([format!("{:.6}", fpr), format!("{:.6}", tpr)])?;
    }
    wtr.flush()?;
    debug!("Wrote {} ROC points to {:?}", curve.len(), path.as_ref());
    Ok(())
}

/// Read the points of a ROC table, skipping its header line
pub fn read_roc_table<P: AsRef<Path>>(path: P) -> Result<Vec<(f64, f64)>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let mut points = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let parse = |idx: usize| -> Result<f64> {
            record
                .get(idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| {
                    PipelineError::data_source(path, format!("bad value on data line {}", i + 1))
                })
        };
        if record.len() != 2 {
            return Err(PipelineError::data_source(
                path,
                format!("expected 2 columns on data line {}, got {}", i + 1, record.len()),
            ));
        }
        points.push((parse(0)?, parse(1)?));
    }
    Ok(points)
}

/// Confusion matrix as a labelled tab separated grid (rows true, columns predicted)
pub fn write_confusion_matrix<P: AsRef<Path>>(path: P, matrix: &ConfusionMatrix) -> Result<()> {
    let mut wtr = tsv_writer(File::create(path.as_ref())?);
    let mut header = vec!["true\\predicted".to_string()];
    header.extend(matrix.labels.iter().cloned());
    wtr.write_record(&header)?;
    for (label, row) in matrix.labels.iter().zip(&matrix.counts) {
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|c| c.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Per-task `k-mer\tAUC` table; reset once per run, appended once per k
#[derive(Debug, Clone)]
pub struct AucSummary {
    path: PathBuf,
}

impl AucSummary {
    /// Truncate the table and write its header
    pub fn reset<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path)?;
        writeln!(file, "{}", AUC_SUMMARY_HEADER.join("\t"))?;
        info!("Reset AUC summary {:?}", path);
        Ok(Self { path })
    }

    /// Append the AUC of one k, four decimals
    pub fn append(&self, k: usize, auc: f64) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{}\t{:.4}", k, auc)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Everything measured for one k
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: Task,
    pub k: usize,
    pub class_names: Vec<String>,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub auc: f64,
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub class_metrics: Vec<ClassMetrics>,
}

impl EvaluationReport {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Print summary to stdout
    pub fn print(&self) {
        println!("\n=== {} classification (k={}) ===", self.task, self.k);
        println!("Train / test rows: {} / {}", self.n_train, self.n_test);
        println!("Features: {}", self.n_features);
        println!("Accuracy: {:.4}", self.accuracy);
        println!("AUC: {:.4}", self.auc);
        for m in &self.class_metrics {
            println!(
                "  {:<12} precision={:.3} recall={:.3} f1={:.3} support={}",
                m.label, m.precision, m.recall, m.f1, m.support
            );
        }
        println!("==========================\n");
    }
}

/// One ROC table found by [`summarize_roc_files`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocSummaryEntry {
    pub k: usize,
    pub path: PathBuf,
    pub n_points: usize,
    pub auc: f64,
}

fn kmer_from_file_name(file_name: &str, task: Task) -> Option<usize> {
    let prefix = format!("rocdata_{}_k", task);
    file_name
        .strip_prefix(&prefix)?
        .strip_suffix(".txt")?
        .parse()
        .ok()
}

/// Recompute the AUC of every `rocdata_<task>_k*.txt` in `dir`.
///
/// Unreadable, malformed or empty tables are skipped with a warning.
pub fn summarize_roc_files<P: AsRef<Path>>(dir: P, task: Task) -> Result<Vec<RocSummaryEntry>> {
    let dir = dir.as_ref();
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let k = match path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| kmer_from_file_name(n, task))
        {
            Some(k) => k,
            None => continue,
        };

        match read_roc_table(&path) {
            Ok(points) if points.is_empty() => {
                warn!("Skipping empty ROC table {:?}", path);
            }
            Ok(points) => {
                let (fpr, tpr): (Vec<f64>, Vec<f64>) = points.iter().copied().unzip();
                match checked_auc(&fpr, &tpr) {
                    Ok(auc) => entries.push(RocSummaryEntry {
                        k,
                        path,
                        n_points: points.len(),
                        auc,
                    }),
                    Err(e) => warn!("Skipping ROC table {:?}: {}", path, e),
                }
            }
            Err(e) => {
                warn!("Error reading {:?}: {}", path, e);
            }
        }
    }

    entries.sort_by_key(|e| e.k);
    info!("Found {} {} ROC tables in {:?}", entries.len(), task, dir);
    Ok(entries)
}

/// Write summary entries as a `k-mer\tAUC` table
pub fn write_auc_table<W: Write>(entries: &[RocSummaryEntry], writer: W) -> Result<()> {
    let mut wtr = tsv_writer(writer);
    wtr.write_record(AUC_SUMMARY_HEADER)?;
    for entry in entries {
        wtr.write_record([entry.k.to_string(), format!("{:.4}", entry.auc)])?;
    }
    wtr.flush()?;
    Ok(())
}
