pub mod loader;
pub mod preprocessing;
pub mod feature_engineering;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Default k-mer length
pub const DEFAULT_KMER_SIZE: usize = 5;

/// Per-sequence scalar columns that precede the k-mer columns
pub const BASE_COLUMNS: [&str; 3] = ["length", "gc_content", "entropy"];

/// A single FASTA entry tagged with the cell type it was read for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// FASTA identifier
    pub id: String,
    /// Raw nucleotide string
    pub sequence: String,
    /// Cell-type label of the source file
    pub cell_type: String,
}

impl SequenceRecord {
    pub fn new<I: Into<String>, S: Into<String>, C: Into<String>>(id: I, sequence: S, cell_type: C) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
            cell_type: cell_type.into(),
        }
    }
}

/// Features derived from one sequence, k-mer frequencies kept sparse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Sequence identifier
    pub sequence_id: String,
    /// Cell-type label
    pub cell_type: String,
    /// Number of characters in the sequence
    pub length: usize,
    /// Fraction of G/C bases
    pub gc_content: f64,
    /// Shannon entropy of the base composition in bits
    pub entropy: f64,
    /// Column name (`kmer_<k>_<KMER>`) to normalized frequency
    pub kmers: BTreeMap<String, f64>,
}

/// Dense row of a [`FeatureTable`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub sequence_id: String,
    pub cell_type: String,
    /// Values in the order of [`FeatureTable::columns`]
    pub values: Vec<f64>,
}

/// Rectangular feature table, one row per sequence.
///
/// Columns are the base columns followed by the union of every k-mer seen in
/// any sequence (sorted); k-mers absent from a sequence are filled with 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Densify sparse feature vectors into a table
    pub fn from_vectors(vectors: Vec<FeatureVector>) -> Self {
        let kmer_columns: BTreeSet<String> = vectors
            .iter()
            .flat_map(|v| v.kmers.keys().cloned())
            .collect();

        let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(kmer_columns);

        let rows = vectors
            .into_iter()
            .map(|vector| {
                let mut values = Vec::with_capacity(columns.len());
                values.push(vector.length as f64);
                values.push(vector.gc_content);
                values.push(vector.entropy);
                for column in &columns[BASE_COLUMNS.len()..] {
                    values.push(vector.kmers.get(column).copied().unwrap_or(0.0));
                }
                FeatureRow {
                    sequence_id: vector.sequence_id,
                    cell_type: vector.cell_type,
                    values,
                }
            })
            .collect();

        Self { columns, rows }
    }

    /// Numeric column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value of a named column in a given row
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.values.get(idx).copied())
    }

    /// New table holding the given rows (repeats allowed) in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Number of rows per cell type
    pub fn cell_type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.cell_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Write the table as tab separated text with an identifier-first header
    pub fn write_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = vec!["sequence_id".to_string(), "cell_type".to_string()];
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![row.sequence_id.clone(), row.cell_type.clone()];
            record.extend(row.values.iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Feature matrix with class-index targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<usize>,
}

impl Samples {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rows per class index
    pub fn class_counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_classes];
        for &t in &self.targets {
            if t < n_classes {
                counts[t] += 1;
            }
        }
        counts
    }
}

/// Train/test partitions ready for fitting
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Class names, indexed by target value
    pub class_names: Vec<String>,
    /// Feature column names
    pub feature_names: Vec<String>,
    /// Training samples
    pub train: Samples,
    /// Test samples
    pub test: Samples,
}

impl Dataset {
    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }
}
