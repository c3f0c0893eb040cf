//! Sequence-derived features: length, GC content, Shannon entropy and
//! normalized k-mer frequencies.

use crate::data::loader::{CellTypeSources, FastaLoader};
use crate::data::{FeatureTable, FeatureVector, SequenceRecord};
use crate::error::PipelineError;
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Fraction of G/C bases (case-insensitive), 0 for an empty sequence
pub fn gc_content(seq: &[u8]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }
    let gc = seq
        .iter()
        .filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c'))
        .count();
    gc as f64 / seq.len() as f64
}

/// Shannon entropy in bits of the uppercased symbol composition
pub fn shannon_entropy(seq: &[u8]) -> f64 {
    let mut counts = [0usize; 256];
    for b in seq {
        counts[b.to_ascii_uppercase() as usize] += 1;
    }
    let total = seq.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Overlapping k-mer counts divided by the number of windows.
///
/// Keys are the uppercased k-mers. Empty when `k` is 0 or exceeds the
/// sequence length.
pub fn kmer_frequencies(seq: &[u8], k: usize) -> BTreeMap<String, f64> {
    if k == 0 || seq.len() < k {
        return BTreeMap::new();
    }
    let upper = seq.to_ascii_uppercase();
    let mut counts: HashMap<&[u8], usize> = HashMap::new();
    for window in upper.windows(k) {
        *counts.entry(window).or_insert(0) += 1;
    }
    let total = (upper.len() - k + 1) as f64;
    counts
        .into_iter()
        .map(|(kmer, count)| (String::from_utf8_lossy(kmer).into_owned(), count as f64 / total))
        .collect()
}

/// Column name used for a k-mer in the feature table
pub fn kmer_column(k: usize, kmer: &str) -> String {
    format!("kmer_{}_{}", k, kmer)
}

/// Builds feature vectors for a fixed k
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    k: usize,
}

impl FeatureExtractor {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(PipelineError::InvalidConfig(
                "k-mer size must be a positive integer".to_string(),
            ));
        }
        Ok(Self { k })
    }

    /// Features of a single record
    pub fn vector(&self, record: &SequenceRecord) -> FeatureVector {
        let seq = record.sequence.as_bytes();
        let kmers = kmer_frequencies(seq, self.k)
            .into_iter()
            .map(|(kmer, freq)| (kmer_column(self.k, &kmer), freq))
            .collect();

        FeatureVector {
            sequence_id: record.id.clone(),
            cell_type: record.cell_type.clone(),
            length: seq.len(),
            gc_content: gc_content(seq),
            entropy: shannon_entropy(seq),
            kmers,
        }
    }

    /// Dense feature table over already parsed records
    pub fn transform(&self, records: &[SequenceRecord]) -> FeatureTable {
        let vectors: Vec<FeatureVector> = records.iter().map(|r| self.vector(r)).collect();
        let table = FeatureTable::from_vectors(vectors);
        debug!(
            "k={}: {} rows x {} columns",
            self.k,
            table.len(),
            table.columns().len()
        );
        table
    }
}

/// Read every FASTA source and build the feature table for `k`
pub fn extract_features(sources: &CellTypeSources, k: usize) -> Result<FeatureTable> {
    let extractor = FeatureExtractor::new(k)?;
    let records = FastaLoader::new().load_all(sources)?;
    info!("Extracting features for k={}", k);
    Ok(extractor.transform(&records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gc_content() {
        assert_eq!(gc_content(b""), 0.0);
        assert_eq!(gc_content(b"GCgc"), 1.0);
        assert_eq!(gc_content(b"ATGC"), 0.5);
        assert_eq!(gc_content(b"NNNN"), 0.0);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(shannon_entropy(b""), 0.0);
        assert_eq!(shannon_entropy(b"AAAA"), 0.0);
        assert_eq!(shannon_entropy(b"aAaA"), 0.0);
        assert!((shannon_entropy(b"ACGTACGT") - 2.0).abs() < 1e-12);
        assert!((shannon_entropy(b"AACC") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kmer_frequencies_sum_to_one() {
        let freqs = kmer_frequencies(b"ACGTTGCAacgt", 3);
        let total: f64 = freqs.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // uppercased before counting: ACG appears twice in 10 windows
        assert!((freqs["ACG"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_kmer_longer_than_sequence() {
        assert!(kmer_frequencies(b"ACG", 4).is_empty());
        assert_eq!(kmer_frequencies(b"ACG", 3).len(), 1);
    }

    #[test]
    fn test_short_sequence_keeps_scalar_features() {
        let extractor = FeatureExtractor::new(5).unwrap();
        let vector = extractor.vector(&SequenceRecord::new("s", "GC", "HepG2"));
        assert_eq!(vector.length, 2);
        assert_eq!(vector.gc_content, 1.0);
        assert!(vector.kmers.is_empty());
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(
            FeatureExtractor::new(0),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transform_schema() {
        let records = vec![
            SequenceRecord::new("a", "ACGTACGTAC", "GM12878"),
            SequenceRecord::new("b", "GGGGGGGGGG", "GM12878"),
            SequenceRecord::new("c", "ATATATATAT", "K562"),
            SequenceRecord::new("d", "CCGGAATTCC", "K562"),
        ];
        let table = FeatureExtractor::new(3).unwrap().transform(&records);

        assert_eq!(table.len(), 4);
        assert_eq!(&table.columns()[..3], &["length", "gc_content", "entropy"]);
        let expected: std::collections::BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.sequence.as_bytes().windows(3).map(|w| {
                kmer_column(3, std::str::from_utf8(w).unwrap())
            }))
            .collect();
        assert_eq!(expected.len(), 15);
        assert_eq!(table.columns().len(), 18);
        assert_eq!(
            table.columns()[3..].to_vec(),
            expected.into_iter().collect::<Vec<_>>()
        );
        assert!(table
            .rows()
            .iter()
            .all(|r| r.values.len() == table.columns().len() && r.values.iter().all(|v| !v.is_nan())));
        assert_eq!(table.value(1, "kmer_3_GGG"), Some(1.0));
        assert_eq!(table.value(0, "kmer_3_GGG"), Some(0.0));
    }
}
