use crate::data::{Dataset, FeatureTable, Samples};
use crate::error::PipelineError;
use crate::Result;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Class name of binary label 0
pub const NEGATIVE_CLASS: &str = "non-cancer";
/// Class name of binary label 1
pub const POSITIVE_CLASS: &str = "cancer";

/// Cell-type grouping into cancer (positive) and non-cancer (negative) classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryLabels {
    /// Cancer cell types
    pub positive: BTreeSet<String>,
    /// Non-cancer cell types
    pub negative: BTreeSet<String>,
}

impl Default for BinaryLabels {
    fn default() -> Self {
        Self {
            positive: ["HepG2", "K562"].iter().map(|s| s.to_string()).collect(),
            negative: ["GM12878", "hESC"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BinaryLabels {
    /// 1 for cancer, 0 for non-cancer, `None` when the cell type is unmapped
    pub fn label(&self, cell_type: &str) -> Option<usize> {
        if self.positive.contains(cell_type) {
            Some(1)
        } else if self.negative.contains(cell_type) {
            Some(0)
        } else {
            None
        }
    }
}

/// How table rows are turned into class labels
#[derive(Debug, Clone, PartialEq)]
pub enum LabelStrategy {
    /// Cancer vs non-cancer
    Binary(BinaryLabels),
    /// One class per cell type
    CellType,
}

impl LabelStrategy {
    /// Class names indexed by label, sorted for the cell-type strategy
    pub fn class_names(&self, table: &FeatureTable) -> Vec<String> {
        match self {
            LabelStrategy::Binary(_) => vec![NEGATIVE_CLASS.to_string(), POSITIVE_CLASS.to_string()],
            LabelStrategy::CellType => table.cell_type_counts().into_keys().collect(),
        }
    }

    /// Label of each row against `class_names`
    pub fn labels(&self, table: &FeatureTable, class_names: &[String]) -> Vec<Option<usize>> {
        table
            .rows()
            .iter()
            .map(|row| match self {
                LabelStrategy::Binary(mapping) => mapping.label(&row.cell_type),
                LabelStrategy::CellType => class_names.iter().position(|c| *c == row.cell_type),
            })
            .collect()
    }
}

/// Balanced sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Rows drawn per cell type for multiclass balancing
    pub target_per_class: usize,
    /// Draw binary classes with replacement
    pub binary_with_replacement: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            target_per_class: 6000,
            binary_with_replacement: true,
        }
    }
}

fn draw(pool: &[usize], n: usize, replace: bool, rng: &mut ChaCha8Rng) -> Vec<usize> {
    if replace {
        (0..n).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
    } else {
        index::sample(rng, pool.len(), n)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    }
}

/// Equal-count cancer / non-cancer resampling.
///
/// Both classes are drawn down (or up, with replacement) to the size of the
/// smaller class, concatenated cancer first and shuffled.
pub fn balance_binary(
    table: &FeatureTable,
    labels: &BinaryLabels,
    replace: bool,
    rng: &mut ChaCha8Rng,
) -> Result<FeatureTable> {
    let mut positives = Vec::new();
    let mut negatives = Vec::new();
    let mut unmapped = BTreeSet::new();

    for (i, row) in table.rows().iter().enumerate() {
        match labels.label(&row.cell_type) {
            Some(1) => positives.push(i),
            Some(_) => negatives.push(i),
            None => {
                unmapped.insert(row.cell_type.as_str());
            }
        }
    }
    if !unmapped.is_empty() {
        warn!("Cell types without a cancer label are left out: {:?}", unmapped);
    }

    info!(
        "Balancing dataset: cancer={}, non-cancer={}",
        positives.len(),
        negatives.len()
    );

    let n = positives.len().min(negatives.len());
    if n == 0 {
        let group = if positives.is_empty() {
            POSITIVE_CLASS
        } else {
            NEGATIVE_CLASS
        };
        return Err(PipelineError::InsufficientData {
            group: group.to_string(),
            available: 0,
            requested: 1,
        });
    }

    let mut selected = draw(&positives, n, replace, rng);
    selected.extend(draw(&negatives, n, replace, rng));
    selected.shuffle(rng);

    info!("Balanced dataset size: {}", selected.len());
    Ok(table.select(&selected))
}

/// Draw `target` rows without replacement from every cell type
pub fn balance_per_group(
    table: &FeatureTable,
    target: usize,
    rng: &mut ChaCha8Rng,
) -> Result<FeatureTable> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        groups.entry(row.cell_type.as_str()).or_default().push(i);
    }

    if let Some((group, rows)) = groups.iter().find(|(_, rows)| rows.len() < target) {
        return Err(PipelineError::InsufficientData {
            group: group.to_string(),
            available: rows.len(),
            requested: target,
        });
    }

    let mut selected = Vec::with_capacity(target * groups.len());
    for (group, rows) in &groups {
        debug!("Sampling {} of {} rows from {}", target, rows.len(), group);
        selected.extend(draw(rows, target, false, rng));
    }
    selected.shuffle(rng);

    info!(
        "Balanced dataset size: {} ({} per cell type)",
        selected.len(),
        target
    );
    Ok(table.select(&selected))
}

/// Resample a feature table according to the label strategy
pub fn balance(
    table: &FeatureTable,
    strategy: &LabelStrategy,
    config: &SamplingConfig,
    rng: &mut ChaCha8Rng,
) -> Result<FeatureTable> {
    match strategy {
        LabelStrategy::Binary(labels) => {
            balance_binary(table, labels, config.binary_with_replacement, rng)
        }
        LabelStrategy::CellType => balance_per_group(table, config.target_per_class, rng),
    }
}

/// Per-class test counts proportional to class sizes, largest remainder first
fn allocate_test_counts(class_counts: &[usize], n_test: usize) -> Vec<usize> {
    let total: usize = class_counts.iter().sum();
    let exact: Vec<f64> = class_counts
        .iter()
        .map(|&c| n_test as f64 * c as f64 / total as f64)
        .collect();
    let mut counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut order: Vec<usize> = (0..class_counts.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(counts.iter().sum());
    for &class in order.iter().cycle().take(order.len() * 2) {
        if remaining == 0 {
            break;
        }
        if counts[class] < class_counts[class] {
            counts[class] += 1;
            remaining -= 1;
        }
    }
    counts
}

/// Stratified train/test split.
///
/// The test partition holds `ceil(test_ratio * n)` rows; every class keeps
/// its proportion and must be present in both partitions.
pub fn stratified_split(
    table: &FeatureTable,
    strategy: &LabelStrategy,
    test_ratio: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Dataset> {
    let class_names = strategy.class_names(table);
    let labels = strategy.labels(table, &class_names);

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); class_names.len()];
    for (i, label) in labels.iter().enumerate() {
        if let Some(label) = label {
            by_class[*label].push(i);
        }
    }

    let class_counts: Vec<usize> = by_class.iter().map(Vec::len).collect();
    let n: usize = class_counts.iter().sum();
    let n_test = (test_ratio * n as f64).ceil() as usize;
    if class_counts.iter().any(|&c| c == 0) {
        return Err(PipelineError::LabelMismatch(format!(
            "classes {:?} have row counts {:?}",
            class_names, class_counts
        )));
    }
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::LabelMismatch(format!(
            "cannot split {} rows with test ratio {}",
            n, test_ratio
        )));
    }

    let test_counts = allocate_test_counts(&class_counts, n_test);
    for (class, (&count, &n_class)) in test_counts.iter().zip(&class_counts).enumerate() {
        if count == 0 || count == n_class {
            return Err(PipelineError::LabelMismatch(format!(
                "class `{}` absent from the {} partition",
                class_names[class],
                if count == 0 { "test" } else { "train" }
            )));
        }
    }

    let mut train_idx = Vec::with_capacity(n - n_test);
    let mut test_idx = Vec::with_capacity(n_test);
    for (rows, &count) in by_class.iter_mut().zip(&test_counts) {
        rows.shuffle(rng);
        test_idx.extend_from_slice(&rows[..count]);
        train_idx.extend_from_slice(&rows[count..]);
    }
    train_idx.shuffle(rng);
    test_idx.shuffle(rng);

    let samples = |idx: &[usize]| Samples {
        features: idx.iter().map(|&i| table.rows()[i].values.clone()).collect(),
        targets: idx
            .iter()
            .filter_map(|&i| labels[i])
            .collect(),
    };

    let dataset = Dataset {
        class_names,
        feature_names: table.columns().to_vec(),
        train: samples(&train_idx),
        test: samples(&test_idx),
    };

    info!(
        "Dataset split: train={}, test={}",
        dataset.train.len(),
        dataset.test.len()
    );
    debug!(
        "Train distribution: {:?}, test distribution: {:?}",
        dataset.train.class_counts(dataset.n_classes()),
        dataset.test.class_counts(dataset.n_classes())
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureVector;
    use crate::utils::random::seeded_rng;

    fn table(counts: &[(&str, usize)]) -> FeatureTable {
        let mut vectors = Vec::new();
        for (cell_type, n) in counts {
            for i in 0..*n {
                vectors.push(FeatureVector {
                    sequence_id: format!("{}_{}", cell_type, i),
                    cell_type: cell_type.to_string(),
                    length: i,
                    gc_content: 0.0,
                    entropy: 0.0,
                    kmers: Default::default(),
                });
            }
        }
        FeatureTable::from_vectors(vectors)
    }

    fn count(table: &FeatureTable, labels: &BinaryLabels, label: usize) -> usize {
        table
            .rows()
            .iter()
            .filter(|r| labels.label(&r.cell_type) == Some(label))
            .count()
    }

    #[test]
    fn test_binary_balance_equal_counts() {
        let t = table(&[("GM12878", 30), ("hESC", 20), ("HepG2", 12), ("K562", 3)]);
        let labels = BinaryLabels::default();
        let balanced = balance_binary(&t, &labels, true, &mut seeded_rng(42)).unwrap();

        assert_eq!(balanced.len(), 30);
        assert_eq!(count(&balanced, &labels, 1), 15);
        assert_eq!(count(&balanced, &labels, 0), 15);
    }

    #[test]
    fn test_binary_balance_without_replacement_is_unique() {
        let t = table(&[("GM12878", 10), ("HepG2", 6)]);
        let balanced =
            balance_binary(&t, &BinaryLabels::default(), false, &mut seeded_rng(1)).unwrap();
        let ids: BTreeSet<_> = balanced.rows().iter().map(|r| r.sequence_id.clone()).collect();
        assert_eq!(balanced.len(), 12);
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_binary_balance_empty_class() {
        let t = table(&[("GM12878", 10)]);
        let err = balance_binary(&t, &BinaryLabels::default(), true, &mut seeded_rng(1)).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn test_group_balance() {
        let t = table(&[("A", 10), ("B", 7), ("C", 5)]);
        let balanced = balance_per_group(&t, 5, &mut seeded_rng(42)).unwrap();
        assert_eq!(balanced.len(), 15);
        assert!(balanced.cell_type_counts().values().all(|&c| c == 5));

        let ids: BTreeSet<_> = balanced.rows().iter().map(|r| r.sequence_id.clone()).collect();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_group_balance_insufficient() {
        let t = table(&[("A", 10), ("B", 4)]);
        match balance_per_group(&t, 5, &mut seeded_rng(42)) {
            Err(PipelineError::InsufficientData {
                group,
                available,
                requested,
            }) => {
                assert_eq!(group, "B");
                assert_eq!(available, 4);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_balance_is_deterministic() {
        let t = table(&[("GM12878", 40), ("HepG2", 25)]);
        let a = balance_binary(&t, &BinaryLabels::default(), true, &mut seeded_rng(7)).unwrap();
        let b = balance_binary(&t, &BinaryLabels::default(), true, &mut seeded_rng(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_allocate_test_counts() {
        assert_eq!(allocate_test_counts(&[50, 50], 20), vec![10, 10]);
        assert_eq!(allocate_test_counts(&[5, 5, 5], 4), vec![2, 1, 1]);
        assert_eq!(allocate_test_counts(&[3, 7], 2).iter().sum::<usize>(), 2);
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let t = table(&[("A", 40), ("B", 20), ("C", 20)]);
        let dataset =
            stratified_split(&t, &LabelStrategy::CellType, 0.2, &mut seeded_rng(42)).unwrap();

        assert_eq!(dataset.class_names, vec!["A", "B", "C"]);
        assert_eq!(dataset.test.len(), 16);
        assert_eq!(dataset.train.len(), 64);
        assert_eq!(dataset.test.class_counts(3), vec![8, 4, 4]);
        assert_eq!(dataset.train.class_counts(3), vec![32, 16, 16]);
    }

    #[test]
    fn test_stratified_split_missing_class() {
        let t = table(&[("GM12878", 10)]);
        let strategy = LabelStrategy::Binary(BinaryLabels::default());
        let err = stratified_split(&t, &strategy, 0.2, &mut seeded_rng(42)).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_stratified_split_class_too_small_for_test() {
        let t = table(&[("A", 20), ("B", 1)]);
        let err = stratified_split(&t, &LabelStrategy::CellType, 0.2, &mut seeded_rng(42))
            .unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }
}
