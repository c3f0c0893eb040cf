//! Classification metrics: confusion matrix, ROC curves and AUC.

use crate::error::PipelineError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Counts of true (rows) against predicted (columns) class labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally predictions over a fixed label ordering
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::LabelMismatch(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        let n = labels.len();
        let mut counts = vec![vec![0usize; n]; n];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= n || p >= n {
                return Err(PipelineError::LabelMismatch(format!(
                    "label index {} outside of {:?}",
                    t.max(p),
                    labels
                )));
            }
            counts[t][p] += 1;
        }
        Ok(Self {
            labels: labels.to_vec(),
            counts,
        })
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Fraction of predictions on the diagonal
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.labels.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Number of true samples of a class
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    pub fn precision(&self, class: usize) -> f64 {
        let predicted: usize = self.counts.iter().map(|row| row[class]).sum();
        if predicted > 0 {
            self.counts[class][class] as f64 / predicted as f64
        } else {
            0.0
        }
    }

    pub fn recall(&self, class: usize) -> f64 {
        let actual = self.support(class);
        if actual > 0 {
            self.counts[class][class] as f64 / actual as f64
        } else {
            0.0
        }
    }

    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| ClassMetrics {
                label: label.clone(),
                precision: self.precision(i),
                recall: self.recall(i),
                f1: self.f1(i),
                support: self.support(i),
            })
            .collect()
    }
}

/// Receiver operating characteristic curve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score thresholds, decreasing; the first one is `+inf`
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    pub fn len(&self) -> usize {
        self.fpr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fpr.is_empty()
    }

    /// Area under the curve
    pub fn auc(&self) -> f64 {
        auc(&self.fpr, &self.tpr)
    }
}

/// Trapezoidal area under a curve given by monotonic `x`
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum();
    let decreasing = x.windows(2).all(|xs| xs[1] <= xs[0]) && x.windows(2).any(|xs| xs[1] < xs[0]);
    if decreasing {
        -area
    } else {
        area
    }
}

/// Like [`auc`], but fails when `x` is neither non-decreasing nor non-increasing
pub fn checked_auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(PipelineError::LabelMismatch(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    let increasing = x.windows(2).all(|xs| xs[1] >= xs[0]);
    let decreasing = x.windows(2).all(|xs| xs[1] <= xs[0]);
    if !increasing && !decreasing {
        return Err(PipelineError::LabelMismatch(
            "x is neither increasing nor decreasing".to_string(),
        ));
    }
    Ok(auc(x, y))
}

/// ROC curve of `scores` against binary truth.
///
/// One point per distinct score, collinear intermediate points dropped and
/// `(0, 0)` prepended. Fails when only one class is present.
pub fn roc_curve(y_true: &[bool], scores: &[f64]) -> Result<RocCurve> {
    if y_true.len() != scores.len() {
        return Err(PipelineError::LabelMismatch(format!(
            "{} labels but {} scores",
            y_true.len(),
            scores.len()
        )));
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        if y_true[i] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_score = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_score {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[i]);
        }
    }

    if tp == 0.0 || fp == 0.0 {
        return Err(PipelineError::LabelMismatch(
            "ROC curve needs both positive and negative samples".to_string(),
        ));
    }

    let keep: Vec<usize> = (0..tps.len())
        .filter(|&i| {
            i == 0
                || i + 1 == tps.len()
                || fps[i - 1] - 2.0 * fps[i] + fps[i + 1] != 0.0
                || tps[i - 1] - 2.0 * tps[i] + tps[i + 1] != 0.0
        })
        .collect();

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(fps[i] / fp);
        curve.tpr.push(tps[i] / tp);
        curve.thresholds.push(thresholds[i]);
    }
    Ok(curve)
}

/// Area under the ROC curve
pub fn roc_auc(y_true: &[bool], scores: &[f64]) -> Result<f64> {
    Ok(roc_curve(y_true, scores)?.auc())
}

/// One indicator column per class
pub fn label_binarize(targets: &[usize], n_classes: usize) -> Vec<Vec<bool>> {
    targets
        .iter()
        .map(|&t| (0..n_classes).map(|c| c == t).collect())
        .collect()
}

fn check_proba(targets: &[usize], proba: &[Vec<f64>], n_classes: usize) -> Result<()> {
    if targets.len() != proba.len() {
        return Err(PipelineError::LabelMismatch(format!(
            "{} labels but {} probability rows",
            targets.len(),
            proba.len()
        )));
    }
    if proba.iter().any(|row| row.len() != n_classes) {
        return Err(PipelineError::LabelMismatch(format!(
            "probability rows must have {} columns",
            n_classes
        )));
    }
    Ok(())
}

/// Macro-averaged one-vs-rest AUC.
///
/// With two classes this is the plain AUC of class 1.
pub fn ovr_macro_auc(targets: &[usize], proba: &[Vec<f64>], n_classes: usize) -> Result<f64> {
    check_proba(targets, proba, n_classes)?;
    if n_classes == 2 {
        let truth: Vec<bool> = targets.iter().map(|&t| t == 1).collect();
        let scores: Vec<f64> = proba.iter().map(|p| p[1]).collect();
        return roc_auc(&truth, &scores);
    }

    let mut total = 0.0;
    for class in 0..n_classes {
        let truth: Vec<bool> = targets.iter().map(|&t| t == class).collect();
        let scores: Vec<f64> = proba.iter().map(|p| p[class]).collect();
        total += roc_auc(&truth, &scores).map_err(|_| {
            PipelineError::LabelMismatch(format!("class {} absent from the test labels", class))
        })?;
    }
    Ok(total / n_classes as f64)
}

/// ROC curve over the flattened indicator matrix against the flattened probabilities
pub fn micro_roc_curve(targets: &[usize], proba: &[Vec<f64>], n_classes: usize) -> Result<RocCurve> {
    check_proba(targets, proba, n_classes)?;
    let truth: Vec<bool> = label_binarize(targets, n_classes).into_iter().flatten().collect();
    let scores: Vec<f64> = proba.iter().flatten().copied().collect();
    roc_curve(&truth, &scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_confusion_matrix() {
        let cm = ConfusionMatrix::from_predictions(
            &[1, 0, 0, 0, 1],
            &[1, 0, 1, 0, 1],
            &labels(&["non-cancer", "cancer"]),
        )
        .unwrap();

        assert_eq!(cm.counts, vec![vec![2, 1], vec![0, 2]]);
        assert_eq!(cm.accuracy(), 0.8);
        assert_eq!(cm.precision(1), 2.0 / 3.0);
        assert_eq!(cm.recall(1), 1.0);
        assert!((cm.f1(1) - 0.8).abs() < 0.01);
        assert_eq!(cm.support(0), 3);
    }

    #[test]
    fn test_confusion_matrix_unknown_label() {
        let err = ConfusionMatrix::from_predictions(&[0, 2], &[0, 1], &labels(&["a", "b"])).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_roc_perfect_separation() {
        let truth = [true, true, false, false];
        let scores = [0.9, 0.8, 0.2, 0.1];
        let curve = roc_curve(&truth, &scores).unwrap();

        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(curve.thresholds[0], f64::INFINITY);
        assert_eq!(roc_auc(&truth, &scores).unwrap(), 1.0);
    }

    #[test]
    fn test_roc_inverted_and_ties() {
        assert_eq!(roc_auc(&[false, false, true, true], &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        // all scores tied: single diagonal step
        assert_eq!(roc_auc(&[true, false, true, false], &[0.5; 4]).unwrap(), 0.5);
    }

    #[test]
    fn test_roc_known_value() {
        // sklearn.metrics.roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let auc = roc_auc(&[false, false, true, true], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_single_class() {
        let err = roc_curve(&[true, true], &[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_random_scores_near_half() {
        use crate::utils::random::seeded_rng;
        use rand::Rng;

        let mut rng = seeded_rng(11);
        let truth: Vec<bool> = (0..4000).map(|i| i % 2 == 0).collect();
        let scores: Vec<f64> = (0..4000).map(|_| rng.gen::<f64>()).collect();
        let auc = roc_auc(&truth, &scores).unwrap();
        assert!((auc - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_auc_direction() {
        assert_eq!(auc(&[0.0, 1.0], &[1.0, 1.0]), 1.0);
        assert_eq!(auc(&[1.0, 0.0], &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn test_checked_auc_rejects_unordered_x() {
        assert_eq!(checked_auc(&[0.0, 0.5, 1.0], &[0.0, 1.0, 1.0]).unwrap(), 0.75);
        assert_eq!(checked_auc(&[1.0, 0.0], &[1.0, 1.0]).unwrap(), 1.0);
        assert!(matches!(
            checked_auc(&[0.0, 0.8, 0.2, 1.0], &[0.0, 0.5, 0.7, 1.0]),
            Err(PipelineError::LabelMismatch(_))
        ));
        assert!(checked_auc(&[0.0, 1.0], &[0.0]).is_err());
    }

    #[test]
    fn test_label_binarize() {
        assert_eq!(
            label_binarize(&[0, 2], 3),
            vec![vec![true, false, false], vec![false, false, true]]
        );
    }

    #[test]
    fn test_ovr_macro_auc() {
        let targets = [0, 1, 2, 0, 1, 2];
        let proba = vec![
            vec![0.8, 0.1, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.1, 0.1, 0.8],
            vec![0.7, 0.2, 0.1],
            vec![0.2, 0.7, 0.1],
            vec![0.2, 0.1, 0.7],
        ];
        assert_eq!(ovr_macro_auc(&targets, &proba, 3).unwrap(), 1.0);

        let curve = micro_roc_curve(&targets, &proba, 3).unwrap();
        assert_eq!(curve.auc(), 1.0);
        assert_eq!(*curve.fpr.last().unwrap(), 1.0);
    }

    #[test]
    fn test_ovr_missing_class() {
        let targets = [0, 1, 0, 1];
        let proba = vec![vec![0.5, 0.3, 0.2]; 4];
        let err = ovr_macro_auc(&targets, &proba, 3).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMismatch(_)));
    }

    #[test]
    fn test_ovr_binary_fallback() {
        let proba = vec![vec![0.9, 0.1], vec![0.2, 0.8]];
        assert_eq!(ovr_macro_auc(&[0, 1], &proba, 2).unwrap(), 1.0);
    }
}
