use crate::data::feature_engineering::FeatureExtractor;
use crate::data::loader::{FastaLoader, LoaderConfig};
use crate::data::preprocessing::{balance, stratified_split};
use crate::data::{Dataset, SequenceRecord};
use crate::model::forest::RandomForest;
use crate::model::metrics::{micro_roc_curve, ovr_macro_auc, roc_curve, ConfusionMatrix, RocCurve};
use crate::report::{
    auc_summary_file_name, confusion_file_name, report_file_name, roc_file_name,
    write_confusion_matrix, write_roc_table, AucSummary, EvaluationReport,
};
use crate::training::{KmerResult, PipelineConfig, RunSummary, Task};
use crate::utils::{ensure_dir, format_duration, random::seeded_rng};
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, error, info};

/// Predictions of a fitted forest on the test partition
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub confusion_matrix: ConfusionMatrix,
    pub roc: RocCurve,
    pub auc: f64,
}

/// Fit a forest on the training partition and score it on the test partition.
///
/// Two classes: ROC and AUC of the class-1 probability. More classes: macro
/// one-vs-rest AUC, with the ROC table taken over the flattened indicator matrix.
pub fn fit_and_evaluate(
    config: &PipelineConfig,
    dataset: &Dataset,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<Evaluation> {
    let n_classes = dataset.n_classes();
    let forest = RandomForest::fit(&config.forest, &dataset.train, n_classes, rng)?;

    let proba = forest.predict_proba(&dataset.test.features);
    let predictions: Vec<usize> = proba.iter().map(|p| crate::model::tree::argmax(p)).collect();
    let confusion_matrix =
        ConfusionMatrix::from_predictions(&dataset.test.targets, &predictions, &dataset.class_names)?;

    let (roc, auc) = if n_classes == 2 {
        let truth: Vec<bool> = dataset.test.targets.iter().map(|&t| t == 1).collect();
        let scores: Vec<f64> = proba.iter().map(|p| p[1]).collect();
        let roc = roc_curve(&truth, &scores)?;
        let auc = roc.auc();
        (roc, auc)
    } else {
        let auc = ovr_macro_auc(&dataset.test.targets, &proba, n_classes)?;
        let roc = micro_roc_curve(&dataset.test.targets, &proba, n_classes)?;
        (roc, auc)
    };

    Ok(Evaluation {
        confusion_matrix,
        roc,
        auc,
    })
}

/// Runs the extract, balance, split, fit and evaluate sequence for every k
pub struct Trainer {
    config: PipelineConfig,
    task: Task,
}

impl Trainer {
    pub fn new(config: PipelineConfig, task: Task) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, task })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn task(&self) -> Task {
        self.task
    }

    /// Run every configured k in order.
    ///
    /// Loading the FASTA sources or resetting the AUC summary aborts the run.
    /// A failing k either aborts too or is recorded in the summary, depending
    /// on `continue_on_error`.
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        ensure_dir(&self.config.output_dir)?;

        let loader = FastaLoader::with_config(LoaderConfig {
            max_records: self.config.max_records,
        });
        let records = loader.load_all(&self.config.sources)?;

        let summary_path = self
            .config
            .output_dir
            .join(auc_summary_file_name(self.task));
        let auc_summary = AucSummary::reset(&summary_path)?;

        let pb = ProgressBar::new(self.config.kmers.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut summary = RunSummary {
            auc_summary: Some(summary_path),
            ..RunSummary::default()
        };

        for &k in &self.config.kmers {
            pb.set_message(format!("{} k={}", self.task, k));
            match self.run_k(&records, k, &auc_summary) {
                Ok(result) => {
                    info!(
                        "k={} finished in {}: AUC={:.4}, accuracy={:.4}",
                        k,
                        format_duration(result.duration_secs),
                        result.auc,
                        result.accuracy
                    );
                    summary.results.push(result);
                }
                Err(e) if self.config.continue_on_error => {
                    error!("Error processing k={}: {}", k, e);
                    summary.failures.push((k, e.to_string()));
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_with_message(format!("{} done", self.task));

        summary.duration_secs = start.elapsed().as_secs_f64();
        info!(
            "Run finished in {}: {} succeeded, {} failed",
            format_duration(summary.duration_secs),
            summary.results.len(),
            summary.failures.len()
        );
        Ok(summary)
    }

    /// One k iteration, persisting its ROC table, confusion matrix and report
    pub fn run_k(
        &self,
        records: &[SequenceRecord],
        k: usize,
        auc_summary: &AucSummary,
    ) -> Result<KmerResult> {
        let start = Instant::now();
        info!("Processing {} task with k={}", self.task, k);

        let table = FeatureExtractor::new(k)?.transform(records);
        debug!(
            "Feature table: {} rows x {} columns",
            table.len(),
            table.columns().len()
        );

        let mut rng = seeded_rng(self.config.seed);
        let strategy = self.config.label_strategy(self.task);
        let balanced = balance(&table, &strategy, &self.config.sampling, &mut rng)?;
        let dataset = stratified_split(&balanced, &strategy, self.config.test_ratio, &mut rng)?;
        info!(
            "Split: {} train / {} test across {} classes",
            dataset.train.len(),
            dataset.test.len(),
            dataset.n_classes()
        );

        let evaluation = fit_and_evaluate(&self.config, &dataset, &mut rng)?;
        let dir = &self.config.output_dir;

        let roc_path = dir.join(roc_file_name(self.task, k));
        write_roc_table(&roc_path, &evaluation.roc)?;
        write_confusion_matrix(
            dir.join(confusion_file_name(self.task, k)),
            &evaluation.confusion_matrix,
        )?;

        let report = EvaluationReport {
            task: self.task,
            k,
            class_names: dataset.class_names.clone(),
            n_features: dataset.feature_names.len(),
            n_train: dataset.train.len(),
            n_test: dataset.test.len(),
            auc: evaluation.auc,
            accuracy: evaluation.confusion_matrix.accuracy(),
            class_metrics: evaluation.confusion_matrix.class_metrics(),
            confusion_matrix: evaluation.confusion_matrix,
        };
        report.print();
        report.save_json(dir.join(report_file_name(self.task, k)))?;
        auc_summary.append(k, evaluation.auc)?;

        Ok(KmerResult {
            k,
            auc: report.auc,
            accuracy: report.accuracy,
            n_train: report.n_train,
            n_test: report.n_test,
            roc_path,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }
}
