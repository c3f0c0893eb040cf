use anyhow::{Context, Result};
use kmerclass::cli::{parse_args, setup_logging, Commands, ExtractArgs, SummarizeArgs, TrainArgs};
use kmerclass::data::feature_engineering::extract_features;
use kmerclass::data::loader::CellTypeSources;
use kmerclass::report::{summarize_roc_files, write_auc_table};
use kmerclass::training::trainer::Trainer;
use std::fs::File;
use tracing::{error, info, warn};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", kmerclass::info());

    let result = match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Extract(args) => run_extract(args),
        Commands::Summarize(args) => run_summarize(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let task = args.task;
    let config = args.into_config().context("Failed to build configuration")?;
    info!("Task: {}", task);
    info!("k-mer sizes: {:?}", config.kmers);
    info!("Output directory: {:?}", config.output_dir);

    let trainer = Trainer::new(config, task).context("Invalid configuration")?;
    let summary = trainer.run().context("Training failed")?;

    info!("\n=== AUC per k ===");
    for result in &summary.results {
        info!("  k={}: AUC={:.4} accuracy={:.4}", result.k, result.auc, result.accuracy);
    }
    if let Some(ref path) = summary.auc_summary {
        info!("AUC summary saved to: {:?}", path);
    }

    if !summary.is_success() {
        for (k, reason) in &summary.failures {
            warn!("k={} failed: {}", k, reason);
        }
        anyhow::bail!("{} of {} k values failed", summary.failures.len(), trainer.config().kmers.len());
    }
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    info!("Extracting features with k={}", args.kmer);
    let sources: CellTypeSources = args.fasta.into_iter().collect();

    let table = extract_features(&sources, args.kmer).context("Feature extraction failed")?;
    info!("{} rows x {} columns", table.len(), table.columns().len());

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {:?}", args.output))?;
    table.write_tsv(file)?;
    info!("Feature table saved to: {:?}", args.output);
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    let entries = summarize_roc_files(&args.dir, args.task)
        .with_context(|| format!("Failed to scan {:?}", args.dir))?;
    if entries.is_empty() {
        warn!("No readable {} ROC tables in {:?}", args.task, args.dir);
    }

    write_auc_table(&entries, std::io::stdout())?;

    if let Some(output) = args.output {
        let file = File::create(&output).with_context(|| format!("Failed to create {:?}", output))?;
        write_auc_table(&entries, file)?;
        info!("AUC table saved to: {:?}", output);
    }
    Ok(())
}
