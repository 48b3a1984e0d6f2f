// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application);
// this layer only routes and prints.
//
//   1. `process` — raw export → processed splits + schema
//   2. `train`   — processed splits → new artifact version
//   3. `predict` — score records from the command line
//   4. `schema`  — show what a version expects
//   5. `serve`   — HTTP scoring demo (Layer 1b)

pub mod commands;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;

use commands::{Commands, PredictArgs, ProcessArgs, SchemaArgs, ServeArgs, TrainArgs};

use crate::application::predict_use_case::{PredictOutcome, PredictRequest, PredictUseCase};
use crate::config::AppConfig;
use crate::domain::prediction::Threshold;
use crate::domain::record::FeatureRecord;

#[derive(Parser, Debug)]
#[command(
    name = "churn-scoring",
    version,
    about = "Process activity snapshots, train churn classifiers and score records against a frozen feature schema."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch the subcommand; `config` supplies defaults for unset flags.
    pub fn run(self, config: &AppConfig) -> Result<()> {
        match self.command {
            Commands::Process(args) => run_process(args),
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args, config),
            Commands::Schema(args)  => run_schema(args, config),
            Commands::Serve(args)   => run_serve(args, config),
        }
    }
}

fn run_process(args: ProcessArgs) -> Result<()> {
    use crate::application::process_use_case::ProcessUseCase;

    let summary = ProcessUseCase::new(args.input_path, &args.output_path).execute()?;
    println!(
        "Processed into '{}': train={} val={} test={} rows, {} features",
        args.output_path.display(),
        summary.train_rows,
        summary.val_rows,
        summary.test_rows,
        summary.features,
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training on processed data in '{}'", args.data_dir.display());
    let outcome = TrainUseCase::new(args.into()).execute()?;

    println!("Saved model version v{}", outcome.version);
    for m in &outcome.metrics {
        println!(
            "  {:<6} {:<4} logloss={:.4} auc={:.4} acc={:.4} prec={:.4} rec={:.4}",
            m.model.as_str(),
            m.split,
            m.report.logloss,
            m.report.auc,
            m.report.accuracy,
            m.report.precision,
            m.report.recall,
        );
    }
    Ok(())
}

fn run_predict(args: PredictArgs, config: &AppConfig) -> Result<()> {
    let use_case = load_use_case(args.model_dir.clone(), args.version, config)?;

    let (records, many) = read_records(&args)?;
    let mut outcomes: Vec<PredictOutcome> = Vec::with_capacity(records.len());
    for (i, features) in records.into_iter().enumerate() {
        let request = PredictRequest {
            features,
            model:     args.model.clone(),
            threshold: args.threshold,
            autofix:   Some(!args.no_autofix),
        };
        let outcome = use_case
            .predict(request)
            .with_context(|| format!("Record {i} was rejected"))?;
        for fix in &outcome.fixes {
            eprintln!("note: {} {} -> {} ({})", fix.field, fix.from, fix.to, fix.reason);
        }
        outcomes.push(outcome);
    }

    let out = if many {
        serde_json::to_string_pretty(&outcomes)?
    } else {
        serde_json::to_string_pretty(&outcomes[0])?
    };
    println!("{out}");
    Ok(())
}

fn run_schema(args: SchemaArgs, config: &AppConfig) -> Result<()> {
    use crate::infra::checkpoint::ArtifactStore;

    let model_dir = args.model_dir.unwrap_or_else(|| config.scoring.model_dir.clone());
    let store = ArtifactStore::new(&model_dir);
    let version = store.resolve(args.version)?;
    let schema = store.load_schema(version)?;

    println!("# v{version} fingerprint {}", schema.fingerprint());
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_serve(args: ServeArgs, config: &AppConfig) -> Result<()> {
    use crate::api::{serve, AppState};

    let use_case = load_use_case(args.model_dir, args.version, config)?;
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    let runtime = tokio::runtime::Runtime::new().context("Cannot start tokio runtime")?;
    runtime.block_on(serve(&host, port, AppState::new(use_case)))
}

fn load_use_case(model_dir: Option<PathBuf>, version: Option<u32>, config: &AppConfig) -> Result<PredictUseCase> {
    let model_dir = model_dir.unwrap_or_else(|| config.scoring.model_dir.clone());
    let threshold = Threshold::new(config.scoring.threshold)
        .context("Invalid scoring.threshold in configuration")?;
    PredictUseCase::load(&model_dir, version, config.scoring.model, threshold)
}

/// Records from `--features` or `--input`; the flag tells whether the
/// source was an array.
fn read_records(args: &PredictArgs) -> Result<(Vec<FeatureRecord>, bool)> {
    let raw = match (&args.features, &args.input) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?,
        (None, None) => anyhow::bail!("Pass --features or --input"),
    };
    parse_records(&raw)
}

fn parse_records(raw: &str) -> Result<(Vec<FeatureRecord>, bool)> {
    let value: Value = serde_json::from_str(raw).context("Features are not valid JSON")?;
    match value {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| to_record(item).with_context(|| format!("Array item {i}")))
                .collect::<Result<Vec<_>>>()?;
            if records.is_empty() {
                anyhow::bail!("Input array holds no records");
            }
            Ok((records, true))
        }
        other => Ok((vec![to_record(other)?], false)),
    }
}

fn to_record(value: Value) -> Result<FeatureRecord> {
    match value {
        Value::Object(object) => Ok(FeatureRecord::try_from(object)?),
        _ => anyhow::bail!("Features must be a JSON object of feature values"),
    }
}
