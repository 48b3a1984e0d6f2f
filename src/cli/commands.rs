// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Five subcommands, one per pipeline stage plus the demo:
//   process → train → predict / schema / serve
//
// Flags left unset fall back to AppConfig (config/*.toml and
// CHURN__* environment variables), then to built-in defaults.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn a raw activity export into train/val/test splits and a feature schema
    Process(ProcessArgs),

    /// Fit both models on a processed directory and save a new artifact version
    Train(TrainArgs),

    /// Score one record (or a JSON array of records) with a trained version
    Predict(PredictArgs),

    /// Print the frozen feature schema of a trained version
    Schema(SchemaArgs),

    /// Run the HTTP scoring demo
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Raw export, .csv or .parquet
    #[arg(long, default_value = "data/raw/user_activity.csv")]
    pub input_path: PathBuf,

    /// Directory receiving {train,val,test}.parquet and feature_schema.json
    #[arg(long, default_value = "data/processed")]
    pub output_path: PathBuf,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Output of the `process` command
    #[arg(long, default_value = "data/processed")]
    pub data_dir: PathBuf,

    /// Root of the versioned artifact store
    #[arg(long, default_value = "data/models")]
    pub model_dir: PathBuf,

    // ── logistic regression ──
    /// Passes over the training split
    #[arg(long, default_value_t = 60)]
    pub epochs: usize,

    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 0.05)]
    pub lr: f64,

    // ── boosted trees ──
    #[arg(long, default_value_t = 300)]
    pub n_estimators: usize,

    #[arg(long, default_value_t = 4)]
    pub max_depth: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value_t = 0.05)]
    pub learning_rate: f64,

    /// Seed shared by both models
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// Settings without a flag keep their TrainConfig defaults.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut cfg = TrainConfig {
            data_dir:  a.data_dir,
            model_dir: a.model_dir,
            ..TrainConfig::default()
        };
        cfg.logreg.epochs     = a.epochs;
        cfg.logreg.batch_size = a.batch_size;
        cfg.logreg.lr         = a.lr;
        cfg.logreg.seed       = a.seed;
        cfg.gbt.n_estimators  = a.n_estimators;
        cfg.gbt.max_depth     = a.max_depth;
        cfg.gbt.learning_rate = a.learning_rate;
        cfg.gbt.seed          = a.seed;
        cfg
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Artifact store; defaults to scoring.model_dir
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Artifact version; defaults to the latest
    #[arg(long)]
    pub version: Option<u32>,

    /// Record as inline JSON, e.g. '{"sessions_7d": 3, ...}'
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub features: Option<String>,

    /// File holding a JSON record or an array of records
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// gbt | logreg (aliases: gbdt, xgb, xgboost, logistic)
    #[arg(long)]
    pub model: Option<String>,

    /// Decision threshold in [0, 1]
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Score the record exactly as given
    #[arg(long)]
    pub no_autofix: bool,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    #[arg(long)]
    pub version: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    #[arg(long)]
    pub version: Option<u32>,

    /// Defaults to server.host
    #[arg(long)]
    pub host: Option<String>,

    /// Defaults to server.port
    #[arg(long)]
    pub port: Option<u16>,
}
