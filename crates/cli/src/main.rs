//! CLI tool for featurizing recorded dialogue sessions.
//!
//! This tool reads CSV session files, featurizes them against a domain and
//! writes the training arrays as JSON together with the calibrated featurizer
//! so the same encoding can be reused at inference time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dialogue_featurizer_core::{
    load_all_sessions, EncoderKind, FeaturizerConfig, Labels, StateEncoder, StaticDomain,
    StrategyKind, TrainingData, MAX_HISTORY_DEFAULT,
};

#[derive(ValueEnum, Copy, Clone, Debug)]
enum StrategyArg {
    /// One fully labelled example per dialogue
    Full,
    /// One example per action over a fixed history window
    MaxHistory,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum EncoderArg {
    /// Bag-of-words token counts
    Bow,
    /// One slot per domain input state
    Binary,
}

/// Featurize recorded dialogue sessions into training arrays.
#[derive(Parser, Debug)]
#[command(name = "dialogue-featurize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory containing CSV session files
    #[arg(long)]
    sessions_root: PathBuf,

    /// Domain JSON file (intents, entities, slots, actions)
    #[arg(long)]
    domain: PathBuf,

    /// Output directory for training data and the persisted featurizer
    #[arg(long)]
    output_dir: PathBuf,

    /// Windowing strategy
    #[arg(long, value_enum, default_value = "max-history")]
    strategy: StrategyArg,

    /// Window length for the max-history strategy
    #[arg(long, default_value_t = MAX_HISTORY_DEFAULT)]
    max_history: usize,

    /// Keep duplicate (window, action) examples
    #[arg(long)]
    keep_duplicates: bool,

    /// Compare examples exactly when their hashes collide
    #[arg(long)]
    verify_collisions: bool,

    /// State encoder
    #[arg(long, value_enum, default_value = "bow")]
    encoder: EncoderArg,

    /// Keep raw intent confidences instead of the single best intent
    #[arg(long)]
    use_intent_probabilities: bool,
}

impl Args {
    fn featurizer_config(&self) -> FeaturizerConfig {
        FeaturizerConfig {
            strategy: match self.strategy {
                StrategyArg::Full => StrategyKind::Full,
                StrategyArg::MaxHistory => StrategyKind::MaxHistory,
            },
            max_history: self.max_history,
            remove_duplicates: !self.keep_duplicates,
            verify_collisions: self.verify_collisions,
            use_intent_probabilities: self.use_intent_probabilities,
            encoder: match self.encoder {
                EncoderArg::Bow => EncoderKind::Bow,
                EncoderArg::Binary => EncoderKind::Binary,
            },
        }
    }
}

fn write_training_data(data: &TrainingData, path: &Path) -> Result<()> {
    let (label_kind, label_data): (&str, Vec<i32>) = match &data.y {
        Labels::PerTurn(y) => ("per_turn", y.iter().copied().collect()),
        Labels::LastTurn(y) => ("last_turn", y.iter().copied().collect()),
    };
    let json = serde_json::json!({
        "x": {
            "shape": data.x.shape(),
            "data": data.x.iter().copied().collect::<Vec<f32>>(),
        },
        "y": {
            "kind": label_kind,
            "shape": data.y.shape(),
            "data": label_data,
        },
        "true_lengths": data.true_lengths,
    });
    std::fs::write(path, serde_json::to_string(&json)?)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Loading domain from {:?}...", args.domain);
    let domain = StaticDomain::from_path(&args.domain)
        .with_context(|| format!("failed to load domain {}", args.domain.display()))?;

    info!("Loading sessions from {:?}...", args.sessions_root);
    let trackers = load_all_sessions(&args.sessions_root)
        .with_context(|| format!("failed to load sessions under {}", args.sessions_root.display()))?;
    info!("Loaded {} sessions", trackers.len());

    let config = args.featurizer_config();
    let mut featurizer = config.build();
    let data = featurizer
        .featurize_trackers(&trackers, &domain)
        .context("featurization failed")?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let data_path = args.output_dir.join("training_data.json");
    info!("Writing training data to {:?}...", data_path);
    write_training_data(&data, &data_path)?;

    let featurizer_dir = args.output_dir.join("featurizer");
    let featurizer_file = featurizer
        .persist(&featurizer_dir)
        .context("failed to persist featurizer")?;

    let metadata_path = args.output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "sessions_root": args.sessions_root.to_string_lossy(),
            "domain": args.domain.to_string_lossy(),
            "output_dir": args.output_dir.to_string_lossy(),
            "featurizer": config,
        },
        "counts": {
            "total_sessions": trackers.len(),
            "total_examples": data.num_examples(),
            "feature_dim": featurizer.state_encoder().vocabulary_size()?,
            "num_actions": data.y.shape().last().copied().unwrap_or(0),
        },
        "stats": {
            "max_turns": data.x.shape()[1],
            "avg_true_length": if data.true_lengths.is_empty() {
                0.0
            } else {
                data.true_lengths.iter().sum::<usize>() as f64 / data.true_lengths.len() as f64
            },
        },
        "files": {
            "training_data": data_path.to_string_lossy(),
            "featurizer": featurizer_file.to_string_lossy(),
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Total sessions processed: {}", trackers.len());
    println!("  Strategy: {}", featurizer.strategy().name());
    println!("  Training examples: {}", data.num_examples());
    println!("  X shape: {:?}", data.x.shape());
    println!("  y shape: {:?}", data.y.shape());
    println!("  Output: {:?}", data_path);
    println!("  Featurizer: {:?}", featurizer_file);
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}
