//! CLI entry point for BloomNet training.
//!
//! Downloads the three encoders, tokenizes the labeled dataset under the
//! primary vocabulary, and fine-tunes the classifier head.

use clap::Parser;

use bloomnet_core::FusionMode;
use bloomnet_model::{fetch_tokenizer, BloomNetClassifier, ClassifierConfig, DevicePreference};
use bloomnet_train::data::{encode_dataset, load_dataset};
use bloomnet_train::trainer::{train, TrainConfig};

#[derive(Parser)]
#[command(name = "bloomnet-train", about = "Train the BloomNet fusion classifier")]
struct Cli {
    /// Path to the labeled dataset (JSON array of {"text", "level"}).
    #[arg(long)]
    dataset: String,

    /// Output path for the trained head weights.
    #[arg(long, default_value = "models/bloomnet_head.safetensors")]
    output: String,

    /// Primary encoder model ID.
    #[arg(long, default_value = "bert-base-uncased")]
    primary_model: String,

    /// Fusion mode: concat or product.
    #[arg(long, default_value = "concat")]
    fusion: FusionMode,

    /// Device: auto, cpu, cuda[:N], or metal[:N].
    #[arg(long, default_value = "auto")]
    device: DevicePreference,

    /// Fixed sequence length.
    #[arg(long, default_value = "64")]
    max_len: usize,

    /// Keep the primary encoder's weights fixed during training.
    #[arg(long)]
    freeze_primary: bool,

    /// Keep the auxiliary encoders' weights fixed during training.
    #[arg(long)]
    freeze_auxiliary: bool,

    /// Cache directory for downloaded models and tokenizers.
    #[arg(long)]
    cache_dir: Option<String>,

    /// Learning rate.
    #[arg(long, default_value = "0.001")]
    lr: f64,

    /// Mini-batch size.
    #[arg(long, default_value = "32")]
    batch_size: usize,

    /// Maximum training epochs.
    #[arg(long, default_value = "50")]
    max_epochs: usize,

    /// Early stopping patience (epochs without improvement).
    #[arg(long, default_value = "5")]
    patience: usize,

    /// Fraction of the dataset held out for validation.
    #[arg(long, default_value = "0.2")]
    val_ratio: f64,

    /// Random seed for splitting and shuffling.
    #[arg(long, default_value = "42")]
    seed: u64,
}

async fn run(cli: Cli) -> bloomnet_core::Result<()> {
    let device = cli.device.resolve()?;

    let classifier_config = ClassifierConfig {
        primary_model_id: cli.primary_model.clone(),
        max_len: cli.max_len,
        fusion: cli.fusion,
        freeze_primary: cli.freeze_primary,
        freeze_auxiliary: cli.freeze_auxiliary,
        cache_dir: cli.cache_dir.clone(),
        ..Default::default()
    };
    let model = BloomNetClassifier::from_hub(&classifier_config, &device).await?;

    let examples = load_dataset(&cli.dataset)?;
    let tokenizer = fetch_tokenizer(&cli.primary_model, cli.cache_dir.as_deref()).await?;
    let dataset = encode_dataset(&examples, tokenizer, cli.max_len, &device)?;

    let train_config = TrainConfig {
        lr: cli.lr,
        batch_size: cli.batch_size,
        max_epochs: cli.max_epochs,
        patience: cli.patience,
        val_ratio: cli.val_ratio,
        seed: cli.seed,
        head_output_path: cli.output,
        ..Default::default()
    };
    let history = train(&model, &dataset, &train_config)?;

    if let Some(last) = history.last() {
        println!("\nFinal epoch {}: {}", last.epoch, last.val_metrics);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
