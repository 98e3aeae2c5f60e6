//! AdamW training loop with early stopping on validation loss.

use std::path::Path;

use bloomnet_core::{BloomNetError, Result};
use bloomnet_model::BloomNetClassifier;
use candle_nn::Optimizer;

use crate::data::{stratified_split, BatchIterator, EncodedDataset};
use crate::metrics::{compute_validation_metrics, ValidationMetrics};

/// Training configuration.
pub struct TrainConfig {
    pub lr: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub patience: usize,
    pub val_ratio: f64,
    pub seed: u64,
    pub head_output_path: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            weight_decay: 1e-4,
            batch_size: 32,
            max_epochs: 50,
            patience: 5,
            val_ratio: 0.2,
            seed: 42,
            head_output_path: "models/bloomnet_head.safetensors".to_string(),
        }
    }
}

/// Per-epoch metrics logged during training.
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_metrics: ValidationMetrics,
}

/// Train the classifier on an encoded dataset: stratified split, AdamW over
/// the trainable parameter set, cross-entropy loss, early stopping on
/// validation loss, best head checkpoint saved to the configured path.
pub fn train(
    model: &BloomNetClassifier,
    dataset: &EncodedDataset,
    config: &TrainConfig,
) -> Result<Vec<EpochMetrics>> {
    if dataset.is_empty() {
        return Err(BloomNetError::Config(
            "cannot train on an empty dataset".to_string(),
        ));
    }

    let split = stratified_split(dataset, config.val_ratio, config.seed)?;

    let mut optimizer = candle_nn::AdamW::new(
        model.trainable_vars(),
        candle_nn::ParamsAdamW {
            lr: config.lr,
            weight_decay: config.weight_decay,
            ..Default::default()
        },
    )
    .map_err(|e| BloomNetError::Model(format!("Failed to create optimizer: {e}")))?;

    let mut best_val_loss = f64::MAX;
    let mut patience_counter = 0usize;
    let mut epoch_history: Vec<EpochMetrics> = Vec::new();

    let mut batch_iter = BatchIterator::new(&split.train, config.batch_size);

    println!(
        "Training: lr={}, wd={}, batch={}, max_epochs={}, patience={}, fusion={}",
        config.lr,
        config.weight_decay,
        config.batch_size,
        config.max_epochs,
        config.patience,
        model.fusion(),
    );
    println!("{:-<80}", "");

    for epoch in 0..config.max_epochs {
        batch_iter.reshuffle(config.seed, epoch);

        let mut epoch_loss = 0.0;
        let mut batch_count = 0;

        while let Some((ids, mask, labels)) = batch_iter.next_batch() {
            let logits = model.forward(&ids, &mask)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &labels)
                .map_err(|e| BloomNetError::Model(format!("Loss computation failed: {e}")))?;
            optimizer
                .backward_step(&loss)
                .map_err(|e| BloomNetError::Model(format!("Backward step failed: {e}")))?;

            epoch_loss += loss
                .to_scalar::<f32>()
                .map_err(|e| BloomNetError::Model(format!("Loss scalar failed: {e}")))?
                as f64;
            batch_count += 1;
        }

        let avg_train_loss = if batch_count > 0 {
            epoch_loss / batch_count as f64
        } else {
            0.0
        };

        let (val_loss, val_metrics) = validate(model, &split.val)?;

        let improved = val_loss < best_val_loss;
        if improved {
            best_val_loss = val_loss;
            patience_counter = 0;
            save_head(model, &config.head_output_path)?;
        } else {
            patience_counter += 1;
        }

        let marker = if improved { "*" } else { "" };
        println!(
            "  epoch {:3} | train_loss={:.4} val_loss={:.4} {} | {}",
            epoch + 1,
            avg_train_loss,
            val_loss,
            marker,
            val_metrics,
        );

        epoch_history.push(EpochMetrics {
            epoch: epoch + 1,
            train_loss: avg_train_loss,
            val_loss,
            val_metrics,
        });

        if patience_counter >= config.patience {
            println!(
                "\nEarly stopping at epoch {} (patience={} exhausted)",
                epoch + 1,
                config.patience,
            );
            break;
        }
    }

    println!("{:-<80}", "");
    println!("Best val loss: {best_val_loss:.4}");
    println!("Head saved to: {}", config.head_output_path);

    Ok(epoch_history)
}

fn validate(
    model: &BloomNetClassifier,
    val: &EncodedDataset,
) -> Result<(f64, ValidationMetrics)> {
    if val.is_empty() {
        return Ok((
            0.0,
            compute_validation_metrics(&[], &[], model.num_classes()),
        ));
    }

    let logits = model.forward(&val.input_ids, &val.attention_mask)?;
    let val_loss = candle_nn::loss::cross_entropy(&logits, &val.labels)
        .map_err(|e| BloomNetError::Model(format!("Validation loss failed: {e}")))?
        .to_scalar::<f32>()
        .map_err(|e| BloomNetError::Model(format!("Validation loss scalar failed: {e}")))?
        as f64;

    let predictions: Vec<u32> = logits
        .argmax(candle_core::D::Minus1)
        .and_then(|p| p.to_vec1())
        .map_err(|e| BloomNetError::Model(format!("Validation argmax failed: {e}")))?;
    let labels: Vec<u32> = val
        .labels
        .to_vec1()
        .map_err(|e| BloomNetError::Model(format!("Validation labels failed: {e}")))?;

    Ok((
        val_loss,
        compute_validation_metrics(&predictions, &labels, model.num_classes()),
    ))
}

fn save_head(model: &BloomNetClassifier, output_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    model.save_head(output_path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
