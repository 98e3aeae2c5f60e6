//! End-to-end fusion classifier.
//!
//! [`BloomNetClassifier`] runs a primary encoder directly on the input
//! tokenization and two auxiliary encoders through their cross-tokenizer
//! bridges, fuses the three pooled representations, and maps the fused
//! vector to class logits through a feed-forward head. No softmax is
//! applied; the loss function is the caller's concern.

use std::path::Path;

use bloomnet_core::{BloomLevel, BloomNetError, FusionMode, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};

use crate::aux::{AuxEncoderConfig, AuxiliaryEncoder, DEFAULT_NER_MODEL, DEFAULT_POS_MODEL};
use crate::encoder::{pooled_summary, BertEncoder, BertEncoderConfig, SentenceEncoder};

/// First hidden layer width of the classifier head.
const HEAD_HIDDEN_1: usize = 768;

/// Second hidden layer width of the classifier head.
const HEAD_HIDDEN_2: usize = 256;

/// Negative slope for the head's LeakyReLU activations.
const LEAKY_RELU_SLOPE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Construction parameters for the fusion classifier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Primary (generic language-model) encoder, also the source vocabulary
    /// for both auxiliary bridges.
    pub primary_model_id: String,
    /// Part-of-speech auxiliary model.
    pub pos_model_id: String,
    /// Named-entity auxiliary model.
    pub ner_model_id: String,
    /// Number of output classes.
    pub num_classes: usize,
    /// Fixed sequence length for auxiliary re-tokenization.
    pub max_len: usize,
    /// How pooled representations are combined.
    pub fusion: FusionMode,
    /// Exclude the primary encoder's parameters from the trainable set.
    pub freeze_primary: bool,
    /// Exclude both auxiliary encoders' parameters from the trainable set.
    pub freeze_auxiliary: bool,
    /// Optional cache directory for downloaded files.
    pub cache_dir: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            primary_model_id: "bert-base-uncased".to_string(),
            pos_model_id: DEFAULT_POS_MODEL.to_string(),
            ner_model_id: DEFAULT_NER_MODEL.to_string(),
            num_classes: BloomLevel::COUNT,
            max_len: 64,
            fusion: FusionMode::Concat,
            freeze_primary: false,
            freeze_auxiliary: false,
            cache_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier head
// ---------------------------------------------------------------------------

/// Feed-forward head: `linear(fused → 768) → LeakyReLU → linear(768 → 256)
/// → LeakyReLU → linear(256 → num_classes)`.
struct ClassifierHead {
    fc1: candle_nn::Linear,
    fc2: candle_nn::Linear,
    fc3: candle_nn::Linear,
}

impl ClassifierHead {
    fn new(vb: VarBuilder, fused_dim: usize, num_classes: usize) -> Result<Self> {
        let fc1 = candle_nn::linear(fused_dim, HEAD_HIDDEN_1, vb.pp("fc1"))
            .map_err(|e| BloomNetError::Model(format!("Failed to create head fc1: {e}")))?;
        let fc2 = candle_nn::linear(HEAD_HIDDEN_1, HEAD_HIDDEN_2, vb.pp("fc2"))
            .map_err(|e| BloomNetError::Model(format!("Failed to create head fc2: {e}")))?;
        let fc3 = candle_nn::linear(HEAD_HIDDEN_2, num_classes, vb.pp("fc3"))
            .map_err(|e| BloomNetError::Model(format!("Failed to create head fc3: {e}")))?;
        Ok(Self { fc1, fc2, fc3 })
    }

    fn forward(&self, fused: &Tensor) -> Result<Tensor> {
        let h = candle_nn::Module::forward(&self.fc1, fused)
            .and_then(|h| candle_nn::ops::leaky_relu(&h, LEAKY_RELU_SLOPE))
            .map_err(|e| BloomNetError::Model(format!("Head fc1 forward failed: {e}")))?;
        let h = candle_nn::Module::forward(&self.fc2, &h)
            .and_then(|h| candle_nn::ops::leaky_relu(&h, LEAKY_RELU_SLOPE))
            .map_err(|e| BloomNetError::Model(format!("Head fc2 forward failed: {e}")))?;
        candle_nn::Module::forward(&self.fc3, &h)
            .map_err(|e| BloomNetError::Model(format!("Head fc3 forward failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// BloomNetClassifier
// ---------------------------------------------------------------------------

/// Three-encoder fusion classifier.
///
/// Holds the primary encoder, the POS and NER auxiliary wrappers, and the
/// feed-forward head. All components live on one device; inputs on a
/// different device are rejected rather than silently relocated.
pub struct BloomNetClassifier {
    primary: Box<dyn SentenceEncoder>,
    pos: AuxiliaryEncoder,
    ner: AuxiliaryEncoder,
    head: ClassifierHead,
    head_varmap: VarMap,
    fusion: FusionMode,
    num_classes: usize,
    device: Device,
}

impl BloomNetClassifier {
    /// Assemble a classifier from already-constructed components. The head
    /// is freshly initialised (random weights); use [`Self::load_head`] to
    /// restore trained weights.
    pub fn new(
        primary: Box<dyn SentenceEncoder>,
        pos: AuxiliaryEncoder,
        ner: AuxiliaryEncoder,
        fusion: FusionMode,
        num_classes: usize,
        device: &Device,
    ) -> Result<Self> {
        if num_classes == 0 {
            return Err(BloomNetError::Config(
                "classifier needs at least one output class".to_string(),
            ));
        }

        let fused_dim = match fusion {
            FusionMode::Concat => {
                primary.hidden_size() + pos.hidden_size() + ner.hidden_size()
            }
            // Product fusion keeps the pooled dimension; unequal dims are
            // surfaced at fusion time, matching the operation contract.
            FusionMode::Product => primary.hidden_size(),
        };

        let head_varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&head_varmap, DType::F32, device);
        let head = ClassifierHead::new(vb.pp("head"), fused_dim, num_classes)?;

        Ok(Self {
            primary,
            pos,
            ner,
            head,
            head_varmap,
            fusion,
            num_classes,
            device: device.clone(),
        })
    }

    /// Download all three encoders and tokenizers from the HuggingFace Hub
    /// and assemble the classifier.
    pub async fn from_hub(config: &ClassifierConfig, device: &Device) -> Result<Self> {
        let primary_config = BertEncoderConfig {
            model_id: config.primary_model_id.clone(),
            cache_dir: config.cache_dir.clone(),
            freeze: config.freeze_primary,
        };
        let primary = BertEncoder::from_hub(&primary_config, device).await?;

        let pos_config = AuxEncoderConfig {
            source_model_id: config.primary_model_id.clone(),
            target_model_id: config.pos_model_id.clone(),
            freeze: config.freeze_auxiliary,
            max_len: config.max_len,
            cache_dir: config.cache_dir.clone(),
        };
        let pos = AuxiliaryEncoder::from_hub(&pos_config, device).await?;

        let ner_config = AuxEncoderConfig {
            source_model_id: config.primary_model_id.clone(),
            target_model_id: config.ner_model_id.clone(),
            freeze: config.freeze_auxiliary,
            max_len: config.max_len,
            cache_dir: config.cache_dir.clone(),
        };
        let ner = AuxiliaryEncoder::from_hub(&ner_config, device).await?;

        tracing::info!(
            primary = %config.primary_model_id,
            fusion = %config.fusion,
            num_classes = config.num_classes,
            "BloomNet classifier assembled"
        );

        Self::new(
            Box::new(primary),
            pos,
            ner,
            config.fusion,
            config.num_classes,
            device,
        )
    }

    /// Map a `[batch, seq_len]` token-ID batch to `[batch, num_classes]`
    /// logits. Raw scores; no softmax.
    pub fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        self.check_device(input_ids, "input_ids")?;
        self.check_device(attention_mask, "attention_mask")?;

        let cls_generic = pooled_summary(&self.primary.encode(input_ids, attention_mask)?)?;
        let cls_pos = self.pos.forward(input_ids, attention_mask)?;
        let cls_ner = self.ner.forward(input_ids, attention_mask)?;

        let fused = self.fuse(&cls_generic, &cls_pos, &cls_ner)?;
        self.head.forward(&fused)
    }

    /// Predicted class index (argmax over logits) for each example.
    pub fn predict(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Vec<u32>> {
        let logits = self.forward(input_ids, attention_mask)?;
        logits
            .argmax(candle_core::D::Minus1)
            .and_then(|preds| preds.to_vec1())
            .map_err(|e| BloomNetError::Model(format!("Failed to compute predictions: {e}")))
    }

    /// Parameters to optimize: the head plus every unfrozen encoder.
    #[must_use]
    pub fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.head_varmap.all_vars();
        vars.extend(self.primary.trainable_vars());
        vars.extend(self.pos.trainable_vars());
        vars.extend(self.ner.trainable_vars());
        vars
    }

    /// Save the classifier head's weights as safetensors.
    pub fn save_head(&self, path: impl AsRef<Path>) -> Result<()> {
        self.head_varmap
            .save(path.as_ref())
            .map_err(|e| BloomNetError::Model(format!("Failed to save classifier head: {e}")))
    }

    /// Restore the classifier head's weights from safetensors.
    pub fn load_head(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.head_varmap
            .load(path.as_ref())
            .map_err(|e| BloomNetError::Model(format!("Failed to load classifier head: {e}")))
    }

    /// Configured fusion mode.
    #[must_use]
    pub fn fusion(&self) -> FusionMode {
        self.fusion
    }

    /// Number of output classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Device the classifier's components live on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    fn check_device(&self, tensor: &Tensor, name: &str) -> Result<()> {
        if tensor.device().same_device(&self.device) {
            Ok(())
        } else {
            Err(BloomNetError::DeviceMismatch(format!(
                "{name} on {:?}, classifier on {:?}",
                tensor.device(),
                self.device
            )))
        }
    }

    fn fuse(&self, generic: &Tensor, pos: &Tensor, ner: &Tensor) -> Result<Tensor> {
        match self.fusion {
            FusionMode::Concat => Tensor::cat(&[generic, pos, ner], 1)
                .map_err(|e| BloomNetError::Model(format!("Fusion concat failed: {e}"))),
            FusionMode::Product => {
                let dims = [
                    pooled_dim(generic)?,
                    pooled_dim(pos)?,
                    pooled_dim(ner)?,
                ];
                if dims[0] != dims[1] || dims[0] != dims[2] {
                    return Err(BloomNetError::ShapeMismatch(format!(
                        "product fusion requires equal pooled dims, got {}/{}/{}",
                        dims[0], dims[1], dims[2]
                    )));
                }
                generic
                    .mul(pos)
                    .and_then(|t| t.mul(ner))
                    .map_err(|e| BloomNetError::Model(format!("Fusion product failed: {e}")))
            }
        }
    }
}

fn pooled_dim(pooled: &Tensor) -> Result<usize> {
    pooled
        .dim(1)
        .map_err(|e| BloomNetError::Model(format!("Pooled vector has no feature dim: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
