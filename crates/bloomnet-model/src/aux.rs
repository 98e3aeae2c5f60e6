//! Auxiliary encoder wrappers.
//!
//! An [`AuxiliaryEncoder`] pairs a task-specific pretrained encoder with a
//! [`TokenBridge`], exposing a single operation: encode a batch already
//! tokenized under the *primary* vocabulary into pooled representations
//! under the auxiliary model's own vocabulary. Two instances are used by
//! the fusion classifier, one for part-of-speech semantics and one for
//! named-entity semantics.

use bloomnet_core::Result;
use candle_core::{Device, Tensor, Var};

use crate::bridge::TokenBridge;
use crate::encoder::{
    fetch_tokenizer, pooled_summary, BertEncoder, BertEncoderConfig, SentenceEncoder,
};

/// Default part-of-speech tagging model.
pub const DEFAULT_POS_MODEL: &str = "vblagoje/bert-english-uncased-finetuned-pos";

/// Default named-entity recognition model.
pub const DEFAULT_NER_MODEL: &str = "dslim/bert-base-NER";

/// Configuration for an auxiliary encoder.
#[derive(Debug, Clone)]
pub struct AuxEncoderConfig {
    /// Model whose vocabulary the incoming token IDs were produced under.
    pub source_model_id: String,
    /// Auxiliary model supplying both the target vocabulary and the encoder.
    pub target_model_id: String,
    /// Exclude the auxiliary encoder's parameters from the trainable set.
    pub freeze: bool,
    /// Fixed sequence length for re-tokenized encodings.
    pub max_len: usize,
    /// Optional cache directory for downloaded files.
    pub cache_dir: Option<String>,
}

impl AuxEncoderConfig {
    /// Config for the POS auxiliary encoder over `source_model_id`'s vocabulary.
    #[must_use]
    pub fn pos(source_model_id: impl Into<String>, max_len: usize) -> Self {
        Self {
            source_model_id: source_model_id.into(),
            target_model_id: DEFAULT_POS_MODEL.to_string(),
            freeze: false,
            max_len,
            cache_dir: None,
        }
    }

    /// Config for the NER auxiliary encoder over `source_model_id`'s vocabulary.
    #[must_use]
    pub fn ner(source_model_id: impl Into<String>, max_len: usize) -> Self {
        Self {
            source_model_id: source_model_id.into(),
            target_model_id: DEFAULT_NER_MODEL.to_string(),
            freeze: false,
            max_len,
            cache_dir: None,
        }
    }
}

/// A pretrained encoder reached through a cross-tokenizer bridge.
pub struct AuxiliaryEncoder {
    bridge: TokenBridge,
    encoder: Box<dyn SentenceEncoder>,
}

impl AuxiliaryEncoder {
    /// Assemble a wrapper from an existing bridge and encoder.
    #[must_use]
    pub fn new(bridge: TokenBridge, encoder: Box<dyn SentenceEncoder>) -> Self {
        Self { bridge, encoder }
    }

    /// Download tokenizers and encoder weights from the HuggingFace Hub
    /// and assemble the wrapper.
    pub async fn from_hub(config: &AuxEncoderConfig, device: &Device) -> Result<Self> {
        let cache = config.cache_dir.as_deref();
        let source_tokenizer = fetch_tokenizer(&config.source_model_id, cache).await?;
        let target_tokenizer = fetch_tokenizer(&config.target_model_id, cache).await?;
        let bridge = TokenBridge::new(source_tokenizer, target_tokenizer, config.max_len, device)?;

        let encoder_config = BertEncoderConfig {
            model_id: config.target_model_id.clone(),
            cache_dir: config.cache_dir.clone(),
            freeze: config.freeze,
        };
        let encoder = BertEncoder::from_hub(&encoder_config, device).await?;

        tracing::info!(
            source = %config.source_model_id,
            target = %config.target_model_id,
            max_len = config.max_len,
            "Auxiliary encoder ready"
        );

        Ok(Self::new(bridge, Box::new(encoder)))
    }

    /// Produce pooled representations for a batch tokenized under the
    /// source vocabulary. Output shape: `[batch, hidden]`.
    ///
    /// `source_mask` is accepted for interface symmetry with the primary
    /// encoder path but is not consulted: the bridge derives a fresh mask
    /// from the target tokenizer.
    pub fn forward(&self, source_ids: &Tensor, _source_mask: &Tensor) -> Result<Tensor> {
        let (aux_ids, aux_mask) = self.bridge.rebatch(source_ids)?;
        let hidden = self.encoder.encode(&aux_ids, &aux_mask)?;
        pooled_summary(&hidden)
    }

    /// Hidden dimension of the wrapped encoder.
    #[must_use]
    pub fn hidden_size(&self) -> usize {
        self.encoder.hidden_size()
    }

    /// Trainable parameters of the wrapped encoder (empty when frozen).
    #[must_use]
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.encoder.trainable_vars()
    }

    /// The wrapper's cross-tokenizer bridge.
    #[must_use]
    pub fn bridge(&self) -> &TokenBridge {
        &self.bridge
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
