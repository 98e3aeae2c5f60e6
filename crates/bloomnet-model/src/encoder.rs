//! Pretrained sentence encoders via the Candle framework.
//!
//! [`SentenceEncoder`] is the uniform contract the fusion classifier and
//! auxiliary wrappers program against; [`BertEncoder`] implements it for
//! BERT-family checkpoints downloaded from the HuggingFace Hub. The freeze
//! flag selects how weights are materialised: memory-mapped constants
//! (frozen, empty trainable set) or `VarMap`-backed variables filled from
//! the same checkpoint (trainable). Forward output is identical either way.

use std::path::{Path, PathBuf};

use bloomnet_core::{BloomNetError, Result};
use candle_core::{DType, Device, IndexOp, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

// ---------------------------------------------------------------------------
// Encoder contract
// ---------------------------------------------------------------------------

/// A pretrained encoder mapping `(ids, mask)` batches to final-layer hidden
/// states of shape `[batch, seq_len, hidden]`.
pub trait SentenceEncoder: Send + Sync {
    /// Run the encoder. Both inputs have shape `[batch, seq_len]`.
    fn encode(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor>;

    /// Hidden dimension of the final layer.
    fn hidden_size(&self) -> usize;

    /// Parameters to include in the optimizer set. Empty when frozen.
    fn trainable_vars(&self) -> Vec<Var> {
        Vec::new()
    }
}

/// Extract the pooled representation: the hidden state at the first
/// sequence position, for every example in the batch.
///
/// Input `[batch, seq_len, hidden]` → output `[batch, hidden]`.
pub fn pooled_summary(hidden_states: &Tensor) -> Result<Tensor> {
    hidden_states.i((.., 0)).map_err(|e| {
        BloomNetError::Model(format!("Failed to extract pooled representation: {e}"))
    })
}

// ---------------------------------------------------------------------------
// BERT-family encoder
// ---------------------------------------------------------------------------

/// Configuration for loading a BERT-family encoder.
#[derive(Debug, Clone)]
pub struct BertEncoderConfig {
    /// HuggingFace model ID (e.g. `"bert-base-uncased"`).
    pub model_id: String,
    /// Optional cache directory for downloaded files.
    pub cache_dir: Option<String>,
    /// Exclude the encoder's parameters from the trainable set.
    pub freeze: bool,
}

impl BertEncoderConfig {
    /// Config for `model_id` with no cache override, trainable weights.
    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            cache_dir: None,
            freeze: false,
        }
    }
}

/// BERT-family encoder loaded from safetensors weights.
pub struct BertEncoder {
    model: BertModel,
    hidden_size: usize,
    varmap: Option<VarMap>,
    device: Device,
}

impl BertEncoder {
    /// Download and load the encoder from the HuggingFace Hub.
    pub async fn from_hub(config: &BertEncoderConfig, device: &Device) -> Result<Self> {
        let (config_path, weights_path) =
            fetch_model_files(&config.model_id, config.cache_dir.as_deref()).await?;
        let encoder = Self::from_files(&config_path, &weights_path, config.freeze, device)?;
        tracing::info!(
            model_id = %config.model_id,
            hidden_size = encoder.hidden_size,
            frozen = config.freeze,
            "Encoder loaded"
        );
        Ok(encoder)
    }

    /// Load the encoder from local `config.json` and safetensors files.
    pub fn from_files(
        config_path: &Path,
        weights_path: &Path,
        freeze: bool,
        device: &Device,
    ) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| BloomNetError::Model(format!("Failed to read config.json: {e}")))?;
        let bert_config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| BloomNetError::Model(format!("Invalid BERT config: {e}")))?;
        let hidden_size = bert_config.hidden_size;

        let prefix = weight_prefix(weights_path)?;

        let (model, varmap) = if freeze {
            // SAFETY: memory-mapping safetensors is the standard candle pattern.
            // The file is read-only and remains valid for the model's lifetime.
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, device)
                    .map_err(|e| BloomNetError::Model(format!("Failed to load weights: {e}")))?
            };
            let vb = match prefix {
                Some(p) => vb.pp(p),
                None => vb,
            };
            let model = BertModel::load(vb, &bert_config)
                .map_err(|e| BloomNetError::Model(format!("Failed to load BERT model: {e}")))?;
            (model, None)
        } else {
            let mut varmap = VarMap::new();
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            let vb = match prefix {
                Some(p) => vb.pp(p),
                None => vb,
            };
            let model = BertModel::load(vb, &bert_config)
                .map_err(|e| BloomNetError::Model(format!("Failed to build BERT model: {e}")))?;
            varmap.load(weights_path).map_err(|e| {
                BloomNetError::Model(format!("Failed to fill pretrained weights: {e}"))
            })?;
            (model, Some(varmap))
        };

        Ok(Self {
            model,
            hidden_size,
            varmap,
            device: device.clone(),
        })
    }

    /// Returns `true` if the encoder's parameters are frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.varmap.is_none()
    }

    /// Device the encoder's weights live on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl SentenceEncoder for BertEncoder {
    fn encode(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let token_type_ids = input_ids
            .zeros_like()
            .map_err(|e| BloomNetError::Model(format!("Failed to build token type ids: {e}")))?;
        self.model
            .forward(input_ids, &token_type_ids, Some(attention_mask))
            .map_err(|e| BloomNetError::Model(format!("Encoder forward failed: {e}")))
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn trainable_vars(&self) -> Vec<Var> {
        self.varmap.as_ref().map(VarMap::all_vars).unwrap_or_default()
    }
}

/// Detect whether checkpoint tensor names carry the `bert.` prefix used by
/// HuggingFace task-model exports (raw encoder exports are unprefixed).
fn weight_prefix(weights_path: &Path) -> Result<Option<&'static str>> {
    let data = std::fs::read(weights_path)?;
    let tensors = safetensors::SafeTensors::deserialize(&data).map_err(|e| {
        BloomNetError::Model(format!(
            "Failed to parse safetensors {}: {e}",
            weights_path.display()
        ))
    })?;
    Ok(tensors
        .names()
        .iter()
        .any(|name| name.starts_with("bert."))
        .then_some("bert"))
}

// ---------------------------------------------------------------------------
// HuggingFace Hub fetching
// ---------------------------------------------------------------------------

/// Download `config.json` and `model.safetensors` for `model_id`.
pub async fn fetch_model_files(
    model_id: &str,
    cache_dir: Option<&str>,
) -> Result<(PathBuf, PathBuf)> {
    let repo = hub_repo(model_id, cache_dir)?;
    let config_path = repo.get("config.json").await.map_err(|e| {
        BloomNetError::Model(format!("{model_id}: failed to download config.json: {e}"))
    })?;
    let weights_path = repo.get("model.safetensors").await.map_err(|e| {
        BloomNetError::Model(format!(
            "{model_id}: failed to download model.safetensors: {e}"
        ))
    })?;
    Ok((config_path, weights_path))
}

/// Download and load the tokenizer for `model_id`.
pub async fn fetch_tokenizer(model_id: &str, cache_dir: Option<&str>) -> Result<Tokenizer> {
    let repo = hub_repo(model_id, cache_dir)?;
    let tokenizer_path = repo.get("tokenizer.json").await.map_err(|e| {
        BloomNetError::Tokenization(format!("{model_id}: failed to download tokenizer.json: {e}"))
    })?;
    Tokenizer::from_file(&tokenizer_path).map_err(|e| {
        BloomNetError::Tokenization(format!("{model_id}: failed to load tokenizer: {e}"))
    })
}

fn hub_repo(model_id: &str, cache_dir: Option<&str>) -> Result<hf_hub::api::tokio::ApiRepo> {
    use hf_hub::api::tokio::{Api, ApiBuilder};

    let api = match cache_dir {
        Some(dir) => ApiBuilder::new().with_cache_dir(PathBuf::from(dir)).build(),
        None => Api::new(),
    }
    .map_err(|e| BloomNetError::Model(format!("Failed to create HF API client: {e}")))?;

    Ok(api.model(model_id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ToyEncoder;
    use safetensors::tensor::TensorView;
    use safetensors::Dtype;

    #[test]
    fn test_pooled_summary_takes_first_position() {
        let device = Device::Cpu;
        // [batch=2, seq=3, hidden=2]
        let data: Vec<f32> = vec![
            1.0, 2.0, 9.0, 9.0, 9.0, 9.0, // example 0
            3.0, 4.0, 9.0, 9.0, 9.0, 9.0, // example 1
        ];
        let hidden = Tensor::from_vec(data, (2, 3, 2), &device).unwrap();

        let pooled = pooled_summary(&hidden).unwrap();
        assert_eq!(pooled.dims(), &[2, 2]);
        let values = pooled.to_vec2::<f32>().unwrap();
        assert_eq!(values[0], vec![1.0, 2.0]);
        assert_eq!(values[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_pooled_summary_rejects_flat_input() {
        let device = Device::Cpu;
        let flat = Tensor::zeros(4, candle_core::DType::F32, &device).unwrap();
        assert!(pooled_summary(&flat).is_err());
    }

    #[test]
    fn test_config_new_defaults() {
        let config = BertEncoderConfig::new("bert-base-uncased");
        assert_eq!(config.model_id, "bert-base-uncased");
        assert!(config.cache_dir.is_none());
        assert!(!config.freeze);
    }

    #[test]
    fn test_trait_default_trainable_vars_empty() {
        let encoder = ToyEncoder::frozen(4, 1.0, &Device::Cpu);
        assert!(encoder.trainable_vars().is_empty());
    }

    #[test]
    fn test_frozen_and_trainable_outputs_match() {
        let device = Device::Cpu;
        let frozen = ToyEncoder::frozen(4, 0.5, &device);
        let trainable = ToyEncoder::trainable(4, 0.5, &device);
        assert!(frozen.trainable_vars().is_empty());
        assert_eq!(trainable.trainable_vars().len(), 1);

        let ids = Tensor::from_vec(vec![2u32, 3, 4, 0], (1, 4), &device).unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 1, 0], (1, 4), &device).unwrap();

        let a = frozen.encode(&ids, &mask).unwrap().to_vec3::<f32>().unwrap();
        let b = trainable
            .encode(&ids, &mask)
            .unwrap()
            .to_vec3::<f32>()
            .unwrap();
        assert_eq!(a, b);
    }

    fn write_safetensors(path: &Path, names: &[&str]) {
        let data: Vec<u8> = vec![0u8; 16];
        let views: Vec<(String, TensorView)> = names
            .iter()
            .map(|name| {
                let view = TensorView::new(Dtype::F32, vec![4], &data).unwrap();
                ((*name).to_string(), view)
            })
            .collect();
        safetensors::serialize_to_file(views, &None, path).unwrap();
    }

    #[test]
    fn test_weight_prefix_detects_task_model_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefixed.safetensors");
        write_safetensors(
            &path,
            &["bert.embeddings.word_embeddings.weight", "classifier.weight"],
        );
        assert_eq!(weight_prefix(&path).unwrap(), Some("bert"));
    }

    #[test]
    fn test_weight_prefix_raw_encoder_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.safetensors");
        write_safetensors(&path, &["embeddings.word_embeddings.weight"]);
        assert_eq!(weight_prefix(&path).unwrap(), None);
    }

    #[test]
    fn test_weight_prefix_missing_file() {
        assert!(weight_prefix(Path::new("/nonexistent/model.safetensors")).is_err());
    }
}
