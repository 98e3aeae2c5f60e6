//! Shared helpers for unit tests: offline tokenizers and deterministic
//! stand-in encoders, so no test touches the network or model weights.

use std::collections::HashMap;

use bloomnet_core::{BloomNetError, Result};
use candle_core::{DType, Device, Tensor, Var};
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{AddedToken, Tokenizer};

use crate::encoder::SentenceEncoder;

/// Build a whitespace word-level tokenizer over `words`.
///
/// IDs: `[PAD]` = 0, `[UNK]` = 1, then `words` in order starting at 2.
pub(crate) fn word_level_tokenizer(words: &[&str]) -> Tokenizer {
    let mut vocab: HashMap<String, u32> = HashMap::new();
    vocab.insert("[PAD]".to_string(), 0);
    vocab.insert("[UNK]".to_string(), 1);
    for (i, word) in words.iter().enumerate() {
        vocab.insert((*word).to_string(), (i + 2) as u32);
    }

    let model = WordLevel::builder()
        .vocab(vocab.into_iter().collect())
        .unk_token("[UNK]".to_string())
        .build()
        .expect("word-level model");

    let mut tokenizer = Tokenizer::new(model);
    tokenizer.with_pre_tokenizer(Some(Whitespace::default()));
    tokenizer.add_special_tokens(&[
        AddedToken::from("[PAD]", true),
        AddedToken::from("[UNK]", true),
    ]);
    tokenizer
}

/// Deterministic encoder stand-in: hidden state depends only on the input
/// IDs, so pooled outputs are reproducible across calls.
pub(crate) struct ToyEncoder {
    hidden: usize,
    scale: f32,
    device: Device,
    var: Option<Var>,
}

impl ToyEncoder {
    /// Frozen variant: empty trainable set.
    pub fn frozen(hidden: usize, scale: f32, device: &Device) -> Self {
        Self {
            hidden,
            scale,
            device: device.clone(),
            var: None,
        }
    }

    /// Trainable variant: exposes one parameter tensor. The parameter does
    /// not influence the forward pass, so frozen and trainable variants
    /// with equal `scale` produce identical outputs.
    pub fn trainable(hidden: usize, scale: f32, device: &Device) -> Self {
        let var = Var::zeros(hidden, DType::F32, device).expect("toy var");
        Self {
            hidden,
            scale,
            device: device.clone(),
            var: Some(var),
        }
    }
}

impl SentenceEncoder for ToyEncoder {
    fn encode(&self, input_ids: &Tensor, _attention_mask: &Tensor) -> Result<Tensor> {
        let (batch, seq) = input_ids
            .dims2()
            .map_err(|e| BloomNetError::Model(e.to_string()))?;
        let rows = input_ids
            .to_vec2::<u32>()
            .map_err(|e| BloomNetError::Model(e.to_string()))?;

        let mut data = Vec::with_capacity(batch * seq * self.hidden);
        for row in &rows {
            for &id in row {
                for h in 0..self.hidden {
                    data.push(self.scale * (id as f32 + 1.0) + h as f32 * 1e-3);
                }
            }
        }

        Tensor::from_vec(data, (batch, seq, self.hidden), &self.device)
            .map_err(|e| BloomNetError::Model(e.to_string()))
    }

    fn hidden_size(&self) -> usize {
        self.hidden
    }

    fn trainable_vars(&self) -> Vec<Var> {
        self.var.iter().cloned().collect()
    }
}
