//! Cross-tokenizer bridging between heterogeneous vocabularies.
//!
//! Token IDs produced under one vocabulary are meaningless under another, so
//! [`TokenBridge`] connects two tokenizers through text: it decodes a batch
//! of source-vocabulary ID sequences back to strings (suppressing special
//! tokens), then re-encodes each string under the target vocabulary with
//! truncation and fixed-length padding. The round trip is intentionally
//! lossy: sub-word artifacts in the reconstructed text are tolerated, and
//! an empty reconstruction still produces a valid padded encoding.

use bloomnet_core::{BloomNetError, Result};
use candle_core::{Device, Tensor};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Bridges a source vocabulary to a target vocabulary via detokenization
/// and re-tokenization.
///
/// Holds immutable references to both tokenizers; stateless across calls.
/// The target tokenizer is configured at construction to truncate at the
/// bridge length and pad every encoding to exactly that length.
pub struct TokenBridge {
    source: Tokenizer,
    target: Tokenizer,
    max_len: usize,
    device: Device,
}

impl TokenBridge {
    /// Create a bridge producing target-vocabulary encodings of fixed
    /// length `max_len` on `device`.
    pub fn new(
        source: Tokenizer,
        mut target: Tokenizer,
        max_len: usize,
        device: &Device,
    ) -> Result<Self> {
        if max_len == 0 {
            return Err(BloomNetError::Config(
                "bridge length must be at least 1".to_string(),
            ));
        }

        target
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| {
                BloomNetError::Tokenization(format!("Failed to configure truncation: {e}"))
            })?;
        target.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_len),
            ..Default::default()
        }));

        Ok(Self {
            source,
            target,
            max_len,
            device: device.clone(),
        })
    }

    /// Fixed output sequence length.
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Device that output tensors are allocated on.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Decode a `[batch, seq_len]` tensor of source-vocabulary IDs to one
    /// string per row, with special tokens suppressed.
    pub fn detokenize(&self, source_ids: &Tensor) -> Result<Vec<String>> {
        let rows = source_ids.to_vec2::<u32>().map_err(|e| {
            BloomNetError::ShapeMismatch(format!("expected [batch, seq_len] source ids: {e}"))
        })?;

        rows.iter()
            .map(|row| {
                self.source.decode(row, true).map_err(|e| {
                    BloomNetError::Tokenization(format!("Source detokenization failed: {e}"))
                })
            })
            .collect()
    }

    /// Encode texts under the target vocabulary, one example at a time,
    /// preserving input order.
    ///
    /// Returns `(ids, mask)` tensors of shape `(batch, max_len)`. Empty
    /// texts yield a degenerate but valid all-padding row.
    pub fn retokenize(&self, texts: &[String]) -> Result<(Tensor, Tensor)> {
        let mut ids = Vec::with_capacity(texts.len() * self.max_len);
        let mut mask = Vec::with_capacity(texts.len() * self.max_len);

        for text in texts {
            let encoding = self.target.encode(text.as_str(), true).map_err(|e| {
                BloomNetError::Tokenization(format!("Target re-tokenization failed: {e}"))
            })?;
            ids.extend_from_slice(encoding.get_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        let shape = (texts.len(), self.max_len);
        let ids = Tensor::from_vec(ids, shape, &self.device)
            .map_err(|e| BloomNetError::Model(format!("Failed to build re-tokenized ids: {e}")))?;
        let mask = Tensor::from_vec(mask, shape, &self.device).map_err(|e| {
            BloomNetError::Model(format!("Failed to build re-tokenized mask: {e}"))
        })?;

        Ok((ids, mask))
    }

    /// Full bridge: detokenize source IDs, then re-tokenize under the
    /// target vocabulary. Output batch size equals input batch size.
    pub fn rebatch(&self, source_ids: &Tensor) -> Result<(Tensor, Tensor)> {
        let texts = self.detokenize(source_ids)?;
        self.retokenize(&texts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
