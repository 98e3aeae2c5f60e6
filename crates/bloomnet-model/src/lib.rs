//! BloomNet model components
//!
//! This crate implements the three-encoder fusion architecture: a primary
//! language-model encoder runs directly on the input tokenization, while two
//! auxiliary encoders (part-of-speech and named-entity) consume the same
//! input through a cross-tokenizer bridge that detokenizes under the source
//! vocabulary and re-tokenizes under each auxiliary vocabulary. The three
//! pooled representations are fused (concatenation or elementwise product)
//! and mapped to class logits by a feed-forward head.
//!
//! # Modules
//!
//! - [`device`] — explicit compute device selection
//! - [`bridge`] — detokenize→re-tokenize bridging between vocabularies
//! - [`encoder`] — the [`SentenceEncoder`] contract and BERT-family loading
//! - [`aux`] — auxiliary encoder wrappers (POS, NER)
//! - [`fusion`] — the end-to-end [`BloomNetClassifier`]

pub mod aux;
pub mod bridge;
pub mod device;
pub mod encoder;
pub mod fusion;

pub use aux::{AuxEncoderConfig, AuxiliaryEncoder, DEFAULT_NER_MODEL, DEFAULT_POS_MODEL};
pub use bridge::TokenBridge;
pub use device::DevicePreference;
pub use encoder::{
    fetch_tokenizer, pooled_summary, BertEncoder, BertEncoderConfig, SentenceEncoder,
};
pub use fusion::{BloomNetClassifier, ClassifierConfig};

#[cfg(test)]
pub(crate) mod testing;
