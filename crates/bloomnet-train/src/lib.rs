//! Training pipeline for the BloomNet fusion classifier.
//!
//! Loads a labeled JSON dataset, tokenizes it under the primary
//! vocabulary, splits it stratified by Bloom level, and fine-tunes the
//! classifier head (plus any unfrozen encoders) with AdamW, cross-entropy
//! loss, and early stopping on validation loss.

pub mod data;
pub mod metrics;
pub mod trainer;
