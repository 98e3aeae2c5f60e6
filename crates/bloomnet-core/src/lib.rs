//! Core types and errors for BloomNet
//!
//! This crate contains the foundational types shared across all BloomNet
//! components: the Bloom's taxonomy class labels, the fusion mode selector,
//! the labeled-example type consumed by the training pipeline, and the
//! common error enum.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bloom's taxonomy levels
// ---------------------------------------------------------------------------

/// The six cognitive levels of Bloom's revised taxonomy, in canonical order.
///
/// The discriminant order defines the class index used in logits and labels:
/// `Remember` = 0 through `Create` = 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloomLevel {
    /// Recall of facts and basic concepts.
    Remember,
    /// Explanation of ideas or concepts.
    Understand,
    /// Use of information in new situations.
    Apply,
    /// Drawing connections among ideas.
    Analyze,
    /// Justification of a stand or decision.
    Evaluate,
    /// Production of new or original work.
    Create,
}

impl BloomLevel {
    /// Number of taxonomy levels (and default classifier output classes).
    pub const COUNT: usize = 6;

    /// All levels in class-index order.
    pub const ALL: [BloomLevel; Self::COUNT] = [
        Self::Remember,
        Self::Understand,
        Self::Apply,
        Self::Analyze,
        Self::Evaluate,
        Self::Create,
    ];

    /// Class index of this level (0-based, canonical order).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Remember => 0,
            Self::Understand => 1,
            Self::Apply => 2,
            Self::Analyze => 3,
            Self::Evaluate => 4,
            Self::Create => 5,
        }
    }

    /// Level for a class index, or `None` if out of range.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl std::fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remember => write!(f, "remember"),
            Self::Understand => write!(f, "understand"),
            Self::Apply => write!(f, "apply"),
            Self::Analyze => write!(f, "analyze"),
            Self::Evaluate => write!(f, "evaluate"),
            Self::Create => write!(f, "create"),
        }
    }
}

impl std::str::FromStr for BloomLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remember" => Ok(Self::Remember),
            "understand" => Ok(Self::Understand),
            "apply" => Ok(Self::Apply),
            "analyze" | "analyse" => Ok(Self::Analyze),
            "evaluate" => Ok(Self::Evaluate),
            "create" => Ok(Self::Create),
            _ => Err(format!("unknown Bloom level: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Fusion mode
// ---------------------------------------------------------------------------

/// How the three pooled encoder representations are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMode {
    /// Concatenate along the feature axis (fused dim = sum of pooled dims).
    #[default]
    Concat,
    /// Elementwise product (requires identical pooled dims across encoders).
    Product,
}

impl FusionMode {
    /// Input dimension of the classifier head for encoders sharing `hidden`.
    #[must_use]
    pub fn fused_dim(self, hidden: usize) -> usize {
        match self {
            Self::Concat => 3 * hidden,
            Self::Product => hidden,
        }
    }
}

impl std::fmt::Display for FusionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Concat => write!(f, "concat"),
            Self::Product => write!(f, "product"),
        }
    }
}

impl std::str::FromStr for FusionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concat" => Ok(Self::Concat),
            "product" => Ok(Self::Product),
            _ => Err(format!("unknown fusion mode: {s} (expected concat|product)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Training example
// ---------------------------------------------------------------------------

/// A single labeled training example: raw text plus its taxonomy level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledText {
    /// The raw input text (e.g. an exam question or learning objective).
    pub text: String,
    /// Ground-truth Bloom level.
    pub level: BloomLevel,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Core error types.
#[derive(thiserror::Error, Debug)]
pub enum BloomNetError {
    /// Model loading or forward-pass error.
    #[error("Model error: {0}")]
    Model(String),

    /// Tokenizer loading, encoding, or decoding error.
    #[error("Tokenization error: {0}")]
    Tokenization(String),

    /// Tensor shape incompatible with the requested operation
    /// (e.g. product fusion over unequal pooled dimensions).
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Tensors on inconsistent devices. Surfaced instead of silently
    /// relocating data.
    #[error("Device mismatch: {0}")]
    DeviceMismatch(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `std::result::Result<T, BloomNetError>`.
pub type Result<T> = std::result::Result<T, BloomNetError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bloom_level_index_round_trip() {
        for (i, level) in BloomLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
            assert_eq!(BloomLevel::from_index(i), Some(*level));
        }
        assert_eq!(BloomLevel::from_index(BloomLevel::COUNT), None);
    }

    #[test]
    fn test_bloom_level_display_from_str_round_trip() {
        for level in BloomLevel::ALL {
            let parsed = BloomLevel::from_str(&level.to_string()).unwrap();
            assert_eq!(parsed, level);
        }
    }

    #[test]
    fn test_bloom_level_from_str_case_insensitive() {
        assert_eq!(BloomLevel::from_str("Remember"), Ok(BloomLevel::Remember));
        assert_eq!(BloomLevel::from_str("ANALYSE"), Ok(BloomLevel::Analyze));
        assert!(BloomLevel::from_str("synthesize").is_err());
    }

    #[test]
    fn test_bloom_level_serde() {
        let json = serde_json::to_string(&BloomLevel::Evaluate).unwrap();
        assert_eq!(json, "\"evaluate\"");
        let level: BloomLevel = serde_json::from_str("\"create\"").unwrap();
        assert_eq!(level, BloomLevel::Create);
    }

    #[test]
    fn test_fusion_mode_default() {
        assert_eq!(FusionMode::default(), FusionMode::Concat);
    }

    #[test]
    fn test_fusion_mode_fused_dim() {
        assert_eq!(FusionMode::Concat.fused_dim(768), 2304);
        assert_eq!(FusionMode::Product.fused_dim(768), 768);
    }

    #[test]
    fn test_fusion_mode_from_str() {
        assert_eq!(FusionMode::from_str("concat"), Ok(FusionMode::Concat));
        assert_eq!(FusionMode::from_str("Product"), Ok(FusionMode::Product));
        assert!(FusionMode::from_str("sum").is_err());
    }

    #[test]
    fn test_labeled_text_serde() {
        let json = r#"{"text": "List the planets of the solar system.", "level": "remember"}"#;
        let example: LabeledText = serde_json::from_str(json).unwrap();
        assert_eq!(example.level, BloomLevel::Remember);
        assert!(example.text.starts_with("List"));
    }

    #[test]
    fn test_error_display() {
        let err = BloomNetError::ShapeMismatch("pooled dims 768 vs 512".to_string());
        assert!(err.to_string().contains("Shape mismatch"));
        let err = BloomNetError::DeviceMismatch("input on Cpu, model on Cuda(0)".to_string());
        assert!(err.to_string().contains("Device mismatch"));
    }
}
