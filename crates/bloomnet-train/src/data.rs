//! Dataset loading, tokenization, stratified splitting, and batch iteration.

use std::path::Path;

use bloomnet_core::{BloomLevel, BloomNetError, LabeledText, Result};
use candle_core::{DType, Device, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Load a labeled dataset from a JSON array of `{"text", "level"}` records.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<LabeledText>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let examples: Vec<LabeledText> = serde_json::from_str(&raw)?;
    tracing::info!(
        path = %path.as_ref().display(),
        examples = examples.len(),
        "Dataset loaded"
    );
    Ok(examples)
}

/// A tokenized dataset ready for training.
///
/// `input_ids` and `attention_mask` are `[N, max_len]` U32 tensors under
/// the primary vocabulary; `labels` is an `[N]` U32 tensor of class indices.
pub struct EncodedDataset {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub labels: Tensor,
}

impl EncodedDataset {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.dim(0).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tokenize every example under the primary vocabulary with truncation and
/// fixed-length padding to `max_len`.
pub fn encode_dataset(
    examples: &[LabeledText],
    mut tokenizer: Tokenizer,
    max_len: usize,
    device: &Device,
) -> Result<EncodedDataset> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| BloomNetError::Tokenization(format!("Failed to configure truncation: {e}")))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_len),
        ..Default::default()
    }));

    let mut ids = Vec::with_capacity(examples.len() * max_len);
    let mut mask = Vec::with_capacity(examples.len() * max_len);
    let mut labels = Vec::with_capacity(examples.len());

    for example in examples {
        let encoding = tokenizer.encode(example.text.as_str(), true).map_err(|e| {
            BloomNetError::Tokenization(format!("Failed to tokenize example: {e}"))
        })?;
        ids.extend_from_slice(encoding.get_ids());
        mask.extend_from_slice(encoding.get_attention_mask());
        labels.push(example.level.index() as u32);
    }

    let shape = (examples.len(), max_len);
    let input_ids = Tensor::from_vec(ids, shape, device)
        .map_err(|e| BloomNetError::Model(format!("Failed to build input ids: {e}")))?;
    let attention_mask = Tensor::from_vec(mask, shape, device)
        .map_err(|e| BloomNetError::Model(format!("Failed to build attention mask: {e}")))?;
    let labels = Tensor::from_vec(labels, examples.len(), device)
        .map_err(|e| BloomNetError::Model(format!("Failed to build labels: {e}")))?;

    Ok(EncodedDataset {
        input_ids,
        attention_mask,
        labels,
    })
}

/// Train/validation split.
pub struct DataSplit {
    pub train: EncodedDataset,
    pub val: EncodedDataset,
    pub train_indices: Vec<usize>,
    pub val_indices: Vec<usize>,
}

/// Stratified train/validation split preserving per-level ratios.
///
/// Every index lands in exactly one side. Each of the six level buckets is
/// shuffled with a seeded RNG before `val_ratio` of it is set aside.
pub fn stratified_split(dataset: &EncodedDataset, val_ratio: f64, seed: u64) -> Result<DataSplit> {
    if !(0.0..1.0).contains(&val_ratio) {
        return Err(BloomNetError::Config(format!(
            "val_ratio must be in [0, 1), got {val_ratio}"
        )));
    }

    let labels_vec: Vec<u32> = dataset
        .labels
        .to_vec1()
        .map_err(|e| BloomNetError::Model(format!("Failed to read labels: {e}")))?;

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); BloomLevel::COUNT];
    for (i, &label) in labels_vec.iter().enumerate() {
        let class = label as usize;
        if class >= BloomLevel::COUNT {
            return Err(BloomNetError::Config(format!(
                "label {label} outside the {} Bloom levels",
                BloomLevel::COUNT
            )));
        }
        buckets[class].push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut val_indices = Vec::new();
    for bucket in &mut buckets {
        bucket.shuffle(&mut rng);
        let val_count = (bucket.len() as f64 * val_ratio).round() as usize;
        val_indices.extend_from_slice(&bucket[..val_count]);
        train_indices.extend_from_slice(&bucket[val_count..]);
    }

    tracing::info!(
        train = train_indices.len(),
        val = val_indices.len(),
        "Stratified split"
    );

    Ok(DataSplit {
        train: gather_examples(dataset, &train_indices)?,
        val: gather_examples(dataset, &val_indices)?,
        train_indices,
        val_indices,
    })
}

fn gather_examples(dataset: &EncodedDataset, indices: &[usize]) -> Result<EncodedDataset> {
    Ok(EncodedDataset {
        input_ids: gather_rows(&dataset.input_ids, indices)?,
        attention_mask: gather_rows(&dataset.attention_mask, indices)?,
        labels: gather_rows(&dataset.labels, indices)?,
    })
}

fn gather_rows(tensor: &Tensor, indices: &[usize]) -> Result<Tensor> {
    let device = tensor.device().clone();
    if indices.is_empty() {
        let mut dims = tensor.dims().to_vec();
        dims[0] = 0;
        return Tensor::zeros(dims, DType::U32, &device)
            .map_err(|e| BloomNetError::Model(format!("Failed to build empty selection: {e}")));
    }
    let idx: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
    let idx_tensor = Tensor::new(idx.as_slice(), &device)
        .map_err(|e| BloomNetError::Model(format!("Failed to build index tensor: {e}")))?;
    tensor
        .index_select(&idx_tensor, 0)
        .map_err(|e| BloomNetError::Model(format!("Row selection failed: {e}")))
}

/// Mini-batch iterator over an encoded dataset. Reshuffles indices each epoch.
pub struct BatchIterator<'a> {
    dataset: &'a EncodedDataset,
    indices: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl<'a> BatchIterator<'a> {
    pub fn new(dataset: &'a EncodedDataset, batch_size: usize) -> Self {
        let n = dataset.len();
        Self {
            dataset,
            indices: (0..n).collect(),
            batch_size: batch_size.max(1),
            pos: 0,
        }
    }

    /// Reshuffle for a new epoch using a seeded RNG derived from base seed + epoch.
    pub fn reshuffle(&mut self, seed: u64, epoch: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
        self.indices.shuffle(&mut rng);
        self.pos = 0;
    }

    /// Next `(input_ids, attention_mask, labels)` mini-batch, or `None` when
    /// the epoch is exhausted.
    pub fn next_batch(&mut self) -> Option<(Tensor, Tensor, Tensor)> {
        if self.pos >= self.indices.len() {
            return None;
        }

        let end = (self.pos + self.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.pos..end];
        self.pos = end;

        let ids = gather_rows(&self.dataset.input_ids, batch_indices).ok()?;
        let mask = gather_rows(&self.dataset.attention_mask, batch_indices).ok()?;
        let labels = gather_rows(&self.dataset.labels, batch_indices).ok()?;
        Some((ids, mask, labels))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;
    use tokenizers::AddedToken;

    const L: usize = 8;

    fn toy_tokenizer() -> Tokenizer {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        vocab.insert("[PAD]".to_string(), 0);
        vocab.insert("[UNK]".to_string(), 1);
        for (i, word) in ["list", "explain", "apply", "compare", "judge", "design"]
            .iter()
            .enumerate()
        {
            vocab.insert((*word).to_string(), (i + 2) as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab.into_iter().collect())
            .unk_token("[UNK]".to_string())
            .build()
            .unwrap();
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Some(Whitespace::default()));
        tokenizer.add_special_tokens(&[
            AddedToken::from("[PAD]", true),
            AddedToken::from("[UNK]", true),
        ]);
        tokenizer
    }

    fn toy_examples(per_level: usize) -> Vec<LabeledText> {
        let verbs = ["list", "explain", "apply", "compare", "judge", "design"];
        let mut examples = Vec::new();
        for (i, level) in BloomLevel::ALL.iter().enumerate() {
            for _ in 0..per_level {
                examples.push(LabeledText {
                    text: format!("{} explain list", verbs[i]),
                    level: *level,
                });
            }
        }
        examples
    }

    #[test]
    fn test_load_dataset_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"text": "List the planets", "level": "remember"}},
                {{"text": "Design an experiment", "level": "create"}}]"#
        )
        .unwrap();

        let examples = load_dataset(file.path()).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].level, BloomLevel::Remember);
        assert_eq!(examples[1].level, BloomLevel::Create);
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let result = load_dataset("/nonexistent/dataset.json");
        assert!(matches!(result, Err(BloomNetError::Io(_))));
    }

    #[test]
    fn test_encode_dataset_shapes_and_labels() {
        let examples = toy_examples(1);
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();

        assert_eq!(dataset.input_ids.dims(), &[6, L]);
        assert_eq!(dataset.attention_mask.dims(), &[6, L]);
        assert_eq!(dataset.labels.dims(), &[6]);
        assert_eq!(dataset.len(), 6);

        let labels: Vec<u32> = dataset.labels.to_vec1().unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_encode_empty_dataset() {
        let dataset = encode_dataset(&[], toy_tokenizer(), L, &Device::Cpu).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.input_ids.dims(), &[0, L]);
    }

    #[test]
    fn test_stratified_split_covers_every_index_once() {
        let examples = toy_examples(5);
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();

        let split = stratified_split(&dataset, 0.2, 42).unwrap();
        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.val_indices.iter())
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_split_preserves_class_ratio() {
        let examples = toy_examples(10);
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();

        let split = stratified_split(&dataset, 0.2, 42).unwrap();
        assert_eq!(split.val.len(), 12); // 20% of 10 per level, 6 levels
        assert_eq!(split.train.len(), 48);

        let val_labels: Vec<u32> = split.val.labels.to_vec1().unwrap();
        for class in 0..BloomLevel::COUNT as u32 {
            assert_eq!(val_labels.iter().filter(|&&l| l == class).count(), 2);
        }
    }

    #[test]
    fn test_stratified_split_rejects_bad_ratio() {
        let examples = toy_examples(1);
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();
        assert!(stratified_split(&dataset, 1.0, 42).is_err());
        assert!(stratified_split(&dataset, -0.1, 42).is_err());
    }

    #[test]
    fn test_batch_iterator_exhausts() {
        let examples = toy_examples(2); // 12 examples
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();

        let mut iter = BatchIterator::new(&dataset, 5);
        iter.reshuffle(42, 0);

        let mut count = 0;
        let mut seen = 0;
        while let Some((ids, mask, labels)) = iter.next_batch() {
            assert_eq!(ids.dims()[1], L);
            assert_eq!(mask.dims(), ids.dims());
            seen += labels.dims()[0];
            count += 1;
        }
        assert_eq!(count, 3); // ceil(12 / 5)
        assert_eq!(seen, 12);
    }

    #[test]
    fn test_batch_iterator_reshuffle_is_seed_deterministic() {
        let examples = toy_examples(4);
        let dataset = encode_dataset(&examples, toy_tokenizer(), L, &Device::Cpu).unwrap();

        let first_batch = |seed: u64, epoch: usize| -> Vec<u32> {
            let mut iter = BatchIterator::new(&dataset, 8);
            iter.reshuffle(seed, epoch);
            iter.next_batch().unwrap().2.to_vec1().unwrap()
        };

        assert_eq!(first_batch(42, 0), first_batch(42, 0));
        assert_ne!(first_batch(42, 0), first_batch(42, 1));
    }
}
