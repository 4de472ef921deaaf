//! BERT sequence classifiers loaded from a local checkpoint directory.
//!
//! Expects the usual layout: `config.json` (with `id2label`), `tokenizer.json`
//! and `model.safetensors` or `pytorch_model.bin`, with a pooler and a
//! `classifier` head on top of the encoder.

use anyhow::{anyhow, ensure, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use candle_core::{DType, Device, IndexOp, D};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use travelrag_core::traits::Classifier;
use travelrag_core::types::Classification;
use travelrag_embed::{load_tokenizer, load_var_builder, read_json, select_device, tokenize_on_device};

/// Token budget shared by the stock sentiment and emotion checkpoints.
pub const CLASSIFIER_MAX_LEN: usize = 512;

#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default)]
    max_position_embeddings: Option<usize>,
    id2label: HashMap<String, String>,
}

pub struct BertClassifier {
    model: BertModel,
    pooler: Linear,
    head: Linear,
    labels: Vec<String>,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

fn labels_in_order(id2label: HashMap<String, String>) -> Result<Vec<String>> {
    let mut pairs = id2label
        .into_iter()
        .map(|(k, v)| k.parse::<usize>().map(|i| (i, v)).map_err(|_| anyhow!("bad id2label key '{}'", k)))
        .collect::<Result<Vec<_>>>()?;
    pairs.sort_by_key(|(i, _)| *i);
    for (expected, (i, _)) in pairs.iter().enumerate() {
        ensure!(*i == expected, "id2label is not contiguous at {}", expected);
    }
    Ok(pairs.into_iter().map(|(_, v)| v).collect())
}

fn load_pooler(vb: &VarBuilder, hidden: usize) -> Result<Linear> {
    candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
        .or_else(|_| candle_nn::linear(hidden, hidden, vb.pp("pooler.dense")))
        .map_err(|e| anyhow!("pooler weights missing: {}", e))
}

impl BertClassifier {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        let config_path = model_dir.join("config.json");
        let config: BertConfig = read_json(&config_path)?;
        let head: HeadConfig = read_json(&config_path)?;
        let labels = labels_in_order(head.id2label)?;
        ensure!(!labels.is_empty(), "{} declares no labels", config_path.display());
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let vb = load_var_builder(model_dir, DType::F32, &device)?;
        let model = BertModel::load(vb.clone(), &config)?;
        let pooler = load_pooler(&vb, head.hidden_size)?;
        let classifier = candle_nn::linear(head.hidden_size, labels.len(), vb.pp("classifier"))?;
        let max_len = head.max_position_embeddings.unwrap_or(CLASSIFIER_MAX_LEN).min(CLASSIFIER_MAX_LEN);
        tracing::info!(dir = %model_dir.display(), labels = labels.len(), "classifier ready");
        Ok(Self { model, pooler, head: classifier, labels, tokenizer, device, max_len })
    }
}

impl Classifier for BertClassifier {
    fn max_len(&self) -> usize { self.max_len }

    fn classify(&self, text: &str) -> Result<Classification> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.head.forward(&pooled)?;
        let probs: Vec<f32> = candle_nn::ops::softmax(&logits, D::Minus1)?.squeeze(0)?.to_device(&Device::Cpu)?.to_vec1()?;
        let (best, score) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| anyhow!("classifier produced no scores"))?;
        let label = self.labels.get(best).cloned().ok_or_else(|| anyhow!("no label for class {}", best))?;
        Ok(Classification { label, score })
    }
}

/// Loads the wrapped classifier on first use. A failed load is remembered
/// and reported by every later call.
pub struct LazyClassifier {
    model_dir: PathBuf,
    cell: OnceLock<std::result::Result<Arc<BertClassifier>, String>>,
}

impl LazyClassifier {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self { model_dir: model_dir.into(), cell: OnceLock::new() }
    }

    fn get(&self) -> Result<&Arc<BertClassifier>> {
        let loaded = self.cell.get_or_init(|| {
            BertClassifier::load(&self.model_dir).map(Arc::new).map_err(|e| {
                tracing::warn!(dir = %self.model_dir.display(), error = %e, "classifier failed to load");
                e.to_string()
            })
        });
        loaded.as_ref().map_err(|e| anyhow!("classifier unavailable: {}", e))
    }
}

impl Classifier for LazyClassifier {
    fn max_len(&self) -> usize {
        self.cell.get().and_then(|c| c.as_ref().ok()).map(|c| c.max_len).unwrap_or(CLASSIFIER_MAX_LEN)
    }

    fn classify(&self, text: &str) -> Result<Classification> {
        self.get()?.classify(text)
    }
}
