//! travelrag-embed
//!
//! Sentence embeddings for indexing and query encoding. The same embedder
//! instance must serve both sides, otherwise similarities are meaningless.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use travelrag_core::settings::ModelSettings;
use travelrag_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;
pub mod weights;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::{load_tokenizer, tokenize_on_device};
pub use weights::{load_var_builder, read_json};

/// Dimension of `all-MiniLM-L6-v2`; also used by [`HashingEmbedder`] so the
/// two are interchangeable against one table.
pub const DEFAULT_DIM: usize = 384;

#[derive(Debug, Deserialize)]
struct EncoderShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

/// BERT-family sentence encoder with masked mean pooling.
pub struct SentenceEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize }

impl SentenceEmbedder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence encoder");
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = read_json(&config_path)?;
        let shape: EncoderShape = read_json(&config_path)?;
        let vb = load_var_builder(model_dir, DType::F32, &device)?;
        let model = BertModel::load(vb, &config)?;
        let max_len = shape.max_position_embeddings.min(256);
        tracing::info!(dim = shape.hidden_size, max_len, "sentence encoder ready");
        Ok(Self { model, tokenizer, device, dim: shape.hidden_size, max_len })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let v: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if v.len() != self.dim { return Err(anyhow!("encoder returned {} dims, expected {}", v.len(), self.dim)); }
        if start.elapsed().as_millis() > 100 { tracing::debug!(ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(v)
    }
}

impl Embedder for SentenceEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_one(t)).collect() }
}

/// Feature-hashing encoder over lower-cased words and their character
/// trigrams. Deterministic, model-free and good enough to rank texts that
/// share vocabulary; used in tests and offline development.
pub struct HashingEmbedder { dim: usize }

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn bucket(&self, feature: &str) -> usize {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut hasher = XxHash64::with_seed(0);
        feature.hash(&mut hasher);
        (hasher.finish() % self.dim as u64) as usize
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            v[self.bucket(word)] += 1.0;
            let padded: Vec<char> = std::iter::once('#').chain(word.chars()).chain(std::iter::once('#')).collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                v[self.bucket(&gram)] += 0.5;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(models: &ModelSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() { tracing::info!("using HashingEmbedder"); return Ok(Box::new(HashingEmbedder::new(DEFAULT_DIM))); }
    Ok(Box::new(SentenceEmbedder::load(&resolve_model_dir(&models.embedding_dir)?)?))
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { tracing::info!(dir = %p.display(), "using APP_MODEL_DIR"); return Ok(p); } }
    let p = travelrag_core::config::expand_path(configured);
    if p.exists() { return Ok(p); }
    Err(anyhow!("Could not locate embedding model directory {}", p.display()))
}

/// Cosine similarity of two equal-length vectors; 0 when either is zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
