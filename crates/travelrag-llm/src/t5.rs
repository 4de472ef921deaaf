//! Encoder-decoder generation with a candle T5 checkpoint (flan-t5 family).

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{Config as T5Config, T5ForConditionalGeneration};
use tokenizers::Tokenizer;

use travelrag_core::traits::Generator;
use travelrag_embed::{load_tokenizer, load_var_builder, read_json, select_device};

use crate::Sampling;

/// Encoder context of the flan-t5 checkpoints.
pub const MAX_PROMPT_TOKENS: usize = 512;

#[derive(Debug, Deserialize)]
struct SpecialTokens {
    pad_token_id: u32,
    eos_token_id: u32,
    #[serde(default)]
    decoder_start_token_id: Option<u32>,
}

/// One loaded checkpoint. Decoding mutates the KV cache, so calls serialize
/// on the inner mutex.
pub struct T5Model {
    model: Mutex<T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    device: Device,
    tokens: SpecialTokens,
}

impl T5Model {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let start = Instant::now();
        let device = select_device();
        let config_path = model_dir.join("config.json");
        let config: T5Config = read_json(&config_path)?;
        let tokens: SpecialTokens = read_json(&config_path)?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"))?;
        let vb = load_var_builder(model_dir, DType::F32, &device)?;
        let model = T5ForConditionalGeneration::load(vb, &config)?;
        tracing::info!(dir = %model_dir.display(), ms = start.elapsed().as_millis() as u64, "generator loaded");
        Ok(Self { model: Mutex::new(model), tokenizer, device, tokens })
    }

    fn encode_prompt(&self, prompt: &str) -> Result<Tensor> {
        let enc = self.tokenizer.encode(prompt, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        if ids.len() > MAX_PROMPT_TOKENS {
            tracing::debug!(tokens = ids.len(), "prompt truncated");
            ids.truncate(MAX_PROMPT_TOKENS - 1);
            ids.push(self.tokens.eos_token_id);
        }
        Ok(Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?)
    }

    /// Decode at most `max_new_tokens`, giving up once `deadline` passes so
    /// an abandoned call releases the model.
    pub fn generate(
        &self,
        prompt: &str,
        max_new_tokens: usize,
        mut logits: LogitsProcessor,
        deadline: Option<Instant>,
    ) -> Result<String> {
        let input_ids = self.encode_prompt(prompt)?;
        let mut model = self.model.lock().map_err(|_| anyhow!("generator lock poisoned"))?;
        let encoder_output = model.encode(&input_ids)?;
        let start_id = self.tokens.decoder_start_token_id.unwrap_or(self.tokens.pad_token_id);
        let mut output = vec![start_id];
        let result = (|| -> Result<()> {
            for step in 0..max_new_tokens {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    bail!("decoding stopped after {} tokens: time limit reached", step);
                }
                // after the first step the KV cache holds the prefix
                let decoder_ids = if step == 0 {
                    Tensor::new(output.as_slice(), &self.device)?.unsqueeze(0)?
                } else {
                    let last = output[output.len() - 1];
                    Tensor::new(&[last], &self.device)?.unsqueeze(0)?
                };
                let step_logits = model.decode(&decoder_ids, &encoder_output)?.squeeze(0)?;
                let next = logits.sample(&step_logits)?;
                if next == self.tokens.eos_token_id {
                    break;
                }
                output.push(next);
            }
            Ok(())
        })();
        model.clear_kv_cache();
        result?;
        self.tokenizer.decode(&output[1..], true).map_err(|e| anyhow!("Detokenization failed: {}", e))
    }
}

/// A checkpoint that is either already loaded or loaded on first use. A
/// failed load is remembered for the lifetime of the process.
pub struct SharedT5 {
    model_dir: PathBuf,
    cell: OnceLock<std::result::Result<T5Model, String>>,
}

impl SharedT5 {
    pub fn lazy(model_dir: impl Into<PathBuf>) -> Self {
        Self { model_dir: model_dir.into(), cell: OnceLock::new() }
    }

    pub fn loaded(model_dir: impl Into<PathBuf>, model: T5Model) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(model));
        Self { model_dir: model_dir.into(), cell }
    }

    fn get(&self) -> Result<&T5Model> {
        let loaded = self.cell.get_or_init(|| {
            T5Model::load(&self.model_dir).map_err(|e| {
                tracing::warn!(dir = %self.model_dir.display(), error = %e, "generator failed to load");
                e.to_string()
            })
        });
        loaded.as_ref().map_err(|e| anyhow!("generator unavailable: {}", e))
    }
}

/// A [`Generator`] bound to one sampling configuration of a shared model.
pub struct T5Generator {
    model: Arc<SharedT5>,
    sampling: Sampling,
    max_new_tokens: usize,
    time_limit: Option<Duration>,
    calls: AtomicU64,
    name: String,
}

impl T5Generator {
    pub fn new(model: Arc<SharedT5>, sampling: Sampling, max_new_tokens: usize) -> Self {
        let name = format!("t5/{}", sampling.label());
        Self { model, sampling, max_new_tokens, time_limit: None, calls: AtomicU64::new(0), name }
    }

    /// Stop decoding once a call has run this long, counted from the call
    /// rather than from acquiring the model.
    #[must_use]
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn sampling(&self) -> Sampling { self.sampling }
}

impl Generator for T5Generator {
    fn name(&self) -> &str { &self.name }

    fn generate(&self, prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let deadline = self.time_limit.map(|limit| start + limit);
        let answer =
            self.model.get()?.generate(prompt, self.max_new_tokens, self.sampling.logits_processor(call), deadline)?;
        tracing::debug!(generator = %self.name, ms = start.elapsed().as_millis() as u64, chars = answer.len(), "generated");
        Ok(answer.trim().to_string())
    }
}
