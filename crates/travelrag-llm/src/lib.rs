//! travelrag-llm
//!
//! Text generation backends. One checkpoint is loaded and exposed under two
//! decoding configurations: greedy for reproducible analysis and
//! temperature sampling for conversational answers.

use anyhow::Result;
use std::sync::Arc;

use candle_transformers::generation::LogitsProcessor;
use travelrag_core::config::expand_path;
use travelrag_core::settings::{GenerationSettings, ModelSettings};
use travelrag_core::traits::Generator;
use travelrag_core::GenerationMode;

pub mod t5;

pub use t5::{SharedT5, T5Generator, T5Model, MAX_PROMPT_TOKENS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    Greedy,
    Temperature { temperature: f64, seed: u64 },
}

impl Sampling {
    pub fn for_mode(mode: GenerationMode, settings: &GenerationSettings) -> Self {
        match mode {
            GenerationMode::Deterministic => Sampling::Greedy,
            GenerationMode::Stochastic => Sampling::Temperature { temperature: settings.temperature, seed: settings.seed },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sampling::Greedy => "greedy",
            Sampling::Temperature { .. } => "sampled",
        }
    }

    /// Fresh processor for the `call`-th generation. Sampled calls advance
    /// the seed so repeated questions do not replay the same draw.
    pub fn logits_processor(&self, call: u64) -> LogitsProcessor {
        match *self {
            Sampling::Greedy => LogitsProcessor::new(0, None, None),
            Sampling::Temperature { temperature, seed } => {
                LogitsProcessor::new(seed.wrapping_add(call), Some(temperature), None)
            }
        }
    }
}

/// The two generation configurations, selected by [`GenerationMode`].
#[derive(Clone)]
pub struct GenerationBackends {
    deterministic: Arc<dyn Generator>,
    stochastic: Arc<dyn Generator>,
}

impl GenerationBackends {
    pub fn new(deterministic: Arc<dyn Generator>, stochastic: Arc<dyn Generator>) -> Self {
        Self { deterministic, stochastic }
    }

    /// Same generator for both modes; handy for tests and stub backends.
    pub fn single(generator: Arc<dyn Generator>) -> Self {
        Self { deterministic: generator.clone(), stochastic: generator }
    }

    /// Load the configured checkpoint now.
    pub fn load(models: &ModelSettings, settings: &GenerationSettings) -> Result<Self> {
        let dir = expand_path(&models.generator_dir);
        let model = T5Model::load(&dir)?;
        Ok(Self::over(Arc::new(SharedT5::loaded(dir, model)), settings))
    }

    /// Defer loading the checkpoint until the first question. Load failures
    /// surface as generation errors.
    pub fn lazy(models: &ModelSettings, settings: &GenerationSettings) -> Self {
        Self::over(Arc::new(SharedT5::lazy(expand_path(&models.generator_dir))), settings)
    }

    fn over(model: Arc<SharedT5>, settings: &GenerationSettings) -> Self {
        let make = |mode| -> Arc<dyn Generator> {
            Arc::new(
                T5Generator::new(model.clone(), Sampling::for_mode(mode, settings), settings.max_new_tokens)
                    .with_time_limit(settings.timeout()),
            )
        };
        Self::new(make(GenerationMode::Deterministic), make(GenerationMode::Stochastic))
    }

    pub fn for_mode(&self, mode: GenerationMode) -> Arc<dyn Generator> {
        match mode {
            GenerationMode::Deterministic => self.deterministic.clone(),
            GenerationMode::Stochastic => self.stochastic.clone(),
        }
    }
}
