//! Typed settings extracted from [`crate::config::Config`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{expand_path, resolve_with_base};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub models: ModelSettings,
    pub retrieval: RetrievalSettings,
    pub enrichment: EnrichmentSettings,
    pub generation: GenerationSettings,
}

fn resolve_in_place(base: &Path, value: &mut String) {
    *value = resolve_with_base(base, value.as_str()).to_string_lossy().into_owned();
}

impl Settings {
    /// Rewrite every configured path as `base`-relative (absolute paths and
    /// `~`/`${VAR}` expansions are kept as they resolve).
    pub fn resolve_paths(&mut self, base: &Path) {
        let d = &mut self.data;
        let m = &mut self.models;
        for value in [
            &mut d.lancedb_dir,
            &mut d.records_file,
            &mut m.embedding_dir,
            &mut m.sentiment_dir,
            &mut m.emotion_dir,
            &mut m.generator_dir,
        ] {
            resolve_in_place(base, value);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.score_threshold) {
            return Err(Error::InvalidConfig(format!(
                "retrieval.score_threshold must be within [0, 1], got {}",
                r.score_threshold
            )));
        }
        if r.customer_k == 0 || r.owner_k == 0 {
            return Err(Error::InvalidConfig("retrieval k must be at least 1".into()));
        }
        let e = &self.enrichment;
        for (name, t) in [("sentiment_threshold", e.sentiment_threshold), ("emotion_threshold", e.emotion_threshold)] {
            if !(0.0..=1.0).contains(&t) {
                return Err(Error::InvalidConfig(format!("enrichment.{name} must be within [0, 1], got {t}")));
            }
        }
        let g = &self.generation;
        if g.timeout_secs == 0 {
            return Err(Error::InvalidConfig("generation.timeout_secs must be positive".into()));
        }
        if g.temperature <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "generation.temperature must be positive, got {}",
                g.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub lancedb_dir: String,
    pub table: String,
    pub records_file: String,
}

impl DataSettings {
    pub fn lancedb_path(&self) -> PathBuf {
        expand_path(&self.lancedb_dir)
    }

    pub fn records_path(&self) -> PathBuf {
        expand_path(&self.records_file)
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            lancedb_dir: "dev_data/indexes/lancedb".to_string(),
            table: "travel_data".to_string(),
            records_file: "dev_data/records.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedding_dir: String,
    pub sentiment_dir: String,
    pub emotion_dir: String,
    pub generator_dir: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedding_dir: "models/all-MiniLM-L6-v2".to_string(),
            sentiment_dir: "models/sentiment".to_string(),
            emotion_dir: "models/emotion".to_string(),
            generator_dir: "models/flan-t5-base".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub score_threshold: f32,
    pub customer_k: usize,
    pub owner_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { score_threshold: 0.5, customer_k: 3, owner_k: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub sentiment_threshold: f32,
    pub emotion_threshold: f32,
    pub max_chars: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self { sentiment_threshold: 0.7, emotion_threshold: 0.5, max_chars: 512 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub timeout_secs: u64,
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub seed: u64,
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { timeout_secs: 60, max_new_tokens: 256, temperature: 0.7, seed: 299_792_458 }
    }
}
