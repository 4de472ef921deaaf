//! travelrag-enrich
//!
//! Sentiment and emotion tagging for new reviews. Every failure path degrades
//! to a neutral label; enrichment never blocks a review from being stored.

use std::sync::{Arc, OnceLock};

use travelrag_core::config::expand_path;
use travelrag_core::settings::{EnrichmentSettings, ModelSettings};
use travelrag_core::traits::Classifier;
use travelrag_core::types::{Enrichment, Sentiment, NEUTRAL_EMOTION};

pub mod classifier;

pub use classifier::{BertClassifier, LazyClassifier, CLASSIFIER_MAX_LEN};

/// Map a classifier label onto the three sentiment buckets.
pub fn sentiment_from_label(label: &str) -> Sentiment {
    let l = label.to_ascii_lowercase();
    if l.contains("pos") {
        Sentiment::Positive
    } else if l.contains("neg") {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

pub struct ContentEnricher {
    sentiment: Arc<dyn Classifier>,
    emotion: Arc<dyn Classifier>,
    settings: EnrichmentSettings,
}

impl ContentEnricher {
    pub fn new(sentiment: Arc<dyn Classifier>, emotion: Arc<dyn Classifier>, settings: EnrichmentSettings) -> Self {
        Self { sentiment, emotion, settings }
    }

    /// Lazily-loaded BERT classifiers from the configured model directories.
    pub fn from_settings(models: &ModelSettings, settings: &EnrichmentSettings) -> Self {
        Self::new(
            Arc::new(LazyClassifier::new(expand_path(&models.sentiment_dir))),
            Arc::new(LazyClassifier::new(expand_path(&models.emotion_dir))),
            settings.clone(),
        )
    }

    pub fn settings(&self) -> &EnrichmentSettings { &self.settings }

    fn classify(&self, classifier: &dyn Classifier, kind: &str, text: &str) -> Option<(String, f32)> {
        let input = truncate_chars(text, self.settings.max_chars);
        if input.trim().is_empty() {
            return None;
        }
        match classifier.classify(input) {
            Ok(c) => Some((c.label, c.score)),
            Err(e) => {
                tracing::warn!(kind, error = %e, "classification failed, using neutral");
                None
            }
        }
    }

    /// Positive or negative only when the classifier is at least
    /// `threshold` confident, neutral otherwise.
    pub fn analyze_sentiment(&self, text: &str, threshold: f32) -> Sentiment {
        match self.classify(self.sentiment.as_ref(), "sentiment", text) {
            Some((label, score)) if score >= threshold => sentiment_from_label(&label),
            Some((label, score)) => {
                tracing::debug!(%label, score, threshold, "sentiment below threshold");
                Sentiment::Neutral
            }
            None => Sentiment::Neutral,
        }
    }

    /// The classifier's own label, lower-cased, or `neutral` below `threshold`.
    pub fn detect_emotion(&self, text: &str, threshold: f32) -> String {
        match self.classify(self.emotion.as_ref(), "emotion", text) {
            Some((label, score)) if score >= threshold => label.to_lowercase(),
            _ => NEUTRAL_EMOTION.to_string(),
        }
    }

    /// Both labels at the configured thresholds.
    pub fn enrich(&self, text: &str) -> Enrichment {
        Enrichment {
            sentiment: self.analyze_sentiment(text, self.settings.sentiment_threshold),
            emotion: self.detect_emotion(text, self.settings.emotion_threshold),
        }
    }
}

static SHARED: OnceLock<Arc<ContentEnricher>> = OnceLock::new();

/// Process-wide enricher. The first caller's settings win; models load on
/// first classification, not here.
pub fn shared_enricher(models: &ModelSettings, settings: &EnrichmentSettings) -> Arc<ContentEnricher> {
    SHARED.get_or_init(|| Arc::new(ContentEnricher::from_settings(models, settings))).clone()
}
