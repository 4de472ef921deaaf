//! Domain types used by the indexer, the store and the query pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type DocumentId = String;

/// Emotion label used whenever a classifier is unsure or unavailable.
pub const NEUTRAL_EMOTION: &str = "neutral";

/// Which class of source record an indexed document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Faq,
    Review,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Faq => "faq",
            SourceKind::Review => "review",
        }
    }

    /// Deterministic index identity for a source row: `faq_<id>` / `review_<id>`.
    pub fn stable_id(self, db_id: i64) -> DocumentId {
        format!("{}_{}", self.as_str(), db_id)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "faq" => Ok(SourceKind::Faq),
            "review" => Ok(SourceKind::Review),
            other => Err(Error::IndexUnavailable(format!("unknown document source '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqRecord {
    pub id: i64,
    #[serde(default)]
    pub hotel_id: Option<i64>,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub user_id: i64,
    pub hotel_id: i64,
    pub content: String,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default = "neutral_emotion")]
    pub emotion: String,
    #[serde(default)]
    pub rating: Option<u8>,
}

fn neutral_emotion() -> String {
    NEUTRAL_EMOTION.to_string()
}

/// Sentiment and emotion computed once when a review is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub sentiment: Sentiment,
    pub emotion: String,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self { sentiment: Sentiment::Neutral, emotion: neutral_emotion() }
    }
}

/// Raw output of a sequence classifier: best label and its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: SourceKind,
    pub db_id: i64,
    pub hotel_id: Option<i64>,
}

/// A record rendered to text and ready to be embedded.
///
/// `stable_id` is derived from `metadata.source` and `metadata.db_id`, so
/// pushing the same record twice overwrites the earlier entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub stable_id: DocumentId,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A document returned by the store together with its similarity score.
///
/// `score` is cosine similarity; higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: DocumentId,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub score: f32,
}

impl RetrievedDocument {
    pub fn source_ref(&self) -> SourceRef {
        SourceRef { source: self.metadata.source, db_id: self.metadata.db_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: SourceKind,
    pub db_id: i64,
}

/// Answer plus every document that was shown to the model, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl QueryResult {
    pub const FALLBACK_ANSWER: &'static str =
        "I'm sorry, I couldn't process your question right now. Please try again later.";

    pub fn fallback() -> Self {
        Self { answer: Self::FALLBACK_ANSWER.to_string(), sources: Vec::new() }
    }

    pub fn is_fallback(&self) -> bool {
        self.answer == Self::FALLBACK_ANSWER && self.sources.is_empty()
    }
}

/// Last durability checkpoint written by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u64,
    pub at_millis: i64,
}
