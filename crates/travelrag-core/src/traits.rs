use async_trait::async_trait;

use crate::role::MetadataFilter;
use crate::types::{Checkpoint, Classification, FaqRecord, IndexedDocument, RetrievedDocument, ReviewRecord};

/// Deterministic text → fixed-dimension vector function.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Single-label text classifier (sentiment, emotion).
pub trait Classifier: Send + Sync {
    /// Token budget of the underlying model.
    fn max_len(&self) -> usize;
    fn classify(&self, text: &str) -> anyhow::Result<Classification>;
}

/// Blocking text-to-text generation. Callers bound it with a timeout.
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Source of truth for records, owned by the serving layer.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn list_all_faqs(&self) -> anyhow::Result<Vec<FaqRecord>>;
    async fn list_all_reviews(&self) -> anyhow::Result<Vec<ReviewRecord>>;
}

/// Persistent similarity index keyed by stable document ids.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite by `stable_id`. `embeddings[i]` belongs to `documents[i]`.
    async fn upsert(&self, documents: &[IndexedDocument], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;

    /// Durability checkpoint; call after every mutating batch.
    async fn persist(&self) -> anyhow::Result<()>;

    /// Top `k` documents passing `filter`, best first, none scoring below
    /// `score_threshold`.
    async fn retrieve(
        &self,
        query_vector: &[f32],
        k: usize,
        score_threshold: f32,
        filter: &MetadataFilter,
    ) -> anyhow::Result<Vec<RetrievedDocument>>;

    async fn count(&self) -> anyhow::Result<usize>;

    async fn last_persisted(&self) -> anyhow::Result<Option<Checkpoint>> {
        Ok(None)
    }
}
