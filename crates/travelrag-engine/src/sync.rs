//! Keeps the vector index in step with the record source.
//!
//! A full reload runs at most once at startup (when the index is empty) or on
//! operator request; after that the index only grows through single-record
//! upserts pushed by the serving layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;

use travelrag_core::traits::{Embedder, RecordSource, VectorStore};
use travelrag_core::{Error, FaqRecord, IndexedDocument, Result, ReviewRecord, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Uninitialized,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassOutcome {
    Indexed(usize),
    Failed(String),
}

impl ClassOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ClassOutcome::Indexed(_))
    }
}

/// Result of a full reload, one outcome per content class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub faqs: ClassOutcome,
    pub reviews: ClassOutcome,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.faqs.is_ok() && self.reviews.is_ok()
    }

    pub fn indexed(&self) -> usize {
        [&self.faqs, &self.reviews]
            .into_iter()
            .map(|o| match o {
                ClassOutcome::Indexed(n) => *n,
                ClassOutcome::Failed(_) => 0,
            })
            .sum()
    }

    /// The first failed class as a [`Error::PartialLoad`].
    pub fn into_result(self) -> Result<usize> {
        let indexed = self.indexed();
        for (kind, outcome) in [(SourceKind::Faq, self.faqs), (SourceKind::Review, self.reviews)] {
            if let ClassOutcome::Failed(reason) = outcome {
                return Err(Error::PartialLoad { failed: kind, reason });
            }
        }
        Ok(indexed)
    }
}

/// Embed on the blocking pool; the model holds the CPU for the whole batch.
pub(crate) async fn embed_texts(embedder: &Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    let embedder = embedder.clone();
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| Error::Embedding(e.to_string()))?
        .map_err(|e| Error::Embedding(e.to_string()))
}

pub struct SyncManager {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    source: Arc<dyn RecordSource>,
    loaded: AtomicBool,
    // serializes every index mutation
    writer: Mutex<()>,
}

impl SyncManager {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, source: Arc<dyn RecordSource>) -> Self {
        Self { store, embedder, source, loaded: AtomicBool::new(false), writer: Mutex::new(()) }
    }

    pub fn state(&self) -> IndexState {
        if self.loaded.load(Ordering::Acquire) {
            IndexState::Loaded
        } else {
            IndexState::Uninitialized
        }
    }

    /// Load everything once if the index is empty. Returns `None` when the
    /// store already had documents and the reload was skipped.
    pub async fn initialize(&self) -> Result<Option<SyncReport>> {
        let _guard = self.writer.lock().await;
        let existing = self.store.count().await.map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        if existing > 0 {
            tracing::info!(documents = existing, "index already populated, skipping initial load");
            self.loaded.store(true, Ordering::Release);
            return Ok(None);
        }
        Ok(Some(self.reload_locked().await))
    }

    /// Unconditional resync of both content classes. A failure in one class
    /// does not stop the other.
    pub async fn reload_all(&self) -> SyncReport {
        let _guard = self.writer.lock().await;
        self.reload_locked().await
    }

    async fn reload_locked(&self) -> SyncReport {
        let start = Instant::now();
        let faqs = self.load_class(SourceKind::Faq).await;
        let reviews = self.load_class(SourceKind::Review).await;
        let report = SyncReport { faqs: outcome(SourceKind::Faq, faqs), reviews: outcome(SourceKind::Review, reviews) };
        if report.faqs.is_ok() || report.reviews.is_ok() {
            self.loaded.store(true, Ordering::Release);
        }
        tracing::info!(
            indexed = report.indexed(),
            complete = report.is_complete(),
            ms = start.elapsed().as_millis() as u64,
            "reload finished"
        );
        report
    }

    async fn list_documents(&self, kind: SourceKind) -> Result<Vec<IndexedDocument>> {
        let listed: anyhow::Result<Vec<IndexedDocument>> = match kind {
            SourceKind::Faq => self.source.list_all_faqs().await.map(|rs| rs.iter().map(IndexedDocument::from_faq).collect()),
            SourceKind::Review => {
                self.source.list_all_reviews().await.map(|rs| rs.iter().map(IndexedDocument::from_review).collect())
            }
        };
        listed.map_err(|e| Error::SourceUnavailable(e.to_string()))
    }

    async fn load_class(&self, kind: SourceKind) -> Result<usize> {
        let documents = self.list_documents(kind).await?;
        self.upsert_persisted(&documents).await?;
        tracing::debug!(source = %kind, documents = documents.len(), "class loaded");
        Ok(documents.len())
    }

    async fn upsert_persisted(&self, documents: &[IndexedDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let texts = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = embed_texts(&self.embedder, texts).await?;
        self.store.upsert(documents, &embeddings).await.map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        self.store.persist().await.map_err(|e| Error::IndexUnavailable(e.to_string()))
    }

    /// Upsert one document by its stable id and persist. Never reloads.
    pub async fn add_single(&self, document: IndexedDocument) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.upsert_persisted(std::slice::from_ref(&document)).await?;
        tracing::debug!(id = %document.stable_id, "document indexed");
        Ok(())
    }

    pub async fn add_faq(&self, faq: &FaqRecord) -> Result<()> {
        self.add_single(IndexedDocument::from_faq(faq)).await
    }

    pub async fn add_review(&self, review: &ReviewRecord) -> Result<()> {
        self.add_single(IndexedDocument::from_review(review)).await
    }
}

fn outcome(kind: SourceKind, result: Result<usize>) -> ClassOutcome {
    match result {
        Ok(n) => ClassOutcome::Indexed(n),
        Err(e) => {
            tracing::warn!(source = %kind, error = %e, "class failed to load");
            ClassOutcome::Failed(e.to_string())
        }
    }
}
