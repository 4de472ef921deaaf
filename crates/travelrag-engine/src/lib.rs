//! travelrag-engine
//!
//! The in-process facade handed to the serving layer: question answering,
//! incremental indexing hooks, review enrichment and index status.

use std::sync::Arc;

use serde::Serialize;

use travelrag_core::settings::Settings;
use travelrag_core::traits::{Embedder, RecordSource, VectorStore};
use travelrag_core::types::{Checkpoint, Enrichment};
use travelrag_core::{FaqRecord, QueryResult, Result, ReviewRecord, Role, RoleProfiles};
use travelrag_enrich::ContentEnricher;
use travelrag_llm::GenerationBackends;
use travelrag_vector::LanceVectorStore;

pub mod query;
pub mod sync;

pub use query::QueryEngine;
pub use sync::{ClassOutcome, IndexState, SyncManager, SyncReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub documents: usize,
    pub last_persisted: Option<Checkpoint>,
}

/// Everything the engine is assembled from.
pub struct Components {
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub source: Arc<dyn RecordSource>,
    pub backends: GenerationBackends,
    pub enricher: Arc<ContentEnricher>,
}

pub struct RagEngine {
    store: Arc<dyn VectorStore>,
    sync: SyncManager,
    query: QueryEngine,
    enricher: Arc<ContentEnricher>,
}

impl RagEngine {
    pub fn new(components: Components, settings: &Settings) -> Self {
        Self::with_profiles(components, settings, RoleProfiles::from_settings(&settings.retrieval))
    }

    pub fn with_profiles(components: Components, settings: &Settings, profiles: RoleProfiles) -> Self {
        let Components { store, embedder, source, backends, enricher } = components;
        let sync = SyncManager::new(store.clone(), embedder.clone(), source);
        let query = QueryEngine::new(store.clone(), embedder, profiles, backends, settings.generation.timeout());
        Self { store, sync, query, enricher }
    }

    /// Wire up the configured embedder, LanceDB table, lazily-loaded
    /// generator and the process-wide enricher.
    pub async fn open(settings: &Settings, source: Arc<dyn RecordSource>) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(travelrag_embed::get_default_embedder(&settings.models)?);
        let store = LanceVectorStore::open(&settings.data.lancedb_path(), &settings.data.table, embedder.dim()).await?;
        let components = Components {
            store: Arc::new(store),
            embedder,
            source,
            backends: GenerationBackends::lazy(&settings.models, &settings.generation),
            enricher: travelrag_enrich::shared_enricher(&settings.models, &settings.enrichment),
        };
        Ok(Self::new(components, settings))
    }

    /// Populate an empty index from the record source; no-op otherwise.
    pub async fn initialize(&self) -> Result<Option<SyncReport>> {
        self.sync.initialize().await
    }

    pub async fn query(&self, question: &str, role: Role) -> QueryResult {
        self.query.query(question, role).await
    }

    /// Creation hook for a committed FAQ. Failures are logged, not returned.
    pub async fn add_faq(&self, faq: &FaqRecord) {
        if let Err(e) = self.sync.add_faq(faq).await {
            tracing::warn!(id = faq.id, error = %e, "failed to index faq");
        }
    }

    /// Creation hook for a committed review. Failures are logged, not returned.
    pub async fn add_review(&self, review: &ReviewRecord) {
        if let Err(e) = self.sync.add_review(review).await {
            tracing::warn!(id = review.id, error = %e, "failed to index review");
        }
    }

    /// Sentiment and emotion for a review that is about to be stored.
    pub async fn enrich_review(&self, text: &str) -> Enrichment {
        let enricher = self.enricher.clone();
        let text = text.to_string();
        match tokio::task::spawn_blocking(move || enricher.enrich(&text)).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                tracing::warn!(error = %e, "enrichment task failed, using neutral");
                Enrichment::default()
            }
        }
    }

    pub async fn reload_all(&self) -> SyncReport {
        self.sync.reload_all().await
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        let unavailable = |e: anyhow::Error| travelrag_core::Error::IndexUnavailable(e.to_string());
        let documents = self.store.count().await.map_err(unavailable)?;
        let last_persisted = self.store.last_persisted().await.map_err(unavailable)?;
        Ok(IndexStatus { state: self.sync.state(), documents, last_persisted })
    }

    pub fn sync(&self) -> &SyncManager { &self.sync }

    pub fn queries(&self) -> &QueryEngine { &self.query }
}
