//! Question answering: retrieve by role, compose the prompt, generate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use travelrag_core::prompt::format_context;
use travelrag_core::traits::{Embedder, VectorStore};
use travelrag_core::{Error, QueryResult, Result, Role, RoleProfiles};
use travelrag_llm::GenerationBackends;

use crate::sync::embed_texts;

pub struct QueryEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    profiles: RoleProfiles,
    backends: GenerationBackends,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        profiles: RoleProfiles,
        backends: GenerationBackends,
        timeout: Duration,
    ) -> Self {
        Self { store, embedder, profiles, backends, timeout }
    }

    pub fn profiles(&self) -> &RoleProfiles { &self.profiles }

    /// Answer `question` for `role`. Any internal failure yields
    /// [`QueryResult::fallback`].
    pub async fn query(&self, question: &str, role: Role) -> QueryResult {
        match self.try_query(question, role).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%role, error = %e, "query failed, returning fallback answer");
                QueryResult::fallback()
            }
        }
    }

    pub async fn try_query(&self, question: &str, role: Role) -> Result<QueryResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuery("question is empty".into()));
        }
        let start = Instant::now();
        let profile = self.profiles.for_role(role);
        let policy = &profile.retrieval;

        let query_vector = embed_texts(&self.embedder, vec![question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("embedder returned no vector".into()))?;
        let hits = self
            .store
            .retrieve(&query_vector, policy.k, policy.score_threshold, &policy.filter)
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;
        tracing::debug!(%role, hits = hits.len(), k = policy.k, "retrieved");

        let context = format_context(hits.iter().map(|h| h.text.as_str()));
        let prompt = profile.template.render(&context, question);
        let answer = self.generate(profile.mode, prompt).await?;

        tracing::debug!(%role, ms = start.elapsed().as_millis() as u64, "query answered");
        Ok(QueryResult { answer, sources: hits.iter().map(|h| h.source_ref()).collect() })
    }

    async fn generate(&self, mode: travelrag_core::GenerationMode, prompt: String) -> Result<String> {
        let generator = self.backends.for_mode(mode);
        // a timed-out task keeps running on the blocking pool until it returns
        let task = tokio::task::spawn_blocking(move || generator.generate(&prompt));
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(Error::GenerationTimeout(self.timeout)),
            Ok(Err(join)) => Err(Error::Generation(join.to_string())),
            Ok(Ok(Err(e))) => Err(Error::Generation(e.to_string())),
            Ok(Ok(Ok(answer))) => Ok(answer),
        }
    }
}
