use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tempfile::TempDir;

use travelrag_core::prompt::NO_CONTEXT_SENTINEL;
use travelrag_core::settings::Settings;
use travelrag_core::traits::{Classifier, Embedder, Generator, RecordSource, VectorStore};
use travelrag_core::types::Classification;
use travelrag_core::{
    Error, FaqRecord, IndexedDocument, MetadataFilter, QueryResult, RetrievedDocument, ReviewRecord, Role,
    RoleProfiles, Sentiment, SourceKind, SourceRef,
};
use travelrag_embed::{HashingEmbedder, DEFAULT_DIM};
use travelrag_engine::{ClassOutcome, Components, IndexState, QueryEngine, RagEngine};
use travelrag_enrich::ContentEnricher;
use travelrag_llm::GenerationBackends;
use travelrag_vector::LanceVectorStore;

#[derive(Default)]
struct MemorySource {
    faqs: Mutex<Vec<FaqRecord>>,
    reviews: Mutex<Vec<ReviewRecord>>,
    fail_reviews: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn list_all_faqs(&self) -> anyhow::Result<Vec<FaqRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faqs.lock().expect("lock").clone())
    }

    async fn list_all_reviews(&self) -> anyhow::Result<Vec<ReviewRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reviews {
            return Err(anyhow!("reviews table locked"));
        }
        Ok(self.reviews.lock().expect("lock").clone())
    }
}

struct BrokenStore;

#[async_trait]
impl VectorStore for BrokenStore {
    async fn upsert(&self, _documents: &[IndexedDocument], _embeddings: &[Vec<f32>]) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }

    async fn persist(&self) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }

    async fn retrieve(
        &self,
        _query_vector: &[f32],
        _k: usize,
        _score_threshold: f32,
        _filter: &MetadataFilter,
    ) -> anyhow::Result<Vec<RetrievedDocument>> {
        Err(anyhow!("table missing"))
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Err(anyhow!("table missing"))
    }
}

#[derive(Default)]
struct Recording {
    prompts: Mutex<Vec<String>>,
}

impl Generator for Recording {
    fn name(&self) -> &str { "recording" }
    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        Ok("Checkout is at 3 PM.".to_string())
    }
}

struct Failing;

impl Generator for Failing {
    fn name(&self) -> &str { "failing" }
    fn generate(&self, _prompt: &str) -> anyhow::Result<String> { Err(anyhow!("out of memory")) }
}

struct Slow;

impl Generator for Slow {
    fn name(&self) -> &str { "slow" }
    fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        std::thread::sleep(Duration::from_millis(800));
        Ok("too late".into())
    }
}

/// Holds one lock across calls like a shared model; only the first call is slow.
#[derive(Default)]
struct SlowFirstCall {
    model: Mutex<usize>,
}

impl Generator for SlowFirstCall {
    fn name(&self) -> &str { "slow-first" }
    fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        let mut calls = self.model.lock().map_err(|_| anyhow!("poisoned"))?;
        *calls += 1;
        if *calls == 1 {
            std::thread::sleep(Duration::from_millis(400));
        }
        Ok(format!("answer {}", *calls))
    }
}

struct FixedLabel(&'static str, f32);

impl Classifier for FixedLabel {
    fn max_len(&self) -> usize { 512 }
    fn classify(&self, _text: &str) -> anyhow::Result<Classification> {
        Ok(Classification { label: self.0.into(), score: self.1 })
    }
}

struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn max_len(&self) -> usize { 512 }
    fn classify(&self, _text: &str) -> anyhow::Result<Classification> { Err(anyhow!("no weights")) }
}

fn checkout_faq() -> FaqRecord {
    FaqRecord { id: 1, hotel_id: Some(5), question: "What time is checkout?".into(), answer: "3 PM".into() }
}

fn pool_review(id: i64, content: &str) -> ReviewRecord {
    ReviewRecord {
        id,
        user_id: 2,
        hotel_id: 5,
        content: content.into(),
        sentiment: Sentiment::Neutral,
        emotion: "neutral".into(),
        rating: Some(4),
    }
}

fn seeded_source() -> MemorySource {
    let source = MemorySource::default();
    source.faqs.lock().expect("lock").push(checkout_faq());
    source.reviews.lock().expect("lock").push(pool_review(1, "Great pool but slow checkout"));
    source
}

fn settings(threshold: f32) -> Settings {
    let mut s = Settings::default();
    s.retrieval.score_threshold = threshold;
    s
}

struct Harness {
    _tmp: TempDir,
    store: Arc<LanceVectorStore>,
    source: Arc<MemorySource>,
    engine: RagEngine,
}

fn components(store: Arc<dyn VectorStore>, source: Arc<MemorySource>, generator: Arc<dyn Generator>) -> Components {
    Components {
        store,
        embedder: Arc::new(HashingEmbedder::new(DEFAULT_DIM)),
        source,
        backends: GenerationBackends::single(generator),
        enricher: Arc::new(ContentEnricher::new(
            Arc::new(FixedLabel("POSITIVE", 0.95)),
            Arc::new(FixedLabel("Joy", 0.9)),
            Default::default(),
        )),
    }
}

async fn harness_with(source: MemorySource, generator: Arc<dyn Generator>, threshold: f32) -> Harness {
    let tmp = TempDir::new().expect("tmp");
    let store = Arc::new(LanceVectorStore::open(tmp.path(), "travel_data", DEFAULT_DIM).await.expect("store"));
    let source = Arc::new(source);
    let engine = RagEngine::new(components(store.clone(), source.clone(), generator), &settings(threshold));
    Harness { _tmp: tmp, store, source, engine }
}

async fn snapshot(store: &LanceVectorStore) -> BTreeSet<(String, String)> {
    let q = HashingEmbedder::new(DEFAULT_DIM).embed_batch(&["pool checkout".to_string()]).expect("embed").remove(0);
    store
        .retrieve(&q, 100, 0.0, &MetadataFilter::none())
        .await
        .expect("retrieve")
        .into_iter()
        .map(|d| (d.id, d.text))
        .collect()
}

#[tokio::test]
async fn reload_is_idempotent() {
    let h = harness_with(seeded_source(), Arc::new(Recording::default()), 0.1).await;
    let first = h.engine.reload_all().await;
    assert!(first.is_complete());
    assert_eq!(first.indexed(), 2);
    let before = snapshot(&h.store).await;

    let second = h.engine.reload_all().await;
    assert_eq!(second, first);
    assert_eq!(snapshot(&h.store).await, before);
    assert_eq!(h.store.count().await.expect("count"), 2);
    let ids: Vec<_> = before.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["faq_1", "review_1"]);
}

#[tokio::test]
async fn add_review_uses_deterministic_id_and_overwrites() {
    let h = harness_with(MemorySource::default(), Arc::new(Recording::default()), 0.1).await;
    h.engine.add_review(&pool_review(7, "Tiny pool")).await;
    h.engine.add_review(&pool_review(7, "Tiny pool, but heated")).await;

    let docs = snapshot(&h.store).await;
    assert_eq!(docs.len(), 1);
    let (id, text) = docs.iter().next().expect("one doc");
    assert_eq!(id, "review_7");
    assert!(text.contains("heated"));
    // incremental adds never reload from the source
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn owner_queries_only_see_reviews() {
    let h = harness_with(seeded_source(), Arc::new(Recording::default()), 0.0).await;
    h.engine.reload_all().await;
    h.engine.add_faq(&FaqRecord { id: 2, hotel_id: Some(5), question: "Is the pool heated?".into(), answer: "Yes".into() }).await;

    let result = h.engine.query("How is the pool?", Role::PropertyOwner).await;
    assert!(!result.is_fallback());
    assert!(!result.sources.is_empty());
    assert!(result.sources.iter().all(|s| s.source == SourceKind::Review));

    let customer = h.engine.query("How is the pool?", Role::Customer).await;
    assert!(customer.sources.iter().any(|s| s.source == SourceKind::Faq));
}

#[tokio::test]
async fn customer_question_finds_the_checkout_faq() {
    let generator = Arc::new(Recording::default());
    let h = harness_with(seeded_source(), generator.clone(), 0.1).await;
    let report = h.engine.initialize().await.expect("init").expect("loaded");
    assert!(report.is_complete());

    let result = h.engine.query("When can I check out?", Role::Customer).await;
    assert_eq!(result.answer, "Checkout is at 3 PM.");
    assert!(result.sources.contains(&SourceRef { source: SourceKind::Faq, db_id: 1 }));

    let prompts = generator.prompts.lock().expect("lock");
    assert!(prompts[0].contains("Question: What time is checkout?\nAnswer: 3 PM"));
    assert!(prompts[0].contains("When can I check out?"));
}

#[tokio::test]
async fn failing_generator_returns_fallback() {
    let h = harness_with(seeded_source(), Arc::new(Failing), 0.1).await;
    h.engine.reload_all().await;
    let result = h.engine.query("When can I check out?", Role::Customer).await;
    assert_eq!(result, QueryResult::fallback());
    assert_eq!(result.answer, "I'm sorry, I couldn't process your question right now. Please try again later.");
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn slow_generator_times_out_to_fallback() {
    let tmp = TempDir::new().expect("tmp");
    let store = Arc::new(LanceVectorStore::open(tmp.path(), "travel_data", DEFAULT_DIM).await.expect("store"));
    let engine = QueryEngine::new(
        store,
        Arc::new(HashingEmbedder::new(DEFAULT_DIM)),
        RoleProfiles::default(),
        GenerationBackends::single(Arc::new(Slow)),
        Duration::from_millis(100),
    );
    assert!(matches!(
        engine.try_query("Anything?", Role::Customer).await,
        Err(Error::GenerationTimeout(_))
    ));
    assert!(engine.query("Anything?", Role::Customer).await.is_fallback());
}

#[tokio::test]
async fn empty_question_returns_fallback() {
    let generator = Arc::new(Recording::default());
    let h = harness_with(seeded_source(), generator.clone(), 0.1).await;
    assert!(h.engine.query("   ", Role::Customer).await.is_fallback());
    assert!(generator.prompts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn empty_retrieval_sends_the_sentinel_context() {
    let generator = Arc::new(Recording::default());
    let h = harness_with(MemorySource::default(), generator.clone(), 0.1).await;
    let result = h.engine.query("How is the pool?", Role::PropertyOwner).await;
    assert!(result.sources.is_empty());
    assert!(!result.is_fallback());
    let prompts = generator.prompts.lock().expect("lock");
    assert!(prompts[0].contains(NO_CONTEXT_SENTINEL));
}

#[tokio::test]
async fn initialize_skips_a_populated_index() {
    let h = harness_with(seeded_source(), Arc::new(Recording::default()), 0.1).await;
    assert_eq!(h.engine.status().await.expect("status").state, IndexState::Uninitialized);
    h.engine.add_faq(&checkout_faq()).await;

    assert!(h.engine.initialize().await.expect("init").is_none());
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 0);
    let status = h.engine.status().await.expect("status");
    assert_eq!(status.state, IndexState::Loaded);
    assert_eq!(status.documents, 1);
    assert!(status.last_persisted.is_some());
}

#[tokio::test]
async fn one_failing_class_does_not_block_the_other() {
    let source = MemorySource { fail_reviews: true, ..seeded_source() };
    let h = harness_with(source, Arc::new(Recording::default()), 0.1).await;
    let report = h.engine.reload_all().await;
    assert_eq!(report.faqs, ClassOutcome::Indexed(1));
    assert!(matches!(report.reviews, ClassOutcome::Failed(_)));
    assert_eq!(h.store.count().await.expect("count"), 1);
    assert_eq!(h.engine.status().await.expect("status").state, IndexState::Loaded);
    assert!(matches!(report.into_result(), Err(Error::PartialLoad { failed: SourceKind::Review, .. })));
}

#[tokio::test]
async fn enrichment_uses_classifiers_and_fails_open() {
    let h = harness_with(MemorySource::default(), Arc::new(Recording::default()), 0.1).await;
    let e = h.engine.enrich_review("Loved it").await;
    assert_eq!(e.sentiment, Sentiment::Positive);
    assert_eq!(e.emotion, "joy");

    let broken = ContentEnricher::new(Arc::new(BrokenClassifier), Arc::new(BrokenClassifier), Default::default());
    let e = broken.enrich("The room was dirty");
    assert_eq!(e.sentiment, Sentiment::Neutral);
    assert_eq!(e.emotion, "neutral");
}

#[tokio::test]
async fn unreachable_store_degrades_every_entry_point() {
    let generator = Arc::new(Recording::default());
    let source = Arc::new(seeded_source());
    let engine = RagEngine::new(components(Arc::new(BrokenStore), source, generator.clone()), &settings(0.1));

    let result = engine.query("When can I check out?", Role::Customer).await;
    assert_eq!(result, QueryResult::fallback());
    assert!(generator.prompts.lock().expect("lock").is_empty());

    // creation hooks swallow the failure
    engine.add_faq(&checkout_faq()).await;
    engine.add_review(&pool_review(7, "Tiny pool")).await;
    assert!(matches!(engine.sync().add_faq(&checkout_faq()).await, Err(Error::IndexUnavailable(_))));

    assert!(matches!(engine.initialize().await, Err(Error::IndexUnavailable(_))));
    assert!(matches!(engine.status().await, Err(Error::IndexUnavailable(_))));
    let report = engine.reload_all().await;
    assert!(matches!(report.faqs, ClassOutcome::Failed(_)));
    assert!(matches!(report.reviews, ClassOutcome::Failed(_)));
    assert_eq!(engine.sync().state(), IndexState::Uninitialized);
}

#[tokio::test]
async fn concurrent_reload_and_add_do_not_interleave() {
    let h = harness_with(seeded_source(), Arc::new(Recording::default()), 0.1).await;
    let late = pool_review(7, "Pool closed for repairs");
    let (report, ()) = tokio::join!(h.engine.reload_all(), h.engine.add_review(&late));
    assert!(report.is_complete());

    assert_eq!(h.store.count().await.expect("count"), 3);
    let docs = snapshot(&h.store).await;
    assert_eq!(docs.iter().filter(|(id, _)| id == "review_7").count(), 1);
    let ids: Vec<_> = docs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["faq_1", "review_1", "review_7"]);
}

#[tokio::test]
async fn a_timed_out_generation_delays_later_queries_until_it_finishes() {
    let tmp = TempDir::new().expect("tmp");
    let store = Arc::new(LanceVectorStore::open(tmp.path(), "travel_data", DEFAULT_DIM).await.expect("store"));
    let engine = QueryEngine::new(
        store,
        Arc::new(HashingEmbedder::new(DEFAULT_DIM)),
        RoleProfiles::default(),
        GenerationBackends::single(Arc::new(SlowFirstCall::default())),
        Duration::from_millis(100),
    );
    assert!(engine.query("First?", Role::Customer).await.is_fallback());
    // the abandoned call still holds the model, so a fast call queues and times out too
    assert!(matches!(engine.try_query("Second?", Role::PropertyOwner).await, Err(Error::GenerationTimeout(_))));

    tokio::time::sleep(Duration::from_millis(600)).await;
    let recovered = engine.query("Third?", Role::Customer).await;
    assert!(!recovered.is_fallback());
    assert_eq!(recovered.answer, "answer 3");
}
