use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use travelrag_core::traits::RecordSource;
use travelrag_core::types::Enrichment;
use travelrag_core::{FaqRecord, ReviewRecord};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    faqs: Vec<FaqRecord>,
    #[serde(default)]
    reviews: Vec<ReviewRecord>,
}

/// Records kept in one JSON file: `{"faqs": [...], "reviews": [...]}`.
pub struct JsonRecordStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

pub struct NewReview {
    pub user_id: i64,
    pub hotel_id: i64,
    pub content: String,
    pub rating: Option<u8>,
}

impl JsonRecordStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub async fn open(path: &Path) -> Result<Self> {
        let snapshot = match tokio::fs::read_to_string(path).await {
            Ok(raw) => serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        Ok(Self { path: path.to_path_buf(), snapshot: RwLock::new(snapshot) })
    }

    pub fn path(&self) -> &Path { &self.path }

    async fn commit(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
        tokio::fs::rename(&tmp, &self.path).await.with_context(|| format!("Failed to write {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            faqs = snapshot.faqs.len(),
            reviews = snapshot.reviews.len(),
            "records committed"
        );
        Ok(())
    }

    /// Assign the next id and durably store the FAQ.
    pub async fn insert_faq(&self, hotel_id: Option<i64>, question: String, answer: String) -> Result<FaqRecord> {
        let mut snapshot = self.snapshot.write().await;
        let id = snapshot.faqs.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        let faq = FaqRecord { id, hotel_id, question, answer };
        let mut next = snapshot.clone();
        next.faqs.push(faq.clone());
        self.commit(&next).await?;
        *snapshot = next;
        Ok(faq)
    }

    /// Assign the next id and durably store the review with its enrichment.
    pub async fn insert_review(&self, review: NewReview, enrichment: Enrichment) -> Result<ReviewRecord> {
        let mut snapshot = self.snapshot.write().await;
        let id = snapshot.reviews.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = ReviewRecord {
            id,
            user_id: review.user_id,
            hotel_id: review.hotel_id,
            content: review.content,
            sentiment: enrichment.sentiment,
            emotion: enrichment.emotion,
            rating: review.rating,
        };
        let mut next = snapshot.clone();
        next.reviews.push(record.clone());
        self.commit(&next).await?;
        *snapshot = next;
        Ok(record)
    }
}

#[async_trait]
impl RecordSource for JsonRecordStore {
    async fn list_all_faqs(&self) -> Result<Vec<FaqRecord>> {
        Ok(self.snapshot.read().await.faqs.clone())
    }

    async fn list_all_reviews(&self) -> Result<Vec<ReviewRecord>> {
        Ok(self.snapshot.read().await.reviews.clone())
    }
}
