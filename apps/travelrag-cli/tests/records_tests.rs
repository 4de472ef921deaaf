use travelrag_cli::{JsonRecordStore, NewReview};
use travelrag_core::traits::RecordSource;
use travelrag_core::types::Enrichment;
use travelrag_core::Sentiment;

#[tokio::test]
async fn missing_file_starts_empty() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let store = JsonRecordStore::open(&tmp.path().join("records.json")).await.expect("open");
    assert!(store.list_all_faqs().await.expect("faqs").is_empty());
    assert!(store.list_all_reviews().await.expect("reviews").is_empty());
}

#[tokio::test]
async fn inserts_assign_next_id_and_survive_reopen() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let path = tmp.path().join("data/records.json");
    {
        let store = JsonRecordStore::open(&path).await.expect("open");
        let a = store.insert_faq(Some(5), "What time is checkout?".into(), "3 PM".into()).await.expect("faq");
        let b = store.insert_faq(None, "Pets?".into(), "No".into()).await.expect("faq");
        assert_eq!((a.id, b.id), (1, 2));
        let enrichment = Enrichment { sentiment: Sentiment::Positive, emotion: "joy".into() };
        let r = store
            .insert_review(NewReview { user_id: 3, hotel_id: 5, content: "Great pool".into(), rating: Some(5) }, enrichment)
            .await
            .expect("review");
        assert_eq!(r.id, 1);
        assert_eq!(r.sentiment, Sentiment::Positive);
    }
    let reopened = JsonRecordStore::open(&path).await.expect("reopen");
    let faqs = reopened.list_all_faqs().await.expect("faqs");
    assert_eq!(faqs.len(), 2);
    assert_eq!(faqs[1].question, "Pets?");
    let reviews = reopened.list_all_reviews().await.expect("reviews");
    assert_eq!(reviews[0].emotion, "joy");
    assert_eq!(reviews[0].rating, Some(5));
}

#[tokio::test]
async fn reviews_without_enrichment_fields_parse_as_neutral() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let path = tmp.path().join("records.json");
    std::fs::write(&path, r#"{"reviews":[{"id":4,"user_id":1,"hotel_id":2,"content":"fine"}]}"#).expect("write");
    let store = JsonRecordStore::open(&path).await.expect("open");
    let reviews = store.list_all_reviews().await.expect("reviews");
    assert_eq!(reviews[0].sentiment, Sentiment::Neutral);
    assert_eq!(reviews[0].emotion, "neutral");
    assert!(store.list_all_faqs().await.expect("faqs").is_empty());
}
