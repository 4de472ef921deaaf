//! Rendering of source records into indexable documents.

use crate::types::{DocumentMetadata, FaqRecord, IndexedDocument, ReviewRecord, SourceKind};

impl IndexedDocument {
    pub fn from_faq(faq: &FaqRecord) -> Self {
        Self {
            stable_id: SourceKind::Faq.stable_id(faq.id),
            text: format!("Question: {}\nAnswer: {}", faq.question.trim(), faq.answer.trim()),
            metadata: DocumentMetadata { source: SourceKind::Faq, db_id: faq.id, hotel_id: faq.hotel_id },
        }
    }

    pub fn from_review(review: &ReviewRecord) -> Self {
        let mut text = format!(
            "Review: {}\nSentiment: {}\nEmotion: {}",
            review.content.trim(),
            review.sentiment,
            review.emotion
        );
        if let Some(rating) = review.rating {
            text.push_str(&format!("\nRating: {rating}/5"));
        }
        Self {
            stable_id: SourceKind::Review.stable_id(review.id),
            text,
            metadata: DocumentMetadata {
                source: SourceKind::Review,
                db_id: review.id,
                hotel_id: Some(review.hotel_id),
            },
        }
    }
}

impl From<&FaqRecord> for IndexedDocument {
    fn from(faq: &FaqRecord) -> Self {
        Self::from_faq(faq)
    }
}

impl From<&ReviewRecord> for IndexedDocument {
    fn from(review: &ReviewRecord) -> Self {
        Self::from_review(review)
    }
}
