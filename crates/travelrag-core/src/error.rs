use std::time::Duration;

use thiserror::Error;

use crate::types::SourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Record source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Partial load: {failed} records were not indexed: {reason}")]
    PartialLoad { failed: SourceKind, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
