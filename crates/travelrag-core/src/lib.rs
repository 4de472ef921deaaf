//! travelrag-core
//!
//! Shared vocabulary for the question-answering engine: record and document
//! types, the role policy table, prompt templates, the seams implemented by
//! the embedder/store/generator crates, configuration and errors.

pub mod config;
pub mod documents;
pub mod error;
pub mod prompt;
pub mod role;
pub mod settings;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use role::{GenerationMode, MetadataFilter, RetrievalPolicy, Role, RoleProfile, RoleProfiles};
pub use types::{
    FaqRecord, IndexedDocument, QueryResult, RetrievedDocument, ReviewRecord, Sentiment, SourceKind,
    SourceRef,
};
