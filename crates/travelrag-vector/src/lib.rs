//! travelrag-vector
//!
//! Persistent similarity index over FAQ and review documents, stored in a
//! single LanceDB table keyed by stable document id.

pub mod schema;
pub mod store;
pub mod table;

pub use store::{filter_predicate, LanceVectorStore};
