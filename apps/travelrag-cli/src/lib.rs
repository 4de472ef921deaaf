//! Operator tooling around the engine. The JSON record store stands in for
//! the relational database that owns FAQs and reviews in a deployment.

pub mod cli;
pub mod records;

pub use records::{JsonRecordStore, NewReview};
