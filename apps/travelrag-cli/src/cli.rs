//! Command-line surface of the `travelrag` binary.

use clap::{Parser, Subcommand, ValueEnum};

use travelrag_core::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliRole {
    Customer,
    #[value(aliases = ["owner", "property_owner"])]
    PropertyOwner,
}

impl From<CliRole> for Role {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Customer => Role::Customer,
            CliRole::PropertyOwner => Role::PropertyOwner,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "travelrag", version, about = "Offline question answering over hotel FAQs and reviews")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load every record into an empty index; no-op when already populated.
    Init,
    /// Ask a question as a customer or a property owner.
    Query {
        #[arg(long, value_enum, default_value_t = CliRole::Customer)]
        role: CliRole,
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Store a new FAQ and index it.
    AddFaq {
        #[arg(long)]
        hotel_id: Option<i64>,
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
    },
    /// Enrich, store and index a new review.
    AddReview {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        hotel_id: i64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
        content: String,
    },
    /// Re-embed every record regardless of index state.
    Reindex,
    /// Index state, document count and last checkpoint.
    Status {
        #[arg(long)]
        json: bool,
    },
}
