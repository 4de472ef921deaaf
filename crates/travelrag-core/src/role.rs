//! Requester roles and the single role → policy table.
//!
//! Retrieval scope, prompt framing and generation determinism are all read
//! from one [`RoleProfile`] per role; nothing else in the workspace branches
//! on [`Role`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::prompt::PromptTemplate;
use crate::settings::RetrievalSettings;
use crate::types::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    PropertyOwner,
}

impl Role {
    /// Map a role name from the serving layer. Anything that is not an
    /// owner is treated as a customer.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "property_owner" | "owner" => Role::PropertyOwner,
            _ => Role::Customer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::PropertyOwner => "property_owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-match metadata predicate, applied by the store before ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub source: Option<SourceKind>,
    pub hotel_id: Option<i64>,
}

impl MetadataFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn source(kind: SourceKind) -> Self {
        Self { source: Some(kind), hotel_id: None }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.hotel_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub k: usize,
    pub filter: MetadataFilter,
    pub score_threshold: f32,
}

/// Which generation configuration answers for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    /// Greedy decoding; identical prompts give identical answers.
    Deterministic,
    /// Temperature sampling.
    Stochastic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfile {
    pub retrieval: RetrievalPolicy,
    pub template: PromptTemplate,
    pub mode: GenerationMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleProfiles {
    customer: RoleProfile,
    owner: RoleProfile,
}

impl RoleProfiles {
    /// Owners analyse accumulated guest feedback, so they only ever see
    /// review documents and get reproducible answers. Customers search
    /// everything and get a conversational answer.
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        let owner = RoleProfile {
            retrieval: RetrievalPolicy {
                k: settings.owner_k,
                filter: MetadataFilter::source(SourceKind::Review),
                score_threshold: settings.score_threshold,
            },
            template: PromptTemplate::owner_analysis(),
            mode: GenerationMode::Deterministic,
        };
        let customer = RoleProfile {
            retrieval: RetrievalPolicy {
                k: settings.customer_k,
                filter: MetadataFilter::none(),
                score_threshold: settings.score_threshold,
            },
            template: PromptTemplate::customer_assistant(),
            mode: GenerationMode::Stochastic,
        };
        Self { customer, owner }
    }

    pub fn for_role(&self, role: Role) -> &RoleProfile {
        match role {
            Role::Customer => &self.customer,
            Role::PropertyOwner => &self.owner,
        }
    }

    fn slot(&mut self, role: Role) -> &mut RoleProfile {
        match role {
            Role::Customer => &mut self.customer,
            Role::PropertyOwner => &mut self.owner,
        }
    }

    #[must_use]
    pub fn with_template(mut self, role: Role, template: PromptTemplate) -> Self {
        self.slot(role).template = template;
        self
    }

    #[must_use]
    pub fn with_retrieval(mut self, role: Role, retrieval: RetrievalPolicy) -> Self {
        self.slot(role).retrieval = retrieval;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, role: Role, mode: GenerationMode) -> Self {
        self.slot(role).mode = mode;
        self
    }
}

impl Default for RoleProfiles {
    fn default() -> Self {
        Self::from_settings(&RetrievalSettings::default())
    }
}
