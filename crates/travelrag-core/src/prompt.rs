//! Role-specific prompt templates and context formatting.
//!
//! A template is plain text with exactly two placeholders, `{context}` and
//! `{question}`. Rendering is single-pass, so braces inside the substituted
//! values are never re-expanded.

use crate::error::{Error, Result};

/// Context given to the model when retrieval returned nothing.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant documents found.";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

const OWNER_ANALYSIS: &str = "Analyze this travel business query from a property owner.
Use only the provided context to answer:

Context: {context}

Question: {question}

Answer:";

const CUSTOMER_ASSISTANT: &str = "You're a friendly travel assistant. Answer the customer's question
using only this context:

Context: {context}

Question: {question}

Helpful Answer:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    body: String,
}

impl PromptTemplate {
    /// Build a custom template. Both placeholders must be present.
    pub fn new(body: impl Into<String>) -> Result<Self> {
        let body = body.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !body.contains(slot) {
                return Err(Error::InvalidConfig(format!("prompt template is missing {slot}")));
            }
        }
        Ok(Self { body })
    }

    pub fn owner_analysis() -> Self {
        Self { body: OWNER_ANALYSIS.to_string() }
    }

    pub fn customer_assistant() -> Self {
        Self { body: CUSTOMER_ASSISTANT.to_string() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.body.len() + context.len() + question.len());
        let mut rest = self.body.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Newline-joined retrieved texts, or [`NO_CONTEXT_SENTINEL`] when empty.
pub fn format_context<'a, I>(texts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = texts
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if joined.is_empty() { NO_CONTEXT_SENTINEL.to_string() } else { joined }
}
