//! Agent memory: conversation history plus an entity store keyed by term.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Memory owned by a single agent.
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    history: Vec<MemoryEntry>,
    /// Normalized term -> facts recorded about it, oldest first
    entities: BTreeMap<String, Vec<String>>,
}

/// Terms compare after NFKC normalization, trimming and lowercasing.
fn normalize_term(term: &str) -> String {
    term.nfkc().collect::<String>().trim().to_lowercase()
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.history.push(MemoryEntry {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn history(&self) -> &[MemoryEntry] {
        &self.history
    }

    /// Record a fact about a term.
    pub fn remember(&mut self, term: &str, fact: impl Into<String>) {
        self.entities
            .entry(normalize_term(term))
            .or_default()
            .push(fact.into());
    }

    pub fn facts(&self, term: &str) -> Option<&[String]> {
        self.entities.get(&normalize_term(term)).map(Vec::as_slice)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Drop everything known about a term. Returns whether the term was present.
    pub fn forget(&mut self, term: &str) -> bool {
        self.entities.remove(&normalize_term(term)).is_some()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.entities.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.entities.is_empty()
    }
}
