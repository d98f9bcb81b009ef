//! # strophe-retrieval
//!
//! The retrieval-service boundary. Two named collections are consumed:
//! a domain-knowledge collection (prosody corpus) and a user-preference
//! memory collection. Search results are read-only evidence; the only
//! write path is appending new preference records from the memory-update
//! stage — nothing here ever deletes from a collection.

#![allow(dead_code)]

mod http;
mod memory;

pub use http::HttpRetriever;
pub use memory::InMemoryRetriever;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strophe_core::Result;

/// One retrieval hit: document text plus its metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub document: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Hit {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The item type tag used by pack builders (taboo / exemplar / taste)
    pub fn item_type(&self) -> Option<&str> {
        self.metadata.get("type").map(String::as_str)
    }
}

/// A preference record appended to the memory collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// "taste" or "taboo"
    pub item_type: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryItem {
    pub fn taste(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            item_type: "taste".to_string(),
            text: text.into(),
            tags: vec![tag.into()],
        }
    }

    pub fn taboo(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            item_type: "taboo".to_string(),
            text: text.into(),
            tags: vec![tag.into()],
        }
    }
}

/// Injected retrieval capability
///
/// One long-lived connection per process, passed into the engine at
/// construction — never opened inside a stage function.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ordered similarity search over a named collection
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Hit>>;

    /// Append preference records to a collection (memory-update only)
    async fn append(&self, collection: &str, items: &[MemoryItem]) -> Result<()>;
}
