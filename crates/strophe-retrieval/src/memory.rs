//! In-memory retriever for tests
//!
//! Ranks by naive token overlap between query and document; good enough
//! to exercise pack building without a live vector store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strophe_core::{Result, StropheError};

use crate::{Hit, MemoryItem, Retriever};

/// Test double backed by per-collection document lists
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    collections: Arc<Mutex<HashMap<String, Vec<Hit>>>>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with hits
    pub fn with_collection(self, name: &str, hits: Vec<Hit>) -> Self {
        self.collections
            .lock()
            .expect("collections lock")
            .insert(name.to_string(), hits);
        self
    }

    /// Documents currently in a collection (appended records included)
    pub fn documents(&self, name: &str) -> Vec<Hit> {
        self.collections
            .lock()
            .expect("collections lock")
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn overlap(query: &str, document: &str) -> usize {
        let doc = document.to_lowercase();
        query
            .to_lowercase()
            .split_whitespace()
            .filter(|token| doc.contains(*token))
            .count()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Hit>> {
        let store = self.collections.lock().expect("collections lock");
        let hits = store
            .get(collection)
            .ok_or_else(|| StropheError::UnknownCollection(collection.to_string()))?;

        let mut ranked: Vec<(usize, Hit)> = hits
            .iter()
            .filter(|hit| match filter {
                Some((key, value)) => hit.metadata.get(key).map(String::as_str) == Some(value),
                None => true,
            })
            .map(|hit| (Self::overlap(query, &hit.document), hit.clone()))
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked.into_iter().take(top_k).map(|(_, hit)| hit).collect())
    }

    async fn append(&self, collection: &str, items: &[MemoryItem]) -> Result<()> {
        let mut store = self.collections.lock().expect("collections lock");
        let hits = store.entry(collection.to_string()).or_default();
        for item in items {
            let mut hit = Hit::new(item.text.clone()).with_meta("type", item.item_type.clone());
            if let Some(tag) = item.tags.first() {
                hit = hit.with_meta("tags", tag.clone());
            }
            hits.push(hit);
        }
        Ok(())
    }
}
