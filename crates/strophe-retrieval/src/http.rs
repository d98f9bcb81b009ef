//! HTTP client for a REST vector-store (Chroma-style API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use strophe_core::{Result, StropheError};

use crate::{Hit, MemoryItem, Retriever};

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_texts: Vec<&'a str>,
    n_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#where: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<BTreeMap<String, String>>>,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<BTreeMap<String, String>>,
}

/// Retrieval client over a vector-store REST API
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn collection_url(&self, collection: &str, op: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{}",
            self.base_url.trim_end_matches('/'),
            collection,
            op
        )
    }

    /// Stable id for a memory record: hash of type + text
    fn item_id(item: &MemoryItem) -> String {
        let mut hasher = Sha256::new();
        hasher.update(item.item_type.as_bytes());
        hasher.update(item.text.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<Hit>> {
        let request = QueryRequest {
            query_texts: vec![query],
            n_results: top_k,
            r#where: filter.map(|(k, v)| {
                let mut map = BTreeMap::new();
                map.insert(k.to_string(), v.to_string());
                map
            }),
        };

        tracing::debug!("Retrieval query: collection={} top_k={}", collection, top_k);

        let response = self
            .client
            .post(self.collection_url(collection, "query"))
            .json(&request)
            .send()
            .await
            .map_err(|e| StropheError::Retrieval(format!("Failed to send query: {}", e)))?;

        if !response.status().is_success() {
            return Err(StropheError::Retrieval(format!(
                "Retrieval API error {} for collection {}",
                response.status(),
                collection
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StropheError::Retrieval(format!("Failed to parse response: {}", e)))?;

        let docs = parsed.documents.into_iter().next().unwrap_or_default();
        let mut metas = parsed
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter();

        Ok(docs
            .into_iter()
            .map(|document| Hit {
                document,
                metadata: metas.next().unwrap_or_default(),
            })
            .collect())
    }

    async fn append(&self, collection: &str, items: &[MemoryItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let request = AddRequest {
            ids: items.iter().map(Self::item_id).collect(),
            documents: items.iter().map(|i| i.text.clone()).collect(),
            metadatas: items
                .iter()
                .map(|i| {
                    let mut meta = BTreeMap::new();
                    meta.insert("type".to_string(), i.item_type.clone());
                    meta.insert("source".to_string(), "feedback".to_string());
                    if let Some(tag) = i.tags.first() {
                        meta.insert("tags".to_string(), tag.clone());
                    }
                    meta
                })
                .collect(),
        };

        tracing::debug!(
            "Appending {} records to collection {}",
            items.len(),
            collection
        );

        let response = self
            .client
            .post(self.collection_url(collection, "add"))
            .json(&request)
            .send()
            .await
            .map_err(|e| StropheError::Retrieval(format!("Failed to send add: {}", e)))?;

        if !response.status().is_success() {
            return Err(StropheError::Retrieval(format!(
                "Retrieval API error {} appending to {}",
                response.status(),
                collection
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_url() {
        let retriever = HttpRetriever::new("http://localhost:8000/");
        assert_eq!(
            retriever.collection_url("memory", "query"),
            "http://localhost:8000/api/v1/collections/memory/query"
        );
    }

    #[test]
    fn test_item_id_is_stable() {
        let a = MemoryItem::taboo("broken heart", "imagery:ban");
        let b = MemoryItem::taboo("broken heart", "other");
        // tags don't contribute to identity
        assert_eq!(HttpRetriever::item_id(&a), HttpRetriever::item_id(&b));
    }
}
