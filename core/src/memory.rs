//! The thin contract the core consumes from the external memory store
//! (hybrid textual + vector retrieval of specifications/completions). The
//! embedding algorithm and the bulk of the store's own implementation are
//! out of scope; only this interface is specified.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Text,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub status: String,
    pub id: String,
    pub vector_stored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrieveFilters {
    pub workflow_id: Option<String>,
    pub record_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default)]
    pub filters: RetrieveFilters,
    pub limit: Option<u32>,
    pub threshold: Option<f64>,
    pub search_mode: Option<SearchMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub id: String,
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub results: Vec<RetrievedItem>,
    pub count: usize,
    pub search_methods: Vec<String>,
}

/// External collaborator; the engine holds a reference to one, not vice
/// versa (acyclic dependency design note).
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn store(&self, request: StoreRequest) -> crate::error::Result<StoreResponse>;
    async fn retrieve(&self, request: RetrieveRequest) -> crate::error::Result<RetrieveResponse>;
}

/// In-process memory store backed by the durable `memories` table, used
/// when no richer semantic store is configured. Performs substring text
/// search only; `search_mode: semantic` degrades to `text` silently since
/// the embedding algorithm itself is out of scope for this core.
pub struct TextOnlyMemoryStore<R: crate::repository::MemoryRepository> {
    repo: std::sync::Arc<R>,
}

impl<R: crate::repository::MemoryRepository> TextOnlyMemoryStore<R> {
    pub fn new(repo: std::sync::Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: crate::repository::MemoryRepository> MemoryStore for TextOnlyMemoryStore<R> {
    async fn store(&self, request: StoreRequest) -> crate::error::Result<StoreResponse> {
        let id = uuid::Uuid::new_v4().to_string();
        let record = crate::models::MemoryRecord {
            id: id.clone(),
            content: request.content,
            record_type: request.record_type,
            tags: request.tags,
            workflow_id: request.workflow_id,
            metadata: request.metadata,
            created_at: chrono::Utc::now(),
        };
        self.repo
            .store(&record)
            .await
            .map_err(|e| crate::error::OrchestratorError::MemoryStore(e.to_string()))?;
        Ok(StoreResponse {
            status: "stored".to_string(),
            id,
            vector_stored: false,
        })
    }

    async fn retrieve(&self, request: RetrieveRequest) -> crate::error::Result<RetrieveResponse> {
        let candidates = if let Some(workflow_id) = &request.filters.workflow_id {
            self.repo
                .retrieve_by_workflow(workflow_id, request.filters.record_type.as_deref())
                .await
        } else {
            self.repo
                .retrieve_by_text(&request.query, request.limit.unwrap_or(20))
                .await
        }
        .map_err(|e| crate::error::OrchestratorError::MemoryRetrieve(e.to_string()))?;

        let query_lower = request.query.to_lowercase();
        let results: Vec<RetrievedItem> = candidates
            .into_iter()
            .filter(|r| query_lower.is_empty() || r.content.to_lowercase().contains(&query_lower))
            .take(request.limit.unwrap_or(20) as usize)
            .map(|r| RetrievedItem {
                id: r.id,
                content: r.content,
                score: 1.0,
            })
            .collect();

        Ok(RetrieveResponse {
            count: results.len(),
            results,
            search_methods: vec!["text".to_string()],
        })
    }
}
