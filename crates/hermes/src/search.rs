//! Search index capability interface.
//!
//! The index engine itself lives outside this repository; the pipeline's
//! `transform` step produces a [`SearchDocument`] and the `index` step hands
//! it to whatever [`SearchIndexer`] the deployment wires in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Flattened projection of a document for the search index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub uuid: Uuid,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_team: Option<String>,
    pub provider_type: String,
    pub content_hash: String,
    pub modified_time: chrono::DateTime<chrono::Utc>,
}

/// Capability interface over the external search engine.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Insert or replace the index entry for a document.
    async fn index_document(&self, document: &SearchDocument) -> Result<()>;

    /// Remove a document from the index.
    async fn remove_document(&self, uuid: Uuid) -> Result<()>;
}
