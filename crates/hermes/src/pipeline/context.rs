//! Per-document pipeline context.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ai::{DocumentEmbeddings, Summary};
use crate::model::{DocumentContent, DocumentMetadata};
use crate::provider::WorkspaceProvider;
use crate::search::SearchDocument;

use super::StepResult;

/// State carried through a pipeline for one document.
///
/// A context is owned by exactly one worker at a time; steps read and write
/// artifacts by field, and a later step's write overwrites an earlier one's.
pub struct StepContext {
    /// Current metadata projection; steps may refresh or enrich it.
    pub metadata: DocumentMetadata,
    /// Source provider handle for backend calls.
    pub provider: Arc<dyn WorkspaceProvider>,
    /// Loaded content, populated by `extract_content`.
    pub content: Option<DocumentContent>,
    /// Generated summary, populated by `summarize`.
    pub summary: Option<Summary>,
    /// Generated embeddings, populated by `embed`.
    pub embeddings: Option<DocumentEmbeddings>,
    /// Search projection, populated by `transform`.
    pub search_doc: Option<SearchDocument>,
    /// When this document entered the pipeline.
    pub started_at: DateTime<Utc>,
    /// Free-form bag for custom steps; documented keys only.
    pub custom: HashMap<String, serde_json::Value>,
    /// Per-step outcomes, appended by the engine.
    pub step_results: Vec<StepResult>,
}

impl StepContext {
    pub fn new(metadata: DocumentMetadata, provider: Arc<dyn WorkspaceProvider>) -> Self {
        Self {
            metadata,
            provider,
            content: None,
            summary: None,
            embeddings: None,
            search_doc: None,
            started_at: Utc::now(),
            custom: HashMap::new(),
            step_results: Vec::new(),
        }
    }

    /// The document body, when content has been loaded.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.body.as_str())
    }

    /// The backend revision id when known, else the content hash: the best
    /// available identifier for execution records.
    #[must_use]
    pub fn revision_marker(&self) -> String {
        if let Some(content) = &self.content {
            if let Some(revision) = &content.revision {
                return revision.revision_id.clone();
            }
        }
        self.metadata.content_hash.clone()
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("uuid", &self.metadata.uuid)
            .field("provider_id", &self.metadata.provider_id)
            .field("has_content", &self.content.is_some())
            .field("has_summary", &self.summary.is_some())
            .field("has_embeddings", &self.embeddings.is_some())
            .field("steps_run", &self.step_results.len())
            .finish()
    }
}
