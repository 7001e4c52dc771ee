//! Canonical pipeline steps.
//!
//! Rulesets refer to these by stable name: `discover`, `assign_uuid`,
//! `hash`, `load_metadata`, `extract_content`, `summarize`, `embed`,
//! `transform`, `index`, `track_revision` (alias `track`).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::ai::{AiProvider, ChunkingConfig, SummarizeOptions};
use crate::error::{Error, Result};
use crate::identity;
use crate::model::{content_hash, BackendRevision};
use crate::outbox::{EventType, OutboxStore, Publisher};
use crate::search::{SearchDocument, SearchIndexer};
use crate::store::{RevisionStore, StoredRevision};

use super::context::StepContext;
use super::step::{Step, StepRegistry};

/// Confirms the document still exists in its backend and refreshes the
/// metadata projection.
pub struct DiscoverStep;

#[async_trait]
impl Step for DiscoverStep {
    fn name(&self) -> &str {
        "discover"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let fetched = cx.provider.get_document(&cx.metadata.provider_id).await?;
        // Identity survives refreshes: a backend that lost the UUID mapping
        // does not get to reset it.
        let uuid = if fetched.uuid.is_nil() {
            cx.metadata.uuid
        } else {
            fetched.uuid
        };
        cx.metadata = fetched;
        cx.metadata.uuid = uuid;
        Ok(())
    }
}

/// Mints a UUID for documents that arrived without one.
pub struct AssignUuidStep;

#[async_trait]
impl Step for AssignUuidStep {
    fn name(&self) -> &str {
        "assign_uuid"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        if cx.metadata.uuid.is_nil() {
            cx.metadata.uuid = identity::new_uuid();
            debug!(uuid = %cx.metadata.uuid, "minted uuid for document");
        }
        Ok(())
    }
}

/// Loads the document body into the context.
pub struct ExtractContentStep;

#[async_trait]
impl Step for ExtractContentStep {
    fn name(&self) -> &str {
        "extract_content"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let content = cx.provider.get_content(&cx.metadata.provider_id).await?;
        cx.content = Some(content);
        Ok(())
    }
}

/// Computes the content fingerprint from the loaded body.
pub struct HashStep;

#[async_trait]
impl Step for HashStep {
    fn name(&self) -> &str {
        "hash"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let body = cx.body().ok_or_else(|| {
            Error::invalid_argument(format!(
                "document {} has no loaded content to hash",
                cx.metadata.uuid
            ))
        })?;
        let hash = content_hash(body);
        cx.metadata.content_hash = hash.clone();
        if let Some(content) = &mut cx.content {
            content.content_hash = hash;
        }
        Ok(())
    }
}

/// Re-reads authoritative metadata from the provider, preserving artifacts
/// computed earlier in the run.
pub struct LoadMetadataStep;

#[async_trait]
impl Step for LoadMetadataStep {
    fn name(&self) -> &str {
        "load_metadata"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let fetched = cx.provider.get_document(&cx.metadata.provider_id).await?;
        let uuid = if fetched.uuid.is_nil() {
            cx.metadata.uuid
        } else {
            fetched.uuid
        };
        let hash = if cx.metadata.content_hash.is_empty() {
            fetched.content_hash.clone()
        } else {
            cx.metadata.content_hash.clone()
        };
        cx.metadata = fetched;
        cx.metadata.uuid = uuid;
        cx.metadata.content_hash = hash;
        Ok(())
    }
}

/// Generates the AI summary.
pub struct SummarizeStep {
    ai: Arc<dyn AiProvider>,
    options: SummarizeOptions,
}

impl SummarizeStep {
    pub fn new(ai: Arc<dyn AiProvider>, options: SummarizeOptions) -> Self {
        Self { ai, options }
    }
}

#[async_trait]
impl Step for SummarizeStep {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let body = cx.body().ok_or_else(|| {
            Error::invalid_argument(format!(
                "document {} has no loaded content to summarize",
                cx.metadata.uuid
            ))
        })?;
        let summary = self.ai.summarize(body, &self.options).await?;
        cx.summary = Some(summary);
        Ok(())
    }
}

/// Generates content and chunk embeddings.
pub struct EmbedStep {
    ai: Arc<dyn AiProvider>,
    chunking: Option<ChunkingConfig>,
}

impl EmbedStep {
    pub fn new(ai: Arc<dyn AiProvider>, chunking: Option<ChunkingConfig>) -> Self {
        Self { ai, chunking }
    }
}

#[async_trait]
impl Step for EmbedStep {
    fn name(&self) -> &str {
        "embed"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let body = cx.body().ok_or_else(|| {
            Error::invalid_argument(format!(
                "document {} has no loaded content to embed",
                cx.metadata.uuid
            ))
        })?;
        let embeddings = self.ai.embed_document(body, self.chunking.as_ref()).await?;
        cx.embeddings = Some(embeddings);
        Ok(())
    }
}

/// Projects the context into a search document.
pub struct TransformStep;

#[async_trait]
impl Step for TransformStep {
    fn name(&self) -> &str {
        "transform"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let meta = &cx.metadata;
        let body = cx.body().unwrap_or_default().to_string();
        cx.search_doc = Some(SearchDocument {
            uuid: meta.uuid,
            title: meta.name.clone(),
            body,
            summary: cx.summary.as_ref().map(|s| s.executive_summary.clone()),
            tags: meta.tags.clone(),
            project: meta.project.clone(),
            owning_team: meta.owning_team.clone(),
            provider_type: meta.provider_type.to_string(),
            content_hash: meta.content_hash.clone(),
            modified_time: meta.modified_time,
        });
        Ok(())
    }
}

/// Hands the search projection to the index.
pub struct IndexStep {
    indexer: Arc<dyn SearchIndexer>,
}

impl IndexStep {
    pub fn new(indexer: Arc<dyn SearchIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Step for IndexStep {
    fn name(&self) -> &str {
        "index"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let doc = cx.search_doc.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!(
                "document {} was not transformed before indexing",
                cx.metadata.uuid
            ))
        })?;
        self.indexer.index_document(doc).await
    }
}

/// Persists the revision, enqueues the change event, and checks for
/// cross-backend drift.
pub struct TrackRevisionStep {
    store: Arc<dyn RevisionStore>,
    publisher: Publisher,
}

impl TrackRevisionStep {
    /// `store` and `outbox` must be backed by the same database so the
    /// revision row and its event land in one transaction.
    pub fn new(store: Arc<dyn RevisionStore>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self {
            store,
            publisher: Publisher::new(outbox),
        }
    }
}

#[async_trait]
impl Step for TrackRevisionStep {
    fn name(&self) -> &str {
        "track_revision"
    }

    async fn execute(&self, cx: &mut StepContext) -> Result<()> {
        let meta = &cx.metadata;
        if meta.content_hash.is_empty() {
            return Err(Error::invalid_argument(format!(
                "document {} has no content hash; run `hash` before `track_revision`",
                meta.uuid
            )));
        }

        let existing = self
            .store
            .latest_revision(meta.uuid, meta.provider_type)
            .await?;
        if let Some(existing) = &existing {
            if existing.content_hash == meta.content_hash {
                debug!(uuid = %meta.uuid, "revision unchanged; skipping");
                return Ok(());
            }
        }

        let backend_revision = cx
            .content
            .as_ref()
            .and_then(|c| c.revision.clone())
            .unwrap_or_else(|| BackendRevision {
                provider_type: meta.provider_type,
                revision_id: meta.content_hash.clone(),
                modified_time: meta.modified_time,
                modified_by: meta.owner.as_ref().map(|o| o.email.clone()),
                comment: None,
                keep_forever: None,
                metadata: Default::default(),
            });
        let revision = StoredRevision {
            uuid: meta.uuid,
            provider_type: meta.provider_type,
            provider_id: meta.provider_id.clone(),
            revision: backend_revision,
            content_hash: meta.content_hash.clone(),
            sync_status: meta.sync_status,
            summary: cx.summary.clone(),
            embeddings: cx.embeddings.clone(),
            stored_at: Utc::now(),
        };
        let event_type = if existing.is_none() {
            EventType::Created
        } else {
            EventType::Updated
        };
        self.publisher.publish_revision(revision, event_type).await?;

        if self.store.detect_drift(meta.uuid).await? {
            warn!(uuid = %meta.uuid, "cross-backend content drift detected");
        }
        Ok(())
    }
}

/// Collaborators for the canonical step set. Steps whose collaborators are
/// absent are simply not registered.
#[derive(Default)]
pub struct StepDependencies {
    pub ai: Option<Arc<dyn AiProvider>>,
    pub indexer: Option<Arc<dyn SearchIndexer>>,
    pub revision_store: Option<Arc<dyn RevisionStore>>,
    pub outbox: Option<Arc<dyn OutboxStore>>,
    pub summarize_options: SummarizeOptions,
    pub chunking: Option<ChunkingConfig>,
}

/// Build a registry holding every canonical step the dependencies allow.
#[must_use]
pub fn default_registry(deps: StepDependencies) -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register(Arc::new(DiscoverStep));
    registry.register(Arc::new(AssignUuidStep));
    registry.register(Arc::new(ExtractContentStep));
    registry.register(Arc::new(HashStep));
    registry.register(Arc::new(LoadMetadataStep));
    registry.register(Arc::new(TransformStep));
    if let Some(ai) = &deps.ai {
        registry.register(Arc::new(SummarizeStep::new(
            Arc::clone(ai),
            deps.summarize_options.clone(),
        )));
        registry.register(Arc::new(EmbedStep::new(
            Arc::clone(ai),
            deps.chunking.clone(),
        )));
    }
    if let Some(indexer) = &deps.indexer {
        registry.register(Arc::new(IndexStep::new(Arc::clone(indexer))));
    }
    if let (Some(store), Some(outbox)) = (&deps.revision_store, &deps.outbox) {
        let step: Arc<dyn Step> = Arc::new(TrackRevisionStep::new(
            Arc::clone(store),
            Arc::clone(outbox),
        ));
        registry.register(Arc::clone(&step));
        registry.register_alias("track", step);
    }
    registry
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{new_uuid, ProviderId, ProviderType};
    use crate::model::DocumentMetadata;
    use crate::outbox::MemoryOutboxStore;
    use crate::test_support::StubProvider;

    fn stub_with_doc(body: &str) -> (Arc<StubProvider>, DocumentMetadata) {
        let provider = Arc::new(StubProvider::new("stub"));
        let pid = ProviderId::new(ProviderType::Local, "docs/a.md").unwrap();
        let mut meta = DocumentMetadata::new(new_uuid(), pid, "Doc A");
        meta.content_hash = content_hash(body);
        provider.insert_document(meta.clone(), body);
        (provider, meta)
    }

    #[tokio::test]
    async fn test_extract_then_hash() {
        let (provider, meta) = stub_with_doc("The body.");
        let mut cx = StepContext::new(meta, provider);
        cx.metadata.content_hash.clear();

        ExtractContentStep.execute(&mut cx).await.unwrap();
        assert_eq!(cx.body(), Some("The body."));

        HashStep.execute(&mut cx).await.unwrap();
        assert_eq!(cx.metadata.content_hash, content_hash("The body."));
    }

    #[tokio::test]
    async fn test_hash_without_content_fails() {
        let (provider, meta) = stub_with_doc("x");
        let mut cx = StepContext::new(meta, provider);
        let err = HashStep.execute(&mut cx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_assign_uuid_only_when_nil() {
        let (provider, meta) = stub_with_doc("x");
        let known = meta.uuid;
        let mut cx = StepContext::new(meta, provider);
        AssignUuidStep.execute(&mut cx).await.unwrap();
        assert_eq!(cx.metadata.uuid, known);

        cx.metadata.uuid = uuid::Uuid::nil();
        AssignUuidStep.execute(&mut cx).await.unwrap();
        assert!(!cx.metadata.uuid.is_nil());
    }

    #[tokio::test]
    async fn test_discover_preserves_uuid_when_backend_lost_it() {
        let (provider, mut meta) = stub_with_doc("x");
        let known = meta.uuid;
        // Backend copy lost its UUID.
        let mut backend_meta = meta.clone();
        backend_meta.uuid = uuid::Uuid::nil();
        provider.replace_document(backend_meta, "x");

        meta.uuid = known;
        let mut cx = StepContext::new(meta, provider);
        DiscoverStep.execute(&mut cx).await.unwrap();
        assert_eq!(cx.metadata.uuid, known);
    }

    #[tokio::test]
    async fn test_transform_builds_search_doc() {
        let (provider, meta) = stub_with_doc("Body text.");
        let uuid = meta.uuid;
        let mut cx = StepContext::new(meta, provider);
        ExtractContentStep.execute(&mut cx).await.unwrap();
        cx.summary = Some(crate::ai::Summary {
            executive_summary: "The gist.".to_string(),
            ..Default::default()
        });
        TransformStep.execute(&mut cx).await.unwrap();
        let doc = cx.search_doc.unwrap();
        assert_eq!(doc.uuid, uuid);
        assert_eq!(doc.title, "Doc A");
        assert_eq!(doc.body, "Body text.");
        assert_eq!(doc.summary.as_deref(), Some("The gist."));
    }

    #[tokio::test]
    async fn test_index_without_transform_fails() {
        struct NullIndexer;
        #[async_trait]
        impl SearchIndexer for NullIndexer {
            async fn index_document(&self, _doc: &SearchDocument) -> Result<()> {
                Ok(())
            }
            async fn remove_document(&self, _uuid: uuid::Uuid) -> Result<()> {
                Ok(())
            }
        }
        let (provider, meta) = stub_with_doc("x");
        let mut cx = StepContext::new(meta, provider);
        let step = IndexStep::new(Arc::new(NullIndexer));
        assert!(step.execute(&mut cx).await.is_err());
    }

    #[tokio::test]
    async fn test_track_revision_idempotent_per_hash() {
        let store = Arc::new(MemoryOutboxStore::new());
        let step = TrackRevisionStep::new(store.clone(), store.clone());

        let (provider, meta) = stub_with_doc("same body");
        let uuid = meta.uuid;
        let mut cx = StepContext::new(meta, provider);
        ExtractContentStep.execute(&mut cx).await.unwrap();
        HashStep.execute(&mut cx).await.unwrap();

        step.execute(&mut cx).await.unwrap();
        step.execute(&mut cx).await.unwrap();

        assert_eq!(store.entries_for_document(uuid).await.unwrap().len(), 1);
        assert_eq!(store.revisions_for_uuid(uuid).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_track_revision_requires_hash() {
        let store = Arc::new(MemoryOutboxStore::new());
        let step = TrackRevisionStep::new(store.clone(), store);
        let (provider, mut meta) = stub_with_doc("x");
        meta.content_hash.clear();
        let mut cx = StepContext::new(meta, provider);
        let err = step.execute(&mut cx).await.unwrap_err();
        assert!(err.to_string().contains("hash"));
    }

    #[test]
    fn test_default_registry_canonical_names() {
        let store = Arc::new(MemoryOutboxStore::new());
        let deps = StepDependencies {
            revision_store: Some(store.clone()),
            outbox: Some(store),
            ..Default::default()
        };
        let registry = default_registry(deps);
        for name in [
            "discover",
            "assign_uuid",
            "extract_content",
            "hash",
            "load_metadata",
            "transform",
            "track_revision",
            "track",
        ] {
            assert!(registry.get(name).is_ok(), "missing step {name}");
        }
        // No AI provider wired, so enrichment steps are absent.
        assert!(registry.get("summarize").is_err());
        assert!(registry.get("embed").is_err());
    }
}
