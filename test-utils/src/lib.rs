//! Shared test utilities for the Hermes workspace.
//!
//! In-memory fakes with scriptable failure modes: a workspace provider
//! over a document map, a deterministic AI provider, a recording message
//! bus, and a recording search indexer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use hermes::ai::{AiProvider, Summary, SummarizeOptions};
use hermes::error::{Error, Result};
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{
    content_hash, BackendRevision, DocumentContent, DocumentMetadata, FilePermission,
    Notification, RevisionInfo, SyncStatus, Team, UserIdentity,
};
use hermes::outbox::{BusMessage, MessageBus};
use hermes::provider::{
    unsupported, ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
    PermissionProvider, RevisionTrackingProvider, TeamProvider,
};
use hermes::search::{SearchDocument, SearchIndexer};

/// Initialize test logging once; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// In-memory workspace provider with scriptable failures.
///
/// Documents live in a map keyed by provider id. `fail_reads` makes every
/// read fail with a transient error (router fallback tests);
/// `write_count` observes how many content writes the provider served
/// (write fan-out tests).
pub struct MockWorkspaceProvider {
    name: String,
    provider_type: ProviderType,
    docs: RwLock<HashMap<String, (DocumentMetadata, String)>>,
    fail_reads: AtomicBool,
    write_count: AtomicUsize,
}

impl MockWorkspaceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type: ProviderType::Local,
            docs: RwLock::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            write_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_provider_type(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = provider_type;
        self
    }

    /// Seed a document and return its metadata.
    pub fn seed(&self, uuid: Uuid, path: &str, body: &str) -> DocumentMetadata {
        let provider_id = ProviderId::new(self.provider_type, path)
            .unwrap_or_else(|_| ProviderId {
                provider_type: self.provider_type,
                id: "seed".to_string(),
            });
        let mut metadata = DocumentMetadata::new(uuid, provider_id, path);
        metadata.content_hash = content_hash(body);
        self.docs
            .write()
            .insert(metadata.provider_id.to_string(), (metadata.clone(), body.to_string()));
        metadata
    }

    /// Make every read fail with a transient error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Current metadata for a seeded document, bypassing failure
    /// scripting.
    pub fn metadata_by_uuid(&self, uuid: Uuid) -> Option<DocumentMetadata> {
        self.docs
            .read()
            .values()
            .find(|(m, _)| m.uuid == uuid)
            .map(|(m, _)| m.clone())
    }

    /// Replace a seeded document's body directly.
    pub fn update_body(&self, uuid: Uuid, body: &str) -> Result<()> {
        let mut docs = self.docs.write();
        let (metadata, stored) = docs
            .values_mut()
            .find(|(m, _)| m.uuid == uuid)
            .ok_or_else(|| Error::not_found(format!("document with UUID {uuid}")))?;
        *stored = body.to_string();
        metadata.content_hash = content_hash(body);
        metadata.modified_time = chrono::Utc::now();
        Ok(())
    }

    /// Number of content writes served.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(Error::transient(format!(
                "provider '{}' is down",
                self.name
            )))
        } else {
            Ok(())
        }
    }

    fn content_for(&self, metadata: &DocumentMetadata, body: &str) -> DocumentContent {
        DocumentContent {
            uuid: metadata.uuid,
            provider_id: metadata.provider_id.clone(),
            title: metadata.name.clone(),
            body: body.to_string(),
            format: Default::default(),
            content_hash: content_hash(body),
            last_modified: metadata.modified_time,
            revision: Some(BackendRevision {
                provider_type: metadata.provider_type,
                revision_id: content_hash(body),
                modified_time: metadata.modified_time,
                modified_by: None,
                comment: None,
                keep_forever: None,
                metadata: Default::default(),
            }),
        }
    }
}

#[async_trait]
impl DocumentProvider for MockWorkspaceProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        self.check_reads()?;
        self.docs
            .read()
            .get(&provider_id.to_string())
            .map(|(m, _)| m.clone())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))
    }

    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        self.check_reads()?;
        let docs = self.docs.read();
        let mut matches = docs.values().filter(|(m, _)| m.uuid == uuid);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(Error::ambiguous_identity(format!(
                "multiple documents advertise UUID {uuid}"
            )));
        }
        first
            .map(|(m, _)| m.clone())
            .ok_or_else(|| Error::not_found(format!("document with UUID {uuid}")))
    }

    async fn create_document(
        &self,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata> {
        self.create_document_with_uuid(hermes::identity::new_uuid(), name, parent, body)
            .await
    }

    async fn create_document_with_uuid(
        &self,
        uuid: Uuid,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let path = match parent {
            Some(parent) => format!("{parent}/{name}"),
            None => name.to_string(),
        };
        if self
            .docs
            .read()
            .values()
            .any(|(m, _)| m.uuid == uuid)
        {
            return Err(Error::already_exists(format!("document with UUID {uuid}")));
        }
        Ok(self.seed(uuid, &path, body))
    }

    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        self.docs.write().insert(
            metadata.provider_id.to_string(),
            (metadata.clone(), String::new()),
        );
        Ok(metadata.clone())
    }

    async fn copy_document(
        &self,
        source: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let body = {
            let docs = self.docs.read();
            let (_, body) = docs
                .get(&source.to_string())
                .ok_or_else(|| Error::not_found(format!("document '{source}'")))?;
            body.clone()
        };
        Ok(self.seed(hermes::identity::new_uuid(), new_name, &body))
    }

    async fn move_document(
        &self,
        provider_id: &ProviderId,
        new_parent: &str,
    ) -> Result<DocumentMetadata> {
        let mut docs = self.docs.write();
        let (mut metadata, body) = docs
            .remove(&provider_id.to_string())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))?;
        let file = provider_id.id.rsplit('/').next().unwrap_or("doc");
        metadata.provider_id = ProviderId::new(self.provider_type, format!("{new_parent}/{file}"))?;
        docs.insert(metadata.provider_id.to_string(), (metadata.clone(), body));
        Ok(metadata)
    }

    async fn rename_document(
        &self,
        provider_id: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let mut docs = self.docs.write();
        let (metadata, _) = docs
            .get_mut(&provider_id.to_string())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))?;
        metadata.name = new_name.to_string();
        Ok(metadata.clone())
    }

    async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        let mut docs = self.docs.write();
        let (metadata, _) = docs
            .get_mut(&provider_id.to_string())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))?;
        metadata.sync_status = SyncStatus::Archived;
        Ok(metadata.clone())
    }
}

#[async_trait]
impl ContentProvider for MockWorkspaceProvider {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent> {
        self.check_reads()?;
        let docs = self.docs.read();
        let (metadata, body) = docs
            .get(&provider_id.to_string())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))?;
        Ok(self.content_for(metadata, body))
    }

    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.write();
        let (metadata, stored) = docs
            .get_mut(&provider_id.to_string())
            .ok_or_else(|| Error::not_found(format!("document '{provider_id}'")))?;
        *stored = body.to_string();
        metadata.content_hash = content_hash(body);
        metadata.modified_time = chrono::Utc::now();
        let metadata = metadata.clone();
        let stored = stored.clone();
        drop(docs);
        Ok(self.content_for(&metadata, &stored))
    }
}

#[async_trait]
impl RevisionTrackingProvider for MockWorkspaceProvider {
    async fn get_revision_history(
        &self,
        _provider_id: &ProviderId,
        _limit: i64,
    ) -> Result<Vec<BackendRevision>> {
        Err(unsupported(&self.name, "revision history"))
    }

    async fn get_all_document_revisions(&self, _uuid: Uuid) -> Result<RevisionInfo> {
        Err(unsupported(&self.name, "revision history"))
    }
}

#[async_trait]
impl PermissionProvider for MockWorkspaceProvider {
    async fn list_permissions(&self, _provider_id: &ProviderId) -> Result<Vec<FilePermission>> {
        Err(unsupported(&self.name, "permissions"))
    }

    async fn grant_permission(
        &self,
        _provider_id: &ProviderId,
        _permission: &FilePermission,
    ) -> Result<FilePermission> {
        Err(unsupported(&self.name, "permissions"))
    }

    async fn revoke_permission(
        &self,
        _provider_id: &ProviderId,
        _permission_id: &str,
    ) -> Result<()> {
        Err(unsupported(&self.name, "permissions"))
    }
}

#[async_trait]
impl PeopleProvider for MockWorkspaceProvider {
    async fn search_people(&self, _query: &str) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.name, "people"))
    }

    async fn get_person(&self, _email: &str) -> Result<UserIdentity> {
        Err(unsupported(&self.name, "people"))
    }

    async fn get_person_by_unified_id(&self, _unified_id: &str) -> Result<UserIdentity> {
        Err(unsupported(&self.name, "people"))
    }

    async fn resolve_identities(&self, _emails: &[String]) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.name, "people"))
    }
}

#[async_trait]
impl TeamProvider for MockWorkspaceProvider {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        Err(unsupported(&self.name, "teams"))
    }

    async fn get_team(&self, _team_id: &str) -> Result<Team> {
        Err(unsupported(&self.name, "teams"))
    }

    async fn get_teams_for_user(&self, _email: &str) -> Result<Vec<Team>> {
        Err(unsupported(&self.name, "teams"))
    }

    async fn list_team_members(&self, _team_id: &str) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.name, "teams"))
    }
}

#[async_trait]
impl NotificationProvider for MockWorkspaceProvider {
    async fn send_notification(&self, _notification: &Notification) -> Result<()> {
        Err(unsupported(&self.name, "notifications"))
    }
}

/// Deterministic AI provider: summaries echo the first line, embeddings
/// are derived from byte sums so equal text maps to equal vectors.
pub struct MockAiProvider {
    model: String,
    dimensions: usize,
    fail: AtomicBool,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            dimensions: 8,
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        (0..self.dimensions)
            .map(|i| ((sum.wrapping_add(i as u32)) % 97) as f32 / 97.0)
            .collect()
    }
}

impl Default for MockAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn summarize(&self, content: &str, _options: &SummarizeOptions) -> Result<Summary> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transient("mock AI backend is down"));
        }
        let first_line = content.lines().next().unwrap_or("empty document");
        Ok(Summary {
            executive_summary: format!("Summary of: {first_line}"),
            key_points: vec!["mock point".to_string()],
            topics: vec!["testing".to_string()],
            tags: vec!["mock".to_string()],
            suggested_status: None,
            confidence: 0.5,
            tokens_used: content.len() as u32 / 4,
            generation_time_ms: 1,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transient("mock AI backend is down"));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// A message bus that records everything it publishes.
#[derive(Default)]
pub struct RecordingBus {
    messages: RwLock<Vec<BusMessage>>,
    fail: AtomicBool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages.read().clone()
    }

    /// Partition keys in publication order.
    pub fn partition_keys(&self) -> Vec<String> {
        self.messages
            .read()
            .iter()
            .map(|m| m.partition_key.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, message: BusMessage) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transient("recording bus is failing"));
        }
        self.messages.write().push(message);
        Ok(())
    }
}

/// A search indexer that records indexed documents.
#[derive(Default)]
pub struct RecordingIndexer {
    documents: RwLock<Vec<SearchDocument>>,
}

impl RecordingIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<SearchDocument> {
        self.documents.read().clone()
    }
}

#[async_trait]
impl SearchIndexer for RecordingIndexer {
    async fn index_document(&self, document: &SearchDocument) -> Result<()> {
        let mut documents = self.documents.write();
        documents.retain(|d| d.uuid != document.uuid);
        documents.push(document.clone());
        Ok(())
    }

    async fn remove_document(&self, uuid: Uuid) -> Result<()> {
        self.documents.write().retain(|d| d.uuid != uuid);
        Ok(())
    }
}

/// Convenience: a seeded provider wrapped in an `Arc`.
pub fn seeded_provider(name: &str, docs: &[(&str, &str)]) -> Arc<MockWorkspaceProvider> {
    let provider = Arc::new(MockWorkspaceProvider::new(name));
    for (path, body) in docs {
        provider.seed(hermes::identity::new_uuid(), path, body);
    }
    provider
}
