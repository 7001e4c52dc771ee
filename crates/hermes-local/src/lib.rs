//! Filesystem provider adapter.
//!
//! Documents are markdown files under a base directory; folders are
//! directories. Identity lives in the frontmatter: a file without a UUID
//! gets one minted during parsing, and the id is written back to disk on
//! the next content update. Revision history is served from an optional
//! content-addressed snapshot store and reports `NotSupported` when none is
//! configured, as do permissions, people, teams, and notifications.
//!
//! # Example
//!
//! ```no_run
//! use hermes_local::LocalProvider;
//!
//! # async fn example() -> hermes::Result<()> {
//! let provider = LocalProvider::new("/var/hermes/docs")
//!     .with_name("local-docs")
//!     .with_snapshots();
//! # Ok(())
//! # }
//! ```

mod snapshots;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use hermes::error::{Error, Result};
use hermes::frontmatter::{self, FrontmatterOptions, ParsedDocument};
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{
    BackendRevision, DocumentContent, DocumentMetadata, FilePermission, Notification,
    RevisionEntry, RevisionInfo, SyncStatus, Team, UserIdentity,
};
use hermes::provider::{
    unsupported, ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
    PermissionProvider, RevisionTrackingProvider, TeamProvider,
};

use snapshots::SnapshotStore;

/// Filesystem-backed workspace provider rooted at a base path.
pub struct LocalProvider {
    name: String,
    root: PathBuf,
    snapshots: Option<Arc<SnapshotStore>>,
    options: FrontmatterOptions,
}

impl LocalProvider {
    /// Create a provider rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "local".to_string(),
            root: root.into(),
            snapshots: None,
            options: FrontmatterOptions::default(),
        }
    }

    /// Set the registry name of this instance.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Keep content snapshots under `<root>/.hermes-snapshots` and serve
    /// revision history from them.
    #[must_use]
    pub fn with_snapshots(mut self) -> Self {
        self.snapshots = Some(Arc::new(SnapshotStore::new(snapshots::snapshot_root(
            &self.root,
        ))));
        self
    }

    /// Keep content snapshots under an explicit directory.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshots = Some(Arc::new(SnapshotStore::new(dir.into())));
        self
    }

    /// Override the frontmatter codec options.
    #[must_use]
    pub fn with_frontmatter_options(mut self, options: FrontmatterOptions) -> Self {
        self.options = options;
        self
    }

    fn provider_id_for(&self, relative: &str) -> Result<ProviderId> {
        ProviderId::new(ProviderType::Local, relative)
    }

    /// Resolve a provider id to an absolute path, rejecting escapes from
    /// the root.
    fn resolve(&self, provider_id: &ProviderId) -> Result<PathBuf> {
        if provider_id.provider_type != ProviderType::Local {
            return Err(Error::invalid_argument(format!(
                "provider '{}' cannot serve id '{provider_id}'",
                self.name
            )));
        }
        let relative = Path::new(&provider_id.id);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::invalid_argument(format!(
                "path '{}' escapes the provider root",
                provider_id.id
            )));
        }
        Ok(self.root.join(relative))
    }

    async fn read_raw(&self, provider_id: &ProviderId) -> Result<String> {
        let path = self.resolve(provider_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("document '{provider_id}'")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn parse_file(&self, provider_id: &ProviderId) -> Result<ParsedDocument> {
        let raw = self.read_raw(provider_id).await?;
        frontmatter::parse_with_options(&raw, provider_id, &self.options)
    }

    async fn write_document(&self, parsed: &ParsedDocument) -> Result<()> {
        let path = self.resolve(&parsed.metadata.provider_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let rendered = frontmatter::serialize(&parsed.metadata, &parsed.body);
        tokio::fs::write(&path, rendered).await?;
        Ok(())
    }

    /// Walk the tree and parse every markdown file claiming `uuid`.
    fn scan_for_uuid(&self, uuid: Uuid) -> Result<Vec<ParsedDocument>> {
        let mut matches = Vec::new();
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }
            // Snapshot bodies are not documents.
            if entry
                .path()
                .components()
                .any(|c| c.as_os_str() == ".hermes-snapshots")
            {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                continue;
            };
            let provider_id = self.provider_id_for(relative)?;
            let Ok(raw) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            match frontmatter::parse_with_options(&raw, &provider_id, &self.options) {
                Ok(parsed) if parsed.metadata.uuid == uuid => matches.push(parsed),
                _ => {}
            }
        }
        Ok(matches)
    }

    fn content_from(&self, parsed: &ParsedDocument, revision: Option<BackendRevision>) -> DocumentContent {
        DocumentContent {
            uuid: parsed.metadata.uuid,
            provider_id: parsed.metadata.provider_id.clone(),
            title: parsed.metadata.name.clone(),
            body: parsed.body.clone(),
            format: Default::default(),
            content_hash: parsed.metadata.content_hash.clone(),
            last_modified: parsed.metadata.modified_time,
            revision,
        }
    }

    fn file_name_for(name: &str) -> String {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else if c == ' ' {
                '-'
            } else {
                '_'
            })
            .collect();
        if sanitized.ends_with(".md") {
            sanitized
        } else {
            format!("{sanitized}.md")
        }
    }

    /// Body of one recorded snapshot, served by its revision id.
    ///
    /// Requires a configured snapshot store; reports `NotSupported`
    /// otherwise. Unknown revision ids fail with `NotFound`.
    pub async fn get_revision_content(
        &self,
        provider_id: &ProviderId,
        revision_id: &str,
    ) -> Result<DocumentContent> {
        let Some(snapshots) = &self.snapshots else {
            return Err(unsupported(&self.name, "revision history"));
        };
        let body = snapshots.read(provider_id, revision_id).await?;
        let current = self.parse_file(provider_id).await?;
        let revision = snapshots
            .history(provider_id, 0)
            .await?
            .into_iter()
            .find(|r| r.revision_id == revision_id);
        let last_modified = revision
            .as_ref()
            .map(|r| r.modified_time)
            .unwrap_or(current.metadata.modified_time);
        Ok(DocumentContent {
            uuid: current.metadata.uuid,
            provider_id: provider_id.clone(),
            title: current.metadata.name.clone(),
            content_hash: hermes::model::content_hash(&body),
            body,
            format: Default::default(),
            last_modified,
            revision,
        })
    }
}

#[async_trait]
impl DocumentProvider for LocalProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        Ok(self.parse_file(provider_id).await?.metadata)
    }

    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        let root = self.root.clone();
        let mut matches = self.scan_for_uuid(uuid)?;
        match matches.len() {
            0 => Err(Error::not_found(format!("document with UUID {uuid}"))),
            1 => Ok(matches.remove(0).metadata),
            n => Err(Error::ambiguous_identity(format!(
                "{n} documents under '{}' advertise UUID {uuid}",
                root.display()
            ))),
        }
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
        let file_name = Self::file_name_for(name);
        let relative = match parent {
            Some(parent) => format!("{}/{file_name}", parent.trim_matches('/')),
            None => file_name,
        };
        let provider_id = self.provider_id_for(&relative)?;
        if self.resolve(&provider_id)?.exists() {
            return Err(Error::already_exists(format!("document '{provider_id}'")));
        }

        let mut metadata = DocumentMetadata::new(uuid, provider_id.clone(), name);
        metadata.content_hash = hermes::model::content_hash(body);
        let parsed = ParsedDocument {
            metadata,
            body: body.to_string(),
        };
        self.write_document(&parsed).await?;
        debug!(document = %provider_id, %uuid, "created document");
        self.get_document(&provider_id).await
    }

    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        let mut parsed = self.parse_file(&metadata.provider_id).await?;
        // Registration pins the caller's identity and classification onto
        // the file.
        parsed.metadata.uuid = metadata.uuid;
        parsed.metadata.sync_status = metadata.sync_status;
        if let Some(project) = &metadata.project {
            parsed.metadata.project = Some(project.clone());
        }
        if !metadata.tags.is_empty() {
            parsed.metadata.tags = metadata.tags.clone();
        }
        self.write_document(&parsed).await?;
        self.get_document(&metadata.provider_id).await
    }

    async fn copy_document(
        &self,
        source: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let parsed = self.parse_file(source).await?;
        let parent = Path::new(&source.id)
            .parent()
            .and_then(|p| p.to_str())
            .filter(|p| !p.is_empty())
            .map(ToString::to_string);
        // A copy is a new logical document and gets a fresh identity.
        self.create_document_with_uuid(
            hermes::identity::new_uuid(),
            new_name,
            parent.as_deref(),
            &parsed.body,
        )
        .await
    }

    async fn move_document(
        &self,
        provider_id: &ProviderId,
        new_parent: &str,
    ) -> Result<DocumentMetadata> {
        let source_path = self.resolve(provider_id)?;
        let file_name = Path::new(&provider_id.id)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::invalid_argument(format!("'{}' has no file name", provider_id.id))
            })?;
        let relative = format!("{}/{file_name}", new_parent.trim_matches('/'));
        let target_id = self.provider_id_for(&relative)?;
        let target_path = self.resolve(&target_id)?;
        if !source_path.exists() {
            return Err(Error::not_found(format!("document '{provider_id}'")));
        }
        if let Some(parent) = target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&source_path, &target_path).await?;
        self.get_document(&target_id).await
    }

    async fn rename_document(
        &self,
        provider_id: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let mut parsed = self.parse_file(provider_id).await?;
        parsed.metadata.name = new_name.to_string();
        parsed.metadata.modified_time = chrono::Utc::now();
        self.write_document(&parsed).await?;
        self.get_document(provider_id).await
    }

    async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        // Deletion is logical: the file stays, marked archived.
        let mut parsed = self.parse_file(provider_id).await?;
        parsed.metadata.sync_status = SyncStatus::Archived;
        parsed.metadata.modified_time = chrono::Utc::now();
        self.write_document(&parsed).await?;
        self.get_document(provider_id).await
    }
}

#[async_trait]
impl ContentProvider for LocalProvider {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent> {
        let parsed = self.parse_file(provider_id).await?;
        let revision = match &self.snapshots {
            Some(snapshots) => snapshots.history(provider_id, 1).await?.into_iter().next(),
            None => None,
        };
        Ok(self.content_from(&parsed, revision))
    }

    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent> {
        let mut parsed = self.parse_file(provider_id).await?;
        // The parse minted a UUID if the file had none; writing the update
        // persists it, which is exactly the "written back on next update"
        // contract.
        parsed.body = body.to_string();
        parsed.metadata.content_hash = hermes::model::content_hash(body);
        parsed.metadata.modified_time = chrono::Utc::now();
        self.write_document(&parsed).await?;

        let revision = match &self.snapshots {
            Some(snapshots) => Some(snapshots.snapshot(provider_id, body).await?),
            None => None,
        };
        Ok(self.content_from(&parsed, revision))
    }
}

#[async_trait]
impl RevisionTrackingProvider for LocalProvider {
    async fn get_revision_history(
        &self,
        provider_id: &ProviderId,
        limit: i64,
    ) -> Result<Vec<BackendRevision>> {
        match &self.snapshots {
            Some(snapshots) => snapshots.history(provider_id, limit).await,
            None => Err(unsupported(&self.name, "revision history")),
        }
    }

    async fn get_all_document_revisions(&self, uuid: Uuid) -> Result<RevisionInfo> {
        let Some(snapshots) = &self.snapshots else {
            return Err(unsupported(&self.name, "revision history"));
        };
        let metadata = self.get_document_by_uuid(uuid).await?;
        let entries = snapshots
            .history(&metadata.provider_id, 0)
            .await?
            .into_iter()
            .map(|revision| RevisionEntry {
                provider_type: ProviderType::Local,
                provider_id: metadata.provider_id.clone(),
                content_hash: revision
                    .metadata
                    .get("content_hash")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                sync_status: metadata.sync_status,
                revision,
            })
            .collect();
        Ok(RevisionInfo { uuid, entries })
    }
}

#[async_trait]
impl PermissionProvider for LocalProvider {
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
impl PeopleProvider for LocalProvider {
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
impl TeamProvider for LocalProvider {
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
impl NotificationProvider for LocalProvider {
    async fn send_notification(&self, _notification: &Notification) -> Result<()> {
        Err(unsupported(&self.name, "notifications"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use hermes::model::content_hash;
    use tempfile::TempDir;

    fn local_id(path: &str) -> ProviderId {
        ProviderId::new(ProviderType::Local, path).unwrap()
    }

    async fn seeded_provider() -> (TempDir, LocalProvider) {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("docs")).await.unwrap();
        tokio::fs::write(
            dir.path().join("docs/simple.md"),
            "---\ntitle: Simple Document\n---\n\nContent here.\n",
        )
        .await
        .unwrap();
        let provider = LocalProvider::new(dir.path()).with_name("local-test");
        (dir, provider)
    }

    #[tokio::test]
    async fn test_get_document_parses_frontmatter() {
        let (_dir, provider) = seeded_provider().await;
        let meta = provider.get_document(&local_id("docs/simple.md")).await.unwrap();
        assert_eq!(meta.name, "Simple Document");
        assert_eq!(meta.provider_type, ProviderType::Local);
        assert_eq!(meta.provider_id.to_string(), "local:docs/simple.md");
        assert_eq!(meta.sync_status, SyncStatus::Canonical);
        assert_eq!(meta.mime_type, "text/markdown");
        assert!(!meta.uuid.is_nil());
        assert_eq!(meta.content_hash, content_hash("Content here."));
    }

    #[tokio::test]
    async fn test_get_document_missing_file_not_found() {
        let (_dir, provider) = seeded_provider().await;
        let err = provider.get_document(&local_id("docs/absent.md")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let (_dir, provider) = seeded_provider().await;
        let err = provider
            .get_document(&local_id("../outside.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_uuid_minted_and_persisted_on_update() {
        let (dir, provider) = seeded_provider().await;
        let id = local_id("docs/simple.md");

        // File on disk has no uuid yet.
        let raw = tokio::fs::read_to_string(dir.path().join("docs/simple.md")).await.unwrap();
        assert!(!raw.contains("uuid:"));

        provider.update_content(&id, "Updated content.").await.unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join("docs/simple.md")).await.unwrap();
        assert!(raw.contains("uuid: "));

        // The persisted uuid is stable across subsequent loads.
        let first = provider.get_document(&id).await.unwrap().uuid;
        let second = provider.get_document(&id).await.unwrap().uuid;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_get_document_by_uuid_roundtrip() {
        let (_dir, provider) = seeded_provider().await;
        let id = local_id("docs/simple.md");
        provider.update_content(&id, "Body.").await.unwrap();
        let meta = provider.get_document(&id).await.unwrap();
        let by_uuid = provider.get_document_by_uuid(meta.uuid).await.unwrap();
        assert_eq!(by_uuid.provider_id, id);
    }

    #[tokio::test]
    async fn test_get_document_by_uuid_quotes_uuid_when_missing() {
        let (_dir, provider) = seeded_provider().await;
        let probe = hermes::identity::new_uuid();
        let err = provider.get_document_by_uuid(probe).await.unwrap_err();
        match err {
            Error::NotFound(msg) => assert!(msg.contains(&probe.to_string())),
            other => panic!("expected NotFound, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_uuid_is_ambiguous() {
        let (dir, provider) = seeded_provider().await;
        let uuid = hermes::identity::new_uuid();
        let doc = format!("---\nuuid: {uuid}\ntitle: Dup\n---\nBody");
        tokio::fs::write(dir.path().join("docs/a.md"), &doc).await.unwrap();
        tokio::fs::write(dir.path().join("docs/b.md"), &doc).await.unwrap();
        let err = provider.get_document_by_uuid(uuid).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousIdentity(_)));
    }

    #[tokio::test]
    async fn test_create_document_with_uuid() {
        let (_dir, provider) = seeded_provider().await;
        let uuid = hermes::identity::new_uuid();
        let meta = provider
            .create_document_with_uuid(uuid, "New Doc", Some("notes"), "Fresh body.")
            .await
            .unwrap();
        assert_eq!(meta.uuid, uuid);
        assert_eq!(meta.provider_id.to_string(), "local:notes/New-Doc.md");
        assert_eq!(meta.content_hash, content_hash("Fresh body."));
    }

    #[tokio::test]
    async fn test_create_existing_document_fails() {
        let (_dir, provider) = seeded_provider().await;
        provider
            .create_document("Dup", None, "x")
            .await
            .unwrap();
        let err = provider.create_document("Dup", None, "y").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_archives_instead_of_removing() {
        let (dir, provider) = seeded_provider().await;
        let id = local_id("docs/simple.md");
        let meta = provider.delete_document(&id).await.unwrap();
        assert_eq!(meta.sync_status, SyncStatus::Archived);
        assert!(dir.path().join("docs/simple.md").exists());
    }

    #[tokio::test]
    async fn test_copy_mints_new_identity() {
        let (_dir, provider) = seeded_provider().await;
        let id = local_id("docs/simple.md");
        provider.update_content(&id, "Body.").await.unwrap();
        let original = provider.get_document(&id).await.unwrap();
        let copy = provider.copy_document(&id, "Simple Copy").await.unwrap();
        assert_ne!(copy.uuid, original.uuid);
        assert_eq!(copy.content_hash, original.content_hash);
    }

    #[tokio::test]
    async fn test_move_document() {
        let (_dir, provider) = seeded_provider().await;
        let id = local_id("docs/simple.md");
        let moved = provider.move_document(&id, "archive/2024").await.unwrap();
        assert_eq!(moved.provider_id.to_string(), "local:archive/2024/simple.md");
        assert!(provider.get_document(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_revision_history_not_supported_without_snapshots() {
        let (_dir, provider) = seeded_provider().await;
        let err = provider
            .get_revision_history(&local_id("docs/simple.md"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_snapshot_history_newest_first() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("doc.md"),
            "---\ntitle: Doc\n---\nv1",
        )
        .await
        .unwrap();
        let provider = LocalProvider::new(dir.path()).with_snapshots();
        let id = local_id("doc.md");

        provider.update_content(&id, "v1 body").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        provider.update_content(&id, "v2 body").await.unwrap();

        let history = provider.get_revision_history(&id, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        let newest_hash = history[0]
            .metadata
            .get("content_hash")
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(newest_hash, content_hash("v2 body"));
    }

    #[tokio::test]
    async fn test_snapshot_identical_content_is_noop() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("doc.md"), "---\ntitle: Doc\n---\nx")
            .await
            .unwrap();
        let provider = LocalProvider::new(dir.path()).with_snapshots();
        let id = local_id("doc.md");
        provider.update_content(&id, "same").await.unwrap();
        provider.update_content(&id, "same").await.unwrap();
        let history = provider.get_revision_history(&id, 0).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_get_revision_content_serves_snapshot_body() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("doc.md"), "---\ntitle: Doc\n---\nx")
            .await
            .unwrap();
        let provider = LocalProvider::new(dir.path()).with_snapshots();
        let id = local_id("doc.md");

        provider.update_content(&id, "first body").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        provider.update_content(&id, "second body").await.unwrap();

        let history = provider.get_revision_history(&id, 0).await.unwrap();
        let older = &history[1];
        let content = provider
            .get_revision_content(&id, &older.revision_id)
            .await
            .unwrap();
        assert_eq!(content.body, "first body");
        assert_eq!(content.content_hash, content_hash("first body"));
        assert_eq!(
            content.revision.as_ref().unwrap().revision_id,
            older.revision_id
        );

        let err = provider
            .get_revision_content(&id, "missing-revision")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_revision_content_not_supported_without_snapshots() {
        let (_dir, provider) = seeded_provider().await;
        let err = provider
            .get_revision_content(&local_id("docs/simple.md"), "any")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_history_limit() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("doc.md"), "---\ntitle: Doc\n---\nx")
            .await
            .unwrap();
        let provider = LocalProvider::new(dir.path()).with_snapshots();
        let id = local_id("doc.md");
        for n in 0..3 {
            provider.update_content(&id, &format!("v{n}")).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(provider.get_revision_history(&id, 2).await.unwrap().len(), 2);
        assert_eq!(provider.get_revision_history(&id, 0).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_capabilities() {
        let (_dir, provider) = seeded_provider().await;
        assert!(matches!(
            provider.list_permissions(&local_id("docs/simple.md")).await,
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            provider.search_people("alice").await,
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            provider.list_teams().await,
            Err(Error::NotSupported(_))
        ));
    }
}
