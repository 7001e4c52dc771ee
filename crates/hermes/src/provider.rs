//! Provider capability traits.
//!
//! A backend adapter implements some subset of seven capabilities; one that
//! offers all seven is a [`WorkspaceProvider`]. Capabilities an adapter
//! cannot serve must return [`Error::NotSupported`], never a silent
//! success.
//!
//! All operations are safe for concurrent invocation. Cancellation is
//! ambient: every operation is an ordinary future, and callers that need a
//! deadline wrap the call in `tokio::time::timeout` (the router does this
//! for health probes, the pipeline engine for step execution).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::{ProviderId, ProviderType};
use crate::model::{
    BackendRevision, DocumentContent, DocumentMetadata, FilePermission, Notification,
    RevisionInfo, Team, UserIdentity,
};

/// Outcome of comparing a document's content across two sources.
///
/// `Equal` iff the content hashes match. Any inequality currently classifies
/// as `Major`; `Minor` is reserved for a future length-aware classifier. The
/// classification is deterministic over its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentDiff {
    Equal,
    Minor,
    Major,
}

/// Classify two content hashes.
#[must_use]
pub fn classify_hashes(a: &str, b: &str) -> ContentDiff {
    if a == b {
        ContentDiff::Equal
    } else {
        ContentDiff::Major
    }
}

/// Document metadata and lifecycle operations.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// The backend family this adapter serves.
    fn provider_type(&self) -> ProviderType;

    /// Registry name of this adapter instance, e.g. `"google-prod"`.
    fn name(&self) -> &str;

    /// Fetch the metadata projection for a backend document.
    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata>;

    /// Resolve a UUID to this backend's projection.
    ///
    /// Fails with `NotFound` when no mapping exists and `AmbiguousIdentity`
    /// when more than one backend document advertises the UUID.
    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata>;

    /// Create a document; the adapter mints the UUID.
    async fn create_document(
        &self,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata>;

    /// Create a document carrying a caller-supplied UUID.
    async fn create_document_with_uuid(
        &self,
        uuid: Uuid,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata>;

    /// Record an externally-discovered document under its existing identity.
    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata>;

    async fn copy_document(
        &self,
        source: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata>;

    async fn move_document(
        &self,
        provider_id: &ProviderId,
        new_parent: &str,
    ) -> Result<DocumentMetadata>;

    async fn rename_document(
        &self,
        provider_id: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata>;

    /// Logically archive a document. Backends never physically delete; the
    /// refreshed metadata comes back with `SyncStatus::Archived`.
    async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata>;
}

/// Document body operations.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent>;

    /// Replace the body; returns the refreshed content including the new
    /// backend revision where the backend reports one.
    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent>;

    /// Fetch several bodies; per-document failures are reported in place.
    async fn get_content_batch(
        &self,
        provider_ids: &[ProviderId],
    ) -> Vec<Result<DocumentContent>> {
        let mut results = Vec::with_capacity(provider_ids.len());
        for id in provider_ids {
            results.push(self.get_content(id).await);
        }
        results
    }

    /// Compare a backend document against reference content.
    async fn compare_content(
        &self,
        provider_id: &ProviderId,
        other: &DocumentContent,
    ) -> Result<ContentDiff> {
        let mine = self.get_content(provider_id).await?;
        Ok(classify_hashes(&mine.content_hash, &other.content_hash))
    }
}

/// Backend-native revision history.
#[async_trait]
pub trait RevisionTrackingProvider: Send + Sync {
    /// Revisions newest-first. `limit <= 0` means unbounded.
    async fn get_revision_history(
        &self,
        provider_id: &ProviderId,
        limit: i64,
    ) -> Result<Vec<BackendRevision>>;

    /// Aggregate revisions from every backend document claiming this UUID.
    async fn get_all_document_revisions(&self, uuid: Uuid) -> Result<RevisionInfo>;
}

/// Document access control.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn list_permissions(&self, provider_id: &ProviderId) -> Result<Vec<FilePermission>>;

    async fn grant_permission(
        &self,
        provider_id: &ProviderId,
        permission: &FilePermission,
    ) -> Result<FilePermission>;

    async fn revoke_permission(
        &self,
        provider_id: &ProviderId,
        permission_id: &str,
    ) -> Result<()>;
}

/// Directory lookups.
#[async_trait]
pub trait PeopleProvider: Send + Sync {
    async fn search_people(&self, query: &str) -> Result<Vec<UserIdentity>>;

    async fn get_person(&self, email: &str) -> Result<UserIdentity>;

    async fn get_person_by_unified_id(&self, unified_id: &str) -> Result<UserIdentity>;

    /// Resolve a batch of emails to canonical identities, collapsing
    /// alternates onto their canonical records.
    async fn resolve_identities(&self, emails: &[String]) -> Result<Vec<UserIdentity>>;
}

/// Team membership lookups.
#[async_trait]
pub trait TeamProvider: Send + Sync {
    async fn list_teams(&self) -> Result<Vec<Team>>;

    async fn get_team(&self, team_id: &str) -> Result<Team>;

    async fn get_teams_for_user(&self, email: &str) -> Result<Vec<Team>>;

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<UserIdentity>>;
}

/// Outbound notification delivery.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_notification(&self, notification: &Notification) -> Result<()>;
}

/// A provider offering all seven capabilities.
///
/// Blanket-implemented: any type implementing the seven traits is a
/// `WorkspaceProvider` and can be registered with the router.
pub trait WorkspaceProvider:
    DocumentProvider
    + ContentProvider
    + RevisionTrackingProvider
    + PermissionProvider
    + PeopleProvider
    + TeamProvider
    + NotificationProvider
{
}

impl<T> WorkspaceProvider for T where
    T: DocumentProvider
        + ContentProvider
        + RevisionTrackingProvider
        + PermissionProvider
        + PeopleProvider
        + TeamProvider
        + NotificationProvider
{
}

/// Standard `NotSupported` error for a capability an adapter does not serve.
#[must_use]
pub fn unsupported(provider: &str, capability: &str) -> Error {
    Error::not_supported(format!("provider '{provider}' does not support {capability}"))
}
