//! Minimal fakes for in-crate unit tests.
//!
//! Fuller mocks (scriptable failures, in-memory document trees) live in the
//! `hermes-test-utils` crate; this module only carries what the core's own
//! tests need.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::{ProviderId, ProviderType};
use crate::model::{
    BackendRevision, DocumentContent, DocumentMetadata, FilePermission, Notification,
    RevisionInfo, Team, UserIdentity,
};
use crate::provider::{
    unsupported, ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
    PermissionProvider, RevisionTrackingProvider, TeamProvider,
};

/// A document+content provider over an in-memory map. Step tests use it
/// where real backend behavior matters; remaining capabilities report
/// `NotSupported`.
pub struct StubProvider {
    name: String,
    docs: parking_lot::RwLock<Vec<(DocumentMetadata, String)>>,
}

impl StubProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: parking_lot::RwLock::new(Vec::new()),
        }
    }

    /// Seed a document.
    pub fn insert_document(&self, metadata: DocumentMetadata, body: &str) {
        self.docs.write().push((metadata, body.to_string()));
    }

    /// Replace a document, matching on provider id.
    pub fn replace_document(&self, metadata: DocumentMetadata, body: &str) {
        let mut docs = self.docs.write();
        docs.retain(|(m, _)| m.provider_id != metadata.provider_id);
        docs.push((metadata, body.to_string()));
    }
}

#[async_trait]
impl DocumentProvider for StubProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        self.docs
            .read()
            .iter()
            .find(|(m, _)| &m.provider_id == provider_id)
            .map(|(m, _)| m.clone())
            .ok_or_else(|| {
                crate::error::Error::not_found(format!("document '{provider_id}'"))
            })
    }

    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        let docs = self.docs.read();
        let mut matches = docs.iter().filter(|(m, _)| m.uuid == uuid);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(crate::error::Error::ambiguous_identity(format!(
                "multiple documents advertise UUID {uuid}"
            )));
        }
        first.map(|(m, _)| m.clone()).ok_or_else(|| {
            crate::error::Error::not_found(format!("document with UUID {uuid}"))
        })
    }

    async fn create_document(
        &self,
        _name: &str,
        _parent: Option<&str>,
        _body: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document creation"))
    }

    async fn create_document_with_uuid(
        &self,
        _uuid: Uuid,
        _name: &str,
        _parent: Option<&str>,
        _body: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document creation"))
    }

    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        self.insert_document(metadata.clone(), "");
        Ok(metadata.clone())
    }

    async fn copy_document(
        &self,
        _source: &ProviderId,
        _new_name: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document copy"))
    }

    async fn move_document(
        &self,
        _provider_id: &ProviderId,
        _new_parent: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document move"))
    }

    async fn rename_document(
        &self,
        _provider_id: &ProviderId,
        _new_name: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document rename"))
    }

    async fn delete_document(&self, _provider_id: &ProviderId) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "document deletion"))
    }
}

#[async_trait]
impl ContentProvider for StubProvider {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent> {
        let docs = self.docs.read();
        let (meta, body) = docs
            .iter()
            .find(|(m, _)| &m.provider_id == provider_id)
            .ok_or_else(|| {
                crate::error::Error::not_found(format!("document '{provider_id}'"))
            })?;
        Ok(DocumentContent {
            uuid: meta.uuid,
            provider_id: meta.provider_id.clone(),
            title: meta.name.clone(),
            body: body.clone(),
            format: Default::default(),
            content_hash: crate::model::content_hash(body),
            last_modified: meta.modified_time,
            revision: None,
        })
    }

    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent> {
        let mut docs = self.docs.write();
        let (meta, stored) = docs
            .iter_mut()
            .find(|(m, _)| &m.provider_id == provider_id)
            .ok_or_else(|| {
                crate::error::Error::not_found(format!("document '{provider_id}'"))
            })?;
        *stored = body.to_string();
        meta.content_hash = crate::model::content_hash(body);
        Ok(DocumentContent {
            uuid: meta.uuid,
            provider_id: meta.provider_id.clone(),
            title: meta.name.clone(),
            body: body.to_string(),
            format: Default::default(),
            content_hash: meta.content_hash.clone(),
            last_modified: meta.modified_time,
            revision: None,
        })
    }
}

#[async_trait]
impl RevisionTrackingProvider for StubProvider {
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
impl PermissionProvider for StubProvider {
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
impl PeopleProvider for StubProvider {
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
impl TeamProvider for StubProvider {
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
impl NotificationProvider for StubProvider {
    async fn send_notification(&self, _notification: &Notification) -> Result<()> {
        Err(unsupported(&self.name, "notifications"))
    }
}

/// A provider that supports nothing. Engine tests use it where a context
/// needs a provider handle that is never called.
pub struct NullProvider {
    name: String,
}

impl NullProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl DocumentProvider for NullProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Local
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn get_document(&self, _provider_id: &ProviderId) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn get_document_by_uuid(&self, _uuid: Uuid) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn create_document(
        &self,
        _name: &str,
        _parent: Option<&str>,
        _body: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn create_document_with_uuid(
        &self,
        _uuid: Uuid,
        _name: &str,
        _parent: Option<&str>,
        _body: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn register_document(&self, _metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn copy_document(
        &self,
        _source: &ProviderId,
        _new_name: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn move_document(
        &self,
        _provider_id: &ProviderId,
        _new_parent: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn rename_document(
        &self,
        _provider_id: &ProviderId,
        _new_name: &str,
    ) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }

    async fn delete_document(&self, _provider_id: &ProviderId) -> Result<DocumentMetadata> {
        Err(unsupported(&self.name, "documents"))
    }
}

#[async_trait]
impl ContentProvider for NullProvider {
    async fn get_content(&self, _provider_id: &ProviderId) -> Result<DocumentContent> {
        Err(unsupported(&self.name, "content"))
    }

    async fn update_content(
        &self,
        _provider_id: &ProviderId,
        _body: &str,
    ) -> Result<DocumentContent> {
        Err(unsupported(&self.name, "content"))
    }
}

#[async_trait]
impl RevisionTrackingProvider for NullProvider {
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
impl PermissionProvider for NullProvider {
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
impl PeopleProvider for NullProvider {
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
impl TeamProvider for NullProvider {
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
impl NotificationProvider for NullProvider {
    async fn send_notification(&self, _notification: &Notification) -> Result<()> {
        Err(unsupported(&self.name, "notifications"))
    }
}
