//! Google Workspace (Drive) provider adapter.
//!
//! Documents map to Drive files and folders to Drive folders. The stable
//! Hermes UUID is persisted as a custom `appProperties` entry on the file,
//! and `get_document_by_uuid` is an indexed property query, not a tree walk.
//! Revisions are Drive's native decimal revision ids.
//!
//! People, teams, and notification delivery are not served by this adapter
//! and report `NotSupported`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use hermes::constants::{MAX_IDLE_CONNS_PER_HOST, PEER_TIMEOUT, POOL_IDLE_TIMEOUT};
use hermes::error::{Error, Result};
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{
    content_hash, BackendRevision, DocumentContent, DocumentMetadata, FilePermission,
    Notification, PermissionRole, PermissionType, RevisionEntry, RevisionInfo, SyncStatus, Team,
    UserIdentity,
};
use hermes::provider::{
    unsupported, ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
    PermissionProvider, RevisionTrackingProvider, TeamProvider,
};
use hermes::retry::{with_retry, RetryPolicy};

/// `appProperties` key carrying the Hermes UUID.
const UUID_PROPERTY: &str = "hermesUuid";
/// `appProperties` key carrying the sync status.
const SYNC_STATUS_PROPERTY: &str = "hermesSyncStatus";

const FILE_FIELDS: &str =
    "id,name,mimeType,createdTime,modifiedTime,parents,appProperties,owners,trashed";

/// Connection settings for the Drive adapter.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth2 bearer token with Drive scope. Token refresh happens outside
    /// this adapter.
    pub access_token: String,
    /// API base, overridable for test rigs. Default
    /// `https://www.googleapis.com`.
    pub base_url: String,
    pub name: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl GoogleConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: "https://www.googleapis.com".to_string(),
            name: "google".to_string(),
            timeout: PEER_TIMEOUT,
            max_retries: 3,
            retry_base: Duration::from_millis(250),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveUser {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email_address: String,
    #[serde(default)]
    photo_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    created_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    modified_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    app_properties: BTreeMap<String, String>,
    #[serde(default)]
    owners: Vec<DriveUser>,
    #[serde(default)]
    trashed: bool,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveRevision {
    id: String,
    #[serde(default)]
    modified_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    last_modifying_user: Option<DriveUser>,
    #[serde(default)]
    keep_forever: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DriveRevisionList {
    #[serde(default)]
    revisions: Vec<DriveRevision>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrivePermission {
    id: String,
    #[serde(default)]
    email_address: String,
    #[serde(default)]
    role: String,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DrivePermissionList {
    #[serde(default)]
    permissions: Vec<DrivePermission>,
}

/// Drive-backed workspace provider.
pub struct GoogleProvider {
    config: GoogleConfig,
    base: Url,
    http: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            Error::invalid_argument(format!("invalid API base '{}': {e}", config.base_url))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        let retry_policy = RetryPolicy::linear(config.max_retries, config.retry_base);
        Ok(Self {
            base,
            http,
            retry_policy,
            config,
        })
    }

    fn file_id<'a>(&self, provider_id: &'a ProviderId) -> Result<&'a str> {
        if provider_id.provider_type != ProviderType::Google {
            return Err(Error::invalid_argument(format!(
                "provider '{}' cannot serve id '{provider_id}'",
                self.config.name
            )));
        }
        Ok(&provider_id.id)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::invalid_argument(format!("invalid request path '{path}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        raw_body: Option<String>,
    ) -> Result<reqwest::Response> {
        let idempotent =
            method == Method::GET || method == Method::PUT || method == Method::DELETE;
        let attempt = || async {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.config.access_token)
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(body) = &body {
                request = request.json(body);
            }
            if let Some(raw) = &raw_body {
                request = request
                    .header(reqwest::header::CONTENT_TYPE, "text/markdown")
                    .body(raw.clone());
            }
            let response = request.send().await.map_err(|err| {
                if err.is_timeout() {
                    Error::timeout(self.config.timeout, format!("request to Drive '{url}'"))
                } else {
                    Error::transient(format!("transport error calling Drive: {err}"))
                }
            })?;
            let status = response.status();
            if status.is_success() {
                Ok(response)
            } else {
                Err(Self::classify(status, response.text().await.unwrap_or_default()))
            }
        };
        if idempotent {
            with_retry(&self.retry_policy, attempt).await
        } else {
            attempt().await
        }
    }

    fn classify(status: StatusCode, body: String) -> Error {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| format!("Drive returned {status}"));
        match status {
            StatusCode::NOT_FOUND => Error::not_found(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::unauthorized(message),
            StatusCode::CONFLICT => Error::conflict(message),
            StatusCode::BAD_REQUEST => Error::invalid_argument(message),
            status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                Error::transient(message)
            }
            _ => Error::internal(message),
        }
    }

    async fn fetch_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = self.url(
            &format!("drive/v3/files/{file_id}"),
            &[("fields", FILE_FIELDS)],
        )?;
        let response = self.request(Method::GET, url, None, None).await?;
        response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))
    }

    async fn patch_file(&self, file_id: &str, body: serde_json::Value) -> Result<DriveFile> {
        let url = self.url(
            &format!("drive/v3/files/{file_id}"),
            &[("fields", FILE_FIELDS)],
        )?;
        let response = self.request(Method::PATCH, url, Some(body), None).await?;
        response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))
    }

    fn metadata_from(&self, file: DriveFile) -> Result<DocumentMetadata> {
        let provider_id = ProviderId::new(ProviderType::Google, &file.id)?;
        let uuid = file
            .app_properties
            .get(UUID_PROPERTY)
            .and_then(|raw| hermes::identity::parse_uuid(raw).ok())
            .unwrap_or(Uuid::nil());
        let now = chrono::Utc::now();
        let owner = file.owners.first().map(|user| {
            let mut identity = UserIdentity::new(&user.email_address, &user.display_name);
            identity.photo_url = user.photo_link.clone();
            identity
        });
        let sync_status = if file.trashed {
            SyncStatus::Archived
        } else {
            file.app_properties
                .get(SYNC_STATUS_PROPERTY)
                .and_then(|raw| SyncStatus::parse(raw))
                .unwrap_or_default()
        };

        let mut metadata = DocumentMetadata::new(uuid, provider_id, file.name);
        metadata.mime_type = if file.mime_type.is_empty() {
            "text/markdown".to_string()
        } else {
            file.mime_type
        };
        metadata.created_time = file.created_time.unwrap_or(now);
        metadata.modified_time = file.modified_time.unwrap_or(now);
        metadata.owner = owner;
        metadata.parents = file.parents;
        metadata.sync_status = sync_status;
        for (key, value) in file.app_properties {
            if key != UUID_PROPERTY && key != SYNC_STATUS_PROPERTY {
                metadata
                    .extended
                    .insert(key, serde_json::Value::String(value));
            }
        }
        Ok(metadata)
    }

    fn permission_from(raw: DrivePermission) -> FilePermission {
        let role = match raw.role.as_str() {
            "owner" | "organizer" | "fileOrganizer" => PermissionRole::Owner,
            "writer" => PermissionRole::Writer,
            _ => PermissionRole::Reader,
        };
        let permission_type = match raw.kind.as_str() {
            "group" => PermissionType::Group,
            "domain" => PermissionType::Domain,
            "anyone" => PermissionType::Anyone,
            _ => PermissionType::User,
        };
        FilePermission {
            id: raw.id,
            email: raw.email_address,
            role,
            permission_type,
            user: None,
        }
    }

    async fn upload_body(&self, file_id: &str, body: &str) -> Result<()> {
        let url = self.url(
            &format!("upload/drive/v3/files/{file_id}"),
            &[("uploadType", "media")],
        )?;
        self.request(Method::PATCH, url, None, Some(body.to_string()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentProvider for GoogleProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        let file_id = self.file_id(provider_id)?;
        let file = self.fetch_file(file_id).await?;
        self.metadata_from(file)
    }

    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        let query = format!(
            "appProperties has {{ key='{UUID_PROPERTY}' and value='{uuid}' }} and trashed=false"
        );
        let url = self.url(
            "drive/v3/files",
            &[("q", query.as_str()), ("fields", &format!("files({FILE_FIELDS})"))],
        )?;
        let response = self.request(Method::GET, url, None, None).await?;
        let list: DriveFileList = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        let mut files = list.files;
        match files.len() {
            0 => Err(Error::not_found(format!("document with UUID {uuid}"))),
            1 => self.metadata_from(files.remove(0)),
            n => Err(Error::ambiguous_identity(format!(
                "{n} Drive files advertise UUID {uuid}"
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
        let mut file_body = serde_json::json!({
            "name": name,
            "mimeType": "text/markdown",
            "appProperties": { UUID_PROPERTY: uuid.to_string() },
        });
        if let Some(parent) = parent {
            file_body["parents"] = serde_json::json!([parent]);
        }
        let url = self.url("drive/v3/files", &[("fields", FILE_FIELDS)])?;
        let response = self
            .request(Method::POST, url, Some(file_body), None)
            .await?;
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        self.upload_body(&file.id, body).await?;
        debug!(file = %file.id, %uuid, "created Drive document");
        self.fetch_file(&file.id).await.and_then(|f| self.metadata_from(f))
    }

    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        let file_id = self.file_id(&metadata.provider_id)?.to_string();
        let patched = self
            .patch_file(
                &file_id,
                serde_json::json!({
                    "appProperties": {
                        UUID_PROPERTY: metadata.uuid.to_string(),
                        SYNC_STATUS_PROPERTY: metadata.sync_status.as_str(),
                    }
                }),
            )
            .await?;
        self.metadata_from(patched)
    }

    async fn copy_document(
        &self,
        source: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let file_id = self.file_id(source)?;
        let url = self.url(
            &format!("drive/v3/files/{file_id}/copy"),
            &[("fields", FILE_FIELDS)],
        )?;
        let response = self
            .request(
                Method::POST,
                url,
                Some(serde_json::json!({
                    "name": new_name,
                    // A copy is a new logical document with a fresh identity.
                    "appProperties": { UUID_PROPERTY: hermes::identity::new_uuid().to_string() },
                })),
                None,
            )
            .await?;
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        self.metadata_from(file)
    }

    async fn move_document(
        &self,
        provider_id: &ProviderId,
        new_parent: &str,
    ) -> Result<DocumentMetadata> {
        let file_id = self.file_id(provider_id)?.to_string();
        let current = self.fetch_file(&file_id).await?;
        let mut url = self.url(
            &format!("drive/v3/files/{file_id}"),
            &[("fields", FILE_FIELDS), ("addParents", new_parent)],
        )?;
        if !current.parents.is_empty() {
            url.query_pairs_mut()
                .append_pair("removeParents", &current.parents.join(","));
        }
        let response = self
            .request(Method::PATCH, url, Some(serde_json::json!({})), None)
            .await?;
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        self.metadata_from(file)
    }

    async fn rename_document(
        &self,
        provider_id: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        let file_id = self.file_id(provider_id)?.to_string();
        let patched = self
            .patch_file(&file_id, serde_json::json!({ "name": new_name }))
            .await?;
        self.metadata_from(patched)
    }

    async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        // Logical archive: flip the sync status property, leave the file.
        let file_id = self.file_id(provider_id)?.to_string();
        let patched = self
            .patch_file(
                &file_id,
                serde_json::json!({
                    "appProperties": { SYNC_STATUS_PROPERTY: SyncStatus::Archived.as_str() }
                }),
            )
            .await?;
        self.metadata_from(patched)
    }
}

#[async_trait]
impl ContentProvider for GoogleProvider {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent> {
        let file_id = self.file_id(provider_id)?.to_string();
        let metadata = self.get_document(provider_id).await?;
        let url = self.url(&format!("drive/v3/files/{file_id}"), &[("alt", "media")])?;
        let response = self.request(Method::GET, url, None, None).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        let revision = self
            .get_revision_history(provider_id, 1)
            .await
            .ok()
            .and_then(|mut history| {
                if history.is_empty() {
                    None
                } else {
                    Some(history.remove(0))
                }
            });
        Ok(DocumentContent {
            uuid: metadata.uuid,
            provider_id: provider_id.clone(),
            title: metadata.name.clone(),
            content_hash: content_hash(&body),
            body,
            format: Default::default(),
            last_modified: metadata.modified_time,
            revision,
        })
    }

    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent> {
        let file_id = self.file_id(provider_id)?.to_string();
        self.upload_body(&file_id, body).await?;
        self.get_content(provider_id).await
    }
}

#[async_trait]
impl RevisionTrackingProvider for GoogleProvider {
    async fn get_revision_history(
        &self,
        provider_id: &ProviderId,
        limit: i64,
    ) -> Result<Vec<BackendRevision>> {
        let file_id = self.file_id(provider_id)?;
        let url = self.url(
            &format!("drive/v3/files/{file_id}/revisions"),
            &[("fields", "revisions(id,modifiedTime,lastModifyingUser,keepForever)")],
        )?;
        let response = self.request(Method::GET, url, None, None).await?;
        let list: DriveRevisionList = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        // Drive lists oldest-first; callers get newest-first.
        let mut revisions: Vec<BackendRevision> = list
            .revisions
            .into_iter()
            .map(|raw| BackendRevision {
                provider_type: ProviderType::Google,
                revision_id: raw.id,
                modified_time: raw.modified_time.unwrap_or_else(chrono::Utc::now),
                modified_by: raw
                    .last_modifying_user
                    .map(|user| user.email_address)
                    .filter(|email| !email.is_empty()),
                comment: None,
                keep_forever: raw.keep_forever,
                metadata: Default::default(),
            })
            .collect();
        revisions.reverse();
        if limit > 0 {
            revisions.truncate(limit as usize);
        }
        Ok(revisions)
    }

    async fn get_all_document_revisions(&self, uuid: Uuid) -> Result<RevisionInfo> {
        let metadata = self.get_document_by_uuid(uuid).await?;
        let entries = self
            .get_revision_history(&metadata.provider_id, 0)
            .await?
            .into_iter()
            .map(|revision| RevisionEntry {
                provider_type: ProviderType::Google,
                provider_id: metadata.provider_id.clone(),
                content_hash: metadata.content_hash.clone(),
                sync_status: metadata.sync_status,
                revision,
            })
            .collect();
        Ok(RevisionInfo { uuid, entries })
    }
}

#[async_trait]
impl PermissionProvider for GoogleProvider {
    async fn list_permissions(&self, provider_id: &ProviderId) -> Result<Vec<FilePermission>> {
        let file_id = self.file_id(provider_id)?;
        let url = self.url(
            &format!("drive/v3/files/{file_id}/permissions"),
            &[("fields", "permissions(id,emailAddress,role,type)")],
        )?;
        let response = self.request(Method::GET, url, None, None).await?;
        let list: DrivePermissionList = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        Ok(list.permissions.into_iter().map(Self::permission_from).collect())
    }

    async fn grant_permission(
        &self,
        provider_id: &ProviderId,
        permission: &FilePermission,
    ) -> Result<FilePermission> {
        let file_id = self.file_id(provider_id)?;
        let role = match permission.role {
            PermissionRole::Owner => "owner",
            PermissionRole::Writer => "writer",
            PermissionRole::Reader => "reader",
        };
        let kind = match permission.permission_type {
            PermissionType::User => "user",
            PermissionType::Group => "group",
            PermissionType::Domain => "domain",
            PermissionType::Anyone => "anyone",
        };
        let url = self.url(
            &format!("drive/v3/files/{file_id}/permissions"),
            &[("fields", "id,emailAddress,role,type")],
        )?;
        let response = self
            .request(
                Method::POST,
                url,
                Some(serde_json::json!({
                    "emailAddress": permission.email,
                    "role": role,
                    "type": kind,
                })),
                None,
            )
            .await?;
        let raw: DrivePermission = response
            .json()
            .await
            .map_err(|e| Error::parse(format!("malformed Drive response: {e}")))?;
        Ok(Self::permission_from(raw))
    }

    async fn revoke_permission(
        &self,
        provider_id: &ProviderId,
        permission_id: &str,
    ) -> Result<()> {
        let file_id = self.file_id(provider_id)?;
        let url = self.url(
            &format!("drive/v3/files/{file_id}/permissions/{permission_id}"),
            &[],
        )?;
        self.request(Method::DELETE, url, None, None).await?;
        Ok(())
    }
}

#[async_trait]
impl PeopleProvider for GoogleProvider {
    async fn search_people(&self, _query: &str) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.config.name, "people"))
    }

    async fn get_person(&self, _email: &str) -> Result<UserIdentity> {
        Err(unsupported(&self.config.name, "people"))
    }

    async fn get_person_by_unified_id(&self, _unified_id: &str) -> Result<UserIdentity> {
        Err(unsupported(&self.config.name, "people"))
    }

    async fn resolve_identities(&self, _emails: &[String]) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.config.name, "people"))
    }
}

#[async_trait]
impl TeamProvider for GoogleProvider {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        Err(unsupported(&self.config.name, "teams"))
    }

    async fn get_team(&self, _team_id: &str) -> Result<Team> {
        Err(unsupported(&self.config.name, "teams"))
    }

    async fn get_teams_for_user(&self, _email: &str) -> Result<Vec<Team>> {
        Err(unsupported(&self.config.name, "teams"))
    }

    async fn list_team_members(&self, _team_id: &str) -> Result<Vec<UserIdentity>> {
        Err(unsupported(&self.config.name, "teams"))
    }
}

#[async_trait]
impl NotificationProvider for GoogleProvider {
    async fn send_notification(&self, _notification: &Notification) -> Result<()> {
        Err(unsupported(&self.config.name, "notifications"))
    }
}
