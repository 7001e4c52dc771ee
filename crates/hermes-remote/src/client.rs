//! HTTP client plumbing and the provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use hermes::constants::{MAX_IDLE_CONNS_PER_HOST, PEER_TIMEOUT, POOL_IDLE_TIMEOUT};
use hermes::error::{Error, Result};
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{
    BackendRevision, DocumentContent, DocumentMetadata, FilePermission, Notification,
    RevisionInfo, Team, UserIdentity,
};
use hermes::provider::{
    unsupported, ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
    PermissionProvider, RevisionTrackingProvider, TeamProvider,
};
use hermes::retry::{with_retry, RetryPolicy};

/// Capability manifest served by the peer at `GET /api/v2/capabilities`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityManifest {
    pub content: bool,
    pub permissions: bool,
    pub directory: bool,
    pub groups: bool,
    pub email: bool,
    pub revisions: bool,
}

/// Connection settings for a remote peer.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Peer base URL, e.g. `https://hermes.peer.example`.
    pub base_url: String,
    /// Bearer credential sent on every request.
    pub token: String,
    /// Registry name of this adapter instance.
    pub name: String,
    /// Connection-level timeout.
    pub timeout: Duration,
    /// Retry budget for idempotent requests.
    pub max_retries: u32,
    /// Base delay for the linear retry schedule.
    pub retry_base: Duration,
    /// Verify the peer's TLS certificate. On by default; disable only for
    /// test rigs.
    pub verify_tls: bool,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            name: "remote".to_string(),
            timeout: PEER_TIMEOUT,
            max_retries: 3,
            retry_base: Duration::from_millis(250),
            verify_tls: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    #[must_use]
    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }
}

/// Structured error body the peer returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// A provider delegating everything to a remote Hermes peer.
pub struct RemoteProvider {
    config: RemoteConfig,
    base: Url,
    http: reqwest::Client,
    capabilities: CapabilityManifest,
    retry_policy: RetryPolicy,
}

impl RemoteProvider {
    /// Connect to the peer: build the pooled client and fetch the
    /// capability manifest.
    pub async fn connect(config: RemoteConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            Error::invalid_argument(format!("invalid peer URL '{}': {e}", config.base_url))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNS_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        let retry_policy = RetryPolicy::linear(config.max_retries, config.retry_base);

        let mut provider = Self {
            base,
            http,
            capabilities: CapabilityManifest::default(),
            retry_policy,
            config,
        };
        provider.capabilities = provider
            .get_json::<CapabilityManifest>("api/v2/capabilities")
            .await?;
        debug!(peer = %provider.config.base_url, capabilities = ?provider.capabilities, "connected to peer");
        Ok(provider)
    }

    /// Capabilities advertised by the peer.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityManifest {
        self.capabilities
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::invalid_argument(format!("invalid request path '{path}': {e}")))
    }

    fn require(&self, enabled: bool, capability: &str) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(unsupported(&self.config.name, capability))
        }
    }

    /// Percent-encode one path segment (backend ids may contain slashes).
    fn segment(raw: &str) -> String {
        raw.bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                other => format!("%{other:02X}"),
            })
            .collect()
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let url = self.url(path)?;
        let idempotent = method == Method::GET
            || method == Method::HEAD
            || method == Method::PUT
            || method == Method::DELETE;

        let attempt = || async {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.config.token)
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|err| {
                if err.is_timeout() {
                    Error::timeout(self.config.timeout, format!("request to peer '{url}'"))
                } else {
                    Error::transient(format!("transport error calling peer: {err}"))
                }
            })?;
            Self::decode(response).await
        };

        if idempotent {
            with_retry(&self.retry_policy, attempt).await
        } else {
            attempt().await
        }
    }

    async fn decode(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(serde_json::Value::Null);
            }
            return response
                .json()
                .await
                .map_err(|e| Error::parse(format!("malformed peer response: {e}")));
        }

        let message = match response.json::<serde_json::Value>().await {
            Ok(body) => match serde_json::from_value::<ApiError>(
                body.get("error").cloned().unwrap_or(body),
            ) {
                Ok(api) if !api.message.is_empty() => {
                    if let Some(err) = Self::classify_kind(&api.kind, &api.message) {
                        return Err(err);
                    }
                    api.message
                }
                _ => format!("peer returned {status}"),
            },
            Err(_) => format!("peer returned {status}"),
        };

        Err(match status {
            StatusCode::NOT_FOUND => Error::not_found(message),
            StatusCode::CONFLICT => Error::conflict(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::unauthorized(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Error::invalid_argument(message)
            }
            StatusCode::REQUEST_TIMEOUT => Error::timeout(Duration::ZERO, message),
            StatusCode::NOT_IMPLEMENTED => Error::not_supported(message),
            status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                Error::transient(message)
            }
            _ => Error::internal(message),
        })
    }

    /// The peer reports its own taxonomy; trust it when present.
    fn classify_kind(kind: &str, message: &str) -> Option<Error> {
        match kind {
            "not_found" => Some(Error::not_found(message)),
            "already_exists" => Some(Error::already_exists(message)),
            "invalid_argument" => Some(Error::invalid_argument(message)),
            "unauthorized" => Some(Error::unauthorized(message)),
            "not_supported" => Some(Error::not_supported(message)),
            "conflict" => Some(Error::conflict(message)),
            "ambiguous_identity" => Some(Error::ambiguous_identity(message)),
            "transient" => Some(Error::transient(message)),
            _ => None,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.send(Method::GET, path, None).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("malformed peer response: {e}")))
    }

    async fn send_typed<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let value = self.send(method, path, Some(body)).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("malformed peer response: {e}")))
    }

    fn document_path(provider_id: &ProviderId) -> String {
        format!(
            "api/v2/documents/{}",
            Self::segment(&provider_id.to_string())
        )
    }
}

#[async_trait]
impl DocumentProvider for RemoteProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Remote
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        self.get_json(&Self::document_path(provider_id)).await
    }

    async fn get_document_by_uuid(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        self.get_json(&format!("api/v2/documents/by-uuid/{uuid}")).await
    }

    async fn create_document(
        &self,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            "api/v2/documents",
            &serde_json::json!({ "name": name, "parent": parent, "body": body }),
        )
        .await
    }

    async fn create_document_with_uuid(
        &self,
        uuid: Uuid,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            "api/v2/documents",
            &serde_json::json!({ "uuid": uuid, "name": name, "parent": parent, "body": body }),
        )
        .await
    }

    async fn register_document(&self, metadata: &DocumentMetadata) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            "api/v2/documents/register",
            &serde_json::to_value(metadata)?,
        )
        .await
    }

    async fn copy_document(
        &self,
        source: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            &format!("{}/copy", Self::document_path(source)),
            &serde_json::json!({ "name": new_name }),
        )
        .await
    }

    async fn move_document(
        &self,
        provider_id: &ProviderId,
        new_parent: &str,
    ) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            &format!("{}/move", Self::document_path(provider_id)),
            &serde_json::json!({ "parent": new_parent }),
        )
        .await
    }

    async fn rename_document(
        &self,
        provider_id: &ProviderId,
        new_name: &str,
    ) -> Result<DocumentMetadata> {
        self.send_typed(
            Method::POST,
            &format!("{}/rename", Self::document_path(provider_id)),
            &serde_json::json!({ "name": new_name }),
        )
        .await
    }

    async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
        let value = self
            .send(Method::DELETE, &Self::document_path(provider_id), None)
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::parse(format!("malformed peer response: {e}")))
    }
}

#[async_trait]
impl ContentProvider for RemoteProvider {
    async fn get_content(&self, provider_id: &ProviderId) -> Result<DocumentContent> {
        self.require(self.capabilities.content, "content")?;
        self.get_json(&format!("{}/content", Self::document_path(provider_id)))
            .await
    }

    async fn update_content(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<DocumentContent> {
        self.require(self.capabilities.content, "content")?;
        self.send_typed(
            Method::PUT,
            &format!("{}/content", Self::document_path(provider_id)),
            &serde_json::json!({ "body": body }),
        )
        .await
    }
}

#[async_trait]
impl RevisionTrackingProvider for RemoteProvider {
    async fn get_revision_history(
        &self,
        provider_id: &ProviderId,
        limit: i64,
    ) -> Result<Vec<BackendRevision>> {
        self.require(self.capabilities.revisions, "revision history")?;
        self.get_json(&format!(
            "{}/revisions?limit={limit}",
            Self::document_path(provider_id)
        ))
        .await
    }

    async fn get_all_document_revisions(&self, uuid: Uuid) -> Result<RevisionInfo> {
        self.require(self.capabilities.revisions, "revision history")?;
        self.get_json(&format!("api/v2/documents/by-uuid/{uuid}/revisions"))
            .await
    }
}

#[async_trait]
impl PermissionProvider for RemoteProvider {
    async fn list_permissions(&self, provider_id: &ProviderId) -> Result<Vec<FilePermission>> {
        self.require(self.capabilities.permissions, "permissions")?;
        self.get_json(&format!("{}/permissions", Self::document_path(provider_id)))
            .await
    }

    async fn grant_permission(
        &self,
        provider_id: &ProviderId,
        permission: &FilePermission,
    ) -> Result<FilePermission> {
        self.require(self.capabilities.permissions, "permissions")?;
        self.send_typed(
            Method::POST,
            &format!("{}/permissions", Self::document_path(provider_id)),
            &serde_json::to_value(permission)?,
        )
        .await
    }

    async fn revoke_permission(
        &self,
        provider_id: &ProviderId,
        permission_id: &str,
    ) -> Result<()> {
        self.require(self.capabilities.permissions, "permissions")?;
        self.send(
            Method::DELETE,
            &format!(
                "{}/permissions/{}",
                Self::document_path(provider_id),
                Self::segment(permission_id)
            ),
            None,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PeopleProvider for RemoteProvider {
    async fn search_people(&self, query: &str) -> Result<Vec<UserIdentity>> {
        self.require(self.capabilities.directory, "people")?;
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("q", query)
            .finish();
        self.get_json(&format!("api/v2/people/search?{encoded}")).await
    }

    async fn get_person(&self, email: &str) -> Result<UserIdentity> {
        self.require(self.capabilities.directory, "people")?;
        self.get_json(&format!("api/v2/people/{}", Self::segment(email)))
            .await
    }

    async fn get_person_by_unified_id(&self, unified_id: &str) -> Result<UserIdentity> {
        self.require(self.capabilities.directory, "people")?;
        self.get_json(&format!(
            "api/v2/people/unified/{}",
            Self::segment(unified_id)
        ))
        .await
    }

    async fn resolve_identities(&self, emails: &[String]) -> Result<Vec<UserIdentity>> {
        self.require(self.capabilities.directory, "people")?;
        self.send_typed(
            Method::POST,
            "api/v2/people/resolve",
            &serde_json::json!({ "emails": emails }),
        )
        .await
    }
}

#[async_trait]
impl TeamProvider for RemoteProvider {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        self.require(self.capabilities.groups, "teams")?;
        self.get_json("api/v2/teams").await
    }

    async fn get_team(&self, team_id: &str) -> Result<Team> {
        self.require(self.capabilities.groups, "teams")?;
        self.get_json(&format!("api/v2/teams/{}", Self::segment(team_id)))
            .await
    }

    async fn get_teams_for_user(&self, email: &str) -> Result<Vec<Team>> {
        self.require(self.capabilities.groups, "teams")?;
        self.get_json(&format!("api/v2/teams/user/{}", Self::segment(email)))
            .await
    }

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<UserIdentity>> {
        self.require(self.capabilities.groups, "teams")?;
        self.get_json(&format!("api/v2/teams/{}/members", Self::segment(team_id)))
            .await
    }
}

#[async_trait]
impl NotificationProvider for RemoteProvider {
    async fn send_notification(&self, notification: &Notification) -> Result<()> {
        self.require(self.capabilities.email, "notifications")?;
        self.send(
            Method::POST,
            "api/v2/notifications",
            Some(&serde_json::to_value(notification)?),
        )
        .await?;
        Ok(())
    }
}
