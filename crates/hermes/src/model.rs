//! Core data model: per-backend document projections, revisions, people,
//! and permissions.
//!
//! `DocumentMetadata` is a *projection*: one backend's view of a logical
//! document. The same UUID may have several projections with different
//! provider ids and sync statuses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::identity::{ProviderId, ProviderType};

/// Open metadata mapping carried alongside the core fields.
///
/// `BTreeMap` keeps serialization order deterministic.
pub type ExtendedMetadata = BTreeMap<String, serde_json::Value>;

/// Role of a backend projection relative to the document's canonical copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Canonical,
    Mirror,
    Conflict,
    Archived,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Canonical => "canonical",
            SyncStatus::Mirror => "mirror",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Archived => "archived",
        }
    }

    /// Parse a sync status from its lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" => Some(SyncStatus::Canonical),
            "mirror" => Some(SyncStatus::Mirror),
            "conflict" => Some(SyncStatus::Conflict),
            "archived" => Some(SyncStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body format of a document's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Markdown,
    Html,
    Plain,
    Richtext,
}

/// One backend's view of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Stable global identifier; equal UUIDs denote the same logical document
    pub uuid: Uuid,
    pub provider_type: ProviderType,
    pub provider_id: ProviderId,
    pub name: String,
    pub mime_type: String,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_team: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Free-form lifecycle label, e.g. "Draft" or "Approved"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_status: Option<String>,
    /// `sha256:<hex>` over the trimmed body
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended: ExtendedMetadata,
}

impl DocumentMetadata {
    /// Minimal projection used by adapters before backend fields are filled in.
    #[must_use]
    pub fn new(uuid: Uuid, provider_id: ProviderId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uuid,
            provider_type: provider_id.provider_type,
            provider_id,
            name: name.into(),
            mime_type: "text/markdown".to_string(),
            created_time: now,
            modified_time: now,
            owner: None,
            owning_team: None,
            contributors: Vec::new(),
            parents: Vec::new(),
            project: None,
            tags: Vec::new(),
            sync_status: SyncStatus::default(),
            workflow_status: None,
            content_hash: String::new(),
            extended: ExtendedMetadata::new(),
        }
    }

    /// Look up a matcher attribute by name.
    ///
    /// Core fields resolve under fixed names; `tag:<t>` tests tag membership;
    /// anything else falls through to scalar `extended` values rendered as
    /// strings.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<String> {
        match key {
            "uuid" => Some(self.uuid.to_string()),
            "provider_type" => Some(self.provider_type.to_string()),
            "provider_id" => Some(self.provider_id.to_string()),
            "name" | "title" => Some(self.name.clone()),
            "mime_type" => Some(self.mime_type.clone()),
            "owning_team" => self.owning_team.clone(),
            "project" => self.project.clone(),
            "sync_status" => Some(self.sync_status.to_string()),
            "workflow_status" => self.workflow_status.clone(),
            "content_hash" => Some(self.content_hash.clone()),
            _ => {
                if let Some(tag) = key.strip_prefix("tag:") {
                    return self
                        .tags
                        .iter()
                        .any(|t| t == tag)
                        .then(|| "true".to_string());
                }
                match self.extended.get(key) {
                    Some(serde_json::Value::String(s)) => Some(s.clone()),
                    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                    Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
                    _ => None,
                }
            }
        }
    }
}

/// A document's content at one backend revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub uuid: Uuid,
    pub provider_id: ProviderId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub format: DocumentFormat,
    pub content_hash: String,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<BackendRevision>,
}

/// A backend-native revision record.
///
/// `revision_id` is opaque and immutable once assigned; its format is
/// backend-defined (decimal string for Google, 40-char hex for git, a
/// semantic version or timestamp for Office 365).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRevision {
    pub provider_type: ProviderType,
    pub revision_id: String,
    pub modified_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_forever: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: ExtendedMetadata,
}

/// One (backend, revision, hash, status) tuple known for a UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub provider_type: ProviderType,
    pub provider_id: ProviderId,
    pub revision: BackendRevision,
    pub content_hash: String,
    pub sync_status: SyncStatus,
}

/// Cross-backend revision record for a single UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub uuid: Uuid,
    pub entries: Vec<RevisionEntry>,
}

/// A person, keyed by canonical email.
///
/// Alternates form a many-to-one relation back to the canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unified_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<AlternateIdentity>,
}

impl UserIdentity {
    #[must_use]
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            photo_url: None,
            unified_user_id: None,
            alternates: Vec::new(),
        }
    }
}

/// A provider-scoped alias of a canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateIdentity {
    pub email: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_user_id: Option<String>,
}

/// Access role on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionRole {
    Owner,
    Writer,
    Reader,
}

/// Grantee kind of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionType {
    User,
    Group,
    Domain,
    Anyone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePermission {
    pub id: String,
    pub email: String,
    pub role: PermissionRole,
    #[serde(rename = "type")]
    pub permission_type: PermissionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserIdentity>,
}

/// A team of people, as reported by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<UserIdentity>,
}

/// A notification to be delivered by a provider backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uuid: Option<Uuid>,
}

/// Compute the content hash of a document body: `sha256:<hex>` over the body
/// with trailing whitespace trimmed.
///
/// This is the single hash function used by the frontmatter codec, the
/// revision store, and the outbox idempotent keys, so two components never
/// disagree on a document's fingerprint.
#[must_use]
pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.trim_end().as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
