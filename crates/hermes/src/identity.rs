//! Stable document identity.
//!
//! A document's UUID is global and survives moves between backends; a
//! [`ProviderId`] locates one projection of the document inside a single
//! backend. A [`CompositeId`] combines both with an optional revision marker
//! and is the key used for point lookups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Mint a new random document UUID. Never returns the nil UUID.
#[must_use]
pub fn new_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Parse a document UUID from its canonical hyphenated form.
///
/// The nil UUID is rejected: it is never a valid document identifier.
pub fn parse_uuid(s: &str) -> Result<Uuid> {
    let uuid = Uuid::parse_str(s.trim())
        .map_err(|e| Error::invalid_argument(format!("malformed UUID '{s}': {e}")))?;
    if uuid.is_nil() {
        return Err(Error::invalid_argument("the nil UUID is not a valid document identifier"));
    }
    Ok(uuid)
}

/// The closed set of backend families Hermes knows how to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Google Workspace (Drive)
    Google,
    /// Local filesystem
    Local,
    /// Remote Hermes peer over HTTP
    Remote,
    /// GitHub-backed documents
    Github,
    /// Microsoft Office 365
    Office365,
}

impl ProviderType {
    /// All known provider types, in routing order.
    pub const ALL: [ProviderType; 5] = [
        ProviderType::Google,
        ProviderType::Local,
        ProviderType::Remote,
        ProviderType::Github,
        ProviderType::Office365,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Google => "google",
            ProviderType::Local => "local",
            ProviderType::Remote => "remote",
            ProviderType::Github => "github",
            ProviderType::Office365 => "office365",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(ProviderType::Google),
            "local" => Ok(ProviderType::Local),
            "remote" => Ok(ProviderType::Remote),
            "github" | "git" => Ok(ProviderType::Github),
            "office365" => Ok(ProviderType::Office365),
            other => Err(Error::invalid_argument(format!(
                "unknown provider type '{other}'"
            ))),
        }
    }
}

/// Tagged backend locator: `<provider-type>:<backend-specific-id>`.
///
/// The backend-specific portion is opaque to the core and may itself contain
/// `:` characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId {
    pub provider_type: ProviderType,
    pub id: String,
}

impl ProviderId {
    /// Build a provider id, rejecting empty backend ids.
    pub fn new(provider_type: ProviderType, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::invalid_argument(format!(
                "empty backend id for provider type '{provider_type}'"
            )));
        }
        Ok(Self { provider_type, id })
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider_type, self.id)
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s.split_once(':').ok_or_else(|| {
            Error::invalid_argument(format!("provider id '{s}' lacks a '<type>:' prefix"))
        })?;
        ProviderId::new(kind.parse()?, id)
    }
}

/// (UUID, ProviderId, optional revision) lookup key.
///
/// This is a relation, not an owning object: it names where to find one
/// revision of a document inside one backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeId {
    pub uuid: Uuid,
    pub provider_id: ProviderId,
    pub revision: Option<String>,
}

impl CompositeId {
    #[must_use]
    pub fn new(uuid: Uuid, provider_id: ProviderId, revision: Option<String>) -> Self {
        Self {
            uuid,
            provider_id,
            revision,
        }
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "{}@{}#{}", self.uuid, self.provider_id, rev),
            None => write!(f, "{}@{}", self.uuid, self.provider_id),
        }
    }
}
