//! Revision persistence and drift detection.
//!
//! The traits live here; PostgreSQL implementations live in
//! `hermes-postgres`. The in-memory implementations back tests and
//! single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::{DocumentEmbeddings, Summary};
use crate::error::{Error, Result};
use crate::identity::{ProviderId, ProviderType};
use crate::model::{BackendRevision, RevisionEntry, RevisionInfo, SyncStatus};

/// One persisted revision row: a (UUID, backend) pair at a content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRevision {
    pub uuid: Uuid,
    pub provider_type: ProviderType,
    pub provider_id: ProviderId,
    pub revision: BackendRevision,
    pub content_hash: String,
    pub sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<DocumentEmbeddings>,
    pub stored_at: DateTime<Utc>,
}

/// Outcome of [`RevisionStore::store_revision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A new row was written.
    Inserted,
    /// The latest row for (UUID, provider type) already carries this
    /// content hash; nothing was written.
    Unchanged,
}

/// Per-(UUID, backend) revision persistence.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Persist a revision. Idempotent: storing the same content hash on top
    /// of itself is a no-op reported as [`StoreOutcome::Unchanged`].
    async fn store_revision(&self, revision: StoredRevision) -> Result<StoreOutcome>;

    /// Latest stored revision for a (UUID, provider type) pair.
    async fn latest_revision(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
    ) -> Result<Option<StoredRevision>>;

    /// Every stored revision for a UUID, oldest first.
    async fn revisions_for_uuid(&self, uuid: Uuid) -> Result<Vec<StoredRevision>>;

    /// Cross-backend revision record: the latest row per backend.
    async fn revision_info(&self, uuid: Uuid) -> Result<RevisionInfo>;

    /// Compare the latest rows for a UUID across provider types. When two
    /// backends disagree on the content hash, both rows are marked
    /// `SyncStatus::Conflict` in place. Returns whether drift was found;
    /// reconciliation is the caller's concern.
    async fn detect_drift(&self, uuid: Uuid) -> Result<bool>;

    /// Attach a generated summary to the latest revision.
    async fn attach_summary(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        summary: Summary,
    ) -> Result<()>;

    /// Attach generated embeddings to the latest revision.
    async fn attach_embeddings(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        embeddings: DocumentEmbeddings,
    ) -> Result<()>;
}

/// In-memory revision store.
#[derive(Default)]
pub struct MemoryRevisionStore {
    rows: RwLock<HashMap<Uuid, Vec<StoredRevision>>>,
}

impl MemoryRevisionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn latest_index_for(rows: &[StoredRevision], provider_type: ProviderType) -> Option<usize> {
        rows.iter()
            .rposition(|r| r.provider_type == provider_type)
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn store_revision(&self, revision: StoredRevision) -> Result<StoreOutcome> {
        let mut rows = self.rows.write();
        let entries = rows.entry(revision.uuid).or_default();
        if let Some(idx) = Self::latest_index_for(entries, revision.provider_type) {
            if entries[idx].content_hash == revision.content_hash {
                return Ok(StoreOutcome::Unchanged);
            }
        }
        entries.push(revision);
        Ok(StoreOutcome::Inserted)
    }

    async fn latest_revision(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
    ) -> Result<Option<StoredRevision>> {
        let rows = self.rows.read();
        Ok(rows.get(&uuid).and_then(|entries| {
            Self::latest_index_for(entries, provider_type).map(|i| entries[i].clone())
        }))
    }

    async fn revisions_for_uuid(&self, uuid: Uuid) -> Result<Vec<StoredRevision>> {
        Ok(self.rows.read().get(&uuid).cloned().unwrap_or_default())
    }

    async fn revision_info(&self, uuid: Uuid) -> Result<RevisionInfo> {
        let rows = self.rows.read();
        let entries = rows
            .get(&uuid)
            .ok_or_else(|| Error::not_found(format!("revisions for document {uuid}")))?;
        let mut latest: HashMap<ProviderType, &StoredRevision> = HashMap::new();
        for row in entries {
            latest.insert(row.provider_type, row);
        }
        let mut info_entries: Vec<RevisionEntry> = latest
            .into_values()
            .map(|row| RevisionEntry {
                provider_type: row.provider_type,
                provider_id: row.provider_id.clone(),
                revision: row.revision.clone(),
                content_hash: row.content_hash.clone(),
                sync_status: row.sync_status,
            })
            .collect();
        info_entries.sort_by_key(|e| e.provider_type);
        Ok(RevisionInfo {
            uuid,
            entries: info_entries,
        })
    }

    async fn detect_drift(&self, uuid: Uuid) -> Result<bool> {
        let mut rows = self.rows.write();
        let Some(entries) = rows.get_mut(&uuid) else {
            return Ok(false);
        };
        let mut latest: HashMap<ProviderType, usize> = HashMap::new();
        for (idx, row) in entries.iter().enumerate() {
            latest.insert(row.provider_type, idx);
        }
        if latest.len() < 2 {
            return Ok(false);
        }
        let hashes: Vec<&str> = latest
            .values()
            .map(|&i| entries[i].content_hash.as_str())
            .collect();
        let drifted = hashes.windows(2).any(|pair| pair[0] != pair[1]);
        if drifted {
            for &idx in latest.values() {
                entries[idx].sync_status = SyncStatus::Conflict;
            }
        }
        Ok(drifted)
    }

    async fn attach_summary(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        summary: Summary,
    ) -> Result<()> {
        let mut rows = self.rows.write();
        let entries = rows
            .get_mut(&uuid)
            .ok_or_else(|| Error::not_found(format!("revisions for document {uuid}")))?;
        let idx = Self::latest_index_for(entries, provider_type)
            .ok_or_else(|| Error::not_found(format!("revision for {uuid} on {provider_type}")))?;
        entries[idx].summary = Some(summary);
        Ok(())
    }

    async fn attach_embeddings(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        embeddings: DocumentEmbeddings,
    ) -> Result<()> {
        let mut rows = self.rows.write();
        let entries = rows
            .get_mut(&uuid)
            .ok_or_else(|| Error::not_found(format!("revisions for document {uuid}")))?;
        let idx = Self::latest_index_for(entries, provider_type)
            .ok_or_else(|| Error::not_found(format!("revision for {uuid} on {provider_type}")))?;
        entries[idx].embeddings = Some(embeddings);
        Ok(())
    }
}
