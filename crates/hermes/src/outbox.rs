//! Transactional outbox and event publication.
//!
//! Enrichment is decoupled from write paths through an outbox: the revision
//! row and its change event are written in one transaction, and a relay
//! drains pending events to an ordered message bus. Duplicate publication is
//! prevented by a unique idempotent key derived from (UUID, ContentHash).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::ProviderType;
use crate::store::{MemoryRevisionStore, RevisionStore, StoreOutcome, StoredRevision};

/// Default per-entry attempt budget before the relay flips it to `failed`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What happened to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

/// Publication state of an outbox entry. Transitions are monotone:
/// `pending -> published | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

/// One pending change event, written in the same transaction as the
/// revision it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub revision_id: String,
    pub document_uuid: Uuid,
    pub provider_type: ProviderType,
    pub content_hash: String,
    /// `H(UUID, ContentHash)`; at most one entry exists per key.
    pub idempotent_key: String,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive the idempotent key identifying one logical event.
#[must_use]
pub fn idempotent_key(uuid: Uuid, content_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(b":");
    hasher.update(content_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of appending to the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// An entry with this idempotent key already exists; the append was a
    /// successful no-op.
    Duplicate,
}

/// Durable outbox storage. The revision row and the outbox entry for it are
/// written atomically by [`OutboxStore::store_revision_with_event`].
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Write a revision and its outbox entry in one transaction.
    ///
    /// When the idempotent key already exists the call succeeds without
    /// writing a second entry.
    async fn store_revision_with_event(
        &self,
        revision: StoredRevision,
        entry: OutboxEntry,
    ) -> Result<AppendOutcome>;

    /// Pending entries in insertion order, up to `limit`.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    async fn mark_published(&self, idempotent_key: &str) -> Result<()>;

    /// Record a failed delivery attempt; returns the new attempt count.
    async fn record_failure(&self, idempotent_key: &str, reason: &str) -> Result<u32>;

    /// Flip an entry to `failed` once its retry budget is exhausted.
    async fn mark_failed(&self, idempotent_key: &str, reason: &str) -> Result<()>;

    /// Outbox entries for a document, any status.
    async fn entries_for_document(&self, uuid: Uuid) -> Result<Vec<OutboxEntry>>;
}

/// A message handed to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub message_id: Uuid,
    pub partition_key: String,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

/// Select the partition key for a message: document UUID when present, else
/// the first recipient identity, else the message id.
///
/// Deterministic: the same message always lands in the same partition, so
/// per-document ordering holds downstream.
#[must_use]
pub fn partition_key_for(
    document_uuid: Option<Uuid>,
    recipients: &[String],
    message_id: Uuid,
) -> String {
    if let Some(uuid) = document_uuid {
        return uuid.to_string();
    }
    if let Some(first) = recipients.first() {
        if !first.is_empty() {
            return first.clone();
        }
    }
    message_id.to_string()
}

impl BusMessage {
    /// Build a message from an outbox entry, deriving the partition key.
    #[must_use]
    pub fn from_entry(entry: &OutboxEntry) -> Self {
        let message_id = Uuid::new_v4();
        let partition_key = partition_key_for(Some(entry.document_uuid), &[], message_id);
        Self {
            message_id,
            partition_key,
            payload: serde_json::json!({
                "revision_id": entry.revision_id,
                "document_uuid": entry.document_uuid,
                "provider_type": entry.provider_type,
                "content_hash": entry.content_hash,
                "event_type": entry.event_type,
                "payload": entry.payload,
            }),
            document_uuid: Some(entry.document_uuid),
            recipients: Vec::new(),
        }
    }
}

/// Ordered, partitioned message bus contract.
///
/// Implementations guarantee that messages sharing a partition key are
/// delivered in publication order. `hermes-kafka` provides the production
/// implementation.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: BusMessage) -> Result<()>;
}

/// Writes revisions together with their change events.
///
/// Production deployments hand this the PostgreSQL store; the same object
/// also implements [`crate::store::RevisionStore`] so both rows land in one
/// transaction.
pub struct Publisher {
    store: Arc<dyn OutboxStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn OutboxStore>) -> Self {
        Self { store }
    }

    /// Persist a revision and enqueue its change event atomically.
    ///
    /// A second publish for the same (UUID, ContentHash) is a no-op that
    /// returns success.
    pub async fn publish_revision(
        &self,
        revision: StoredRevision,
        event_type: EventType,
    ) -> Result<AppendOutcome> {
        let now = Utc::now();
        let entry = OutboxEntry {
            revision_id: revision.revision.revision_id.clone(),
            document_uuid: revision.uuid,
            provider_type: revision.provider_type,
            content_hash: revision.content_hash.clone(),
            idempotent_key: idempotent_key(revision.uuid, &revision.content_hash),
            event_type,
            payload: serde_json::json!({
                "provider_id": revision.provider_id.to_string(),
            }),
            status: OutboxStatus::Pending,
            attempts: 0,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        let outcome = self
            .store
            .store_revision_with_event(revision, entry)
            .await?;
        if outcome == AppendOutcome::Duplicate {
            debug!("outbox entry already exists; publish is a no-op");
        }
        Ok(outcome)
    }
}

/// Drains pending outbox entries to the message bus.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    bus: Arc<dyn MessageBus>,
    /// Attempt budget per entry before it flips to `failed`.
    max_attempts: u32,
    /// Entries fetched per sweep.
    batch_size: usize,
}

impl OutboxRelay {
    pub fn new(store: Arc<dyn OutboxStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            store,
            bus,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_size: 100,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// One sweep: publish pending entries in insertion order.
    ///
    /// A failed publish leaves the entry pending for the next sweep until
    /// the attempt budget is exhausted, then flips it to `failed`. No entry
    /// is ever lost.
    pub async fn run_once(&self) -> Result<usize> {
        let pending = self.store.fetch_pending(self.batch_size).await?;
        let mut published = 0usize;
        for entry in pending {
            let message = BusMessage::from_entry(&entry);
            match self.bus.publish(message).await {
                Ok(()) => {
                    self.store.mark_published(&entry.idempotent_key).await?;
                    published += 1;
                }
                Err(err) => {
                    let attempts = self
                        .store
                        .record_failure(&entry.idempotent_key, &err.to_string())
                        .await?;
                    if attempts >= self.max_attempts {
                        warn!(
                            document = %entry.document_uuid,
                            attempts,
                            error = %err,
                            "outbox entry exhausted its retry budget"
                        );
                        self.store
                            .mark_failed(&entry.idempotent_key, &err.to_string())
                            .await?;
                    } else {
                        debug!(
                            document = %entry.document_uuid,
                            attempts,
                            error = %err,
                            "outbox publish failed; entry stays pending"
                        );
                    }
                }
            }
        }
        Ok(published)
    }

    /// Sweep forever at `interval` until the task is aborted.
    pub async fn run(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.run_once().await {
                Ok(published) if published > 0 => {
                    info!(published, "outbox sweep published entries");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "outbox sweep failed"),
            }
        }
    }
}

/// In-memory outbox store.
///
/// Also implements [`RevisionStore`] by delegation so one object can be
/// wired everywhere the PostgreSQL store would be; the entry lock stands in
/// for the database transaction.
#[derive(Default)]
pub struct MemoryOutboxStore {
    revisions: MemoryRevisionStore,
    entries: RwLock<Vec<OutboxEntry>>,
}

impl MemoryOutboxStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn store_revision_with_event(
        &self,
        revision: StoredRevision,
        entry: OutboxEntry,
    ) -> Result<AppendOutcome> {
        {
            let entries = self.entries.read();
            if entries
                .iter()
                .any(|e| e.idempotent_key == entry.idempotent_key)
            {
                return Ok(AppendOutcome::Duplicate);
            }
        }
        self.revisions.store_revision(revision).await?;
        self.entries.write().push(entry);
        Ok(AppendOutcome::Inserted)
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, idempotent_key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.idempotent_key == idempotent_key)
            .ok_or_else(|| Error::not_found(format!("outbox entry {idempotent_key}")))?;
        entry.status = OutboxStatus::Published;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn record_failure(&self, idempotent_key: &str, reason: &str) -> Result<u32> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.idempotent_key == idempotent_key)
            .ok_or_else(|| Error::not_found(format!("outbox entry {idempotent_key}")))?;
        entry.attempts += 1;
        entry.failure_reason = Some(reason.to_string());
        entry.updated_at = Utc::now();
        Ok(entry.attempts)
    }

    async fn mark_failed(&self, idempotent_key: &str, reason: &str) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.idempotent_key == idempotent_key)
            .ok_or_else(|| Error::not_found(format!("outbox entry {idempotent_key}")))?;
        entry.status = OutboxStatus::Failed;
        entry.failure_reason = Some(reason.to_string());
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn entries_for_document(&self, uuid: Uuid) -> Result<Vec<OutboxEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.document_uuid == uuid)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RevisionStore for MemoryOutboxStore {
    async fn store_revision(&self, revision: StoredRevision) -> Result<StoreOutcome> {
        self.revisions.store_revision(revision).await
    }

    async fn latest_revision(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
    ) -> Result<Option<StoredRevision>> {
        self.revisions.latest_revision(uuid, provider_type).await
    }

    async fn revisions_for_uuid(&self, uuid: Uuid) -> Result<Vec<StoredRevision>> {
        self.revisions.revisions_for_uuid(uuid).await
    }

    async fn revision_info(&self, uuid: Uuid) -> Result<crate::model::RevisionInfo> {
        self.revisions.revision_info(uuid).await
    }

    async fn detect_drift(&self, uuid: Uuid) -> Result<bool> {
        self.revisions.detect_drift(uuid).await
    }

    async fn attach_summary(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        summary: crate::ai::Summary,
    ) -> Result<()> {
        self.revisions.attach_summary(uuid, provider_type, summary).await
    }

    async fn attach_embeddings(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        embeddings: crate::ai::DocumentEmbeddings,
    ) -> Result<()> {
        self.revisions
            .attach_embeddings(uuid, provider_type, embeddings)
            .await
    }
}
