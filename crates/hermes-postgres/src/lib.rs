//! PostgreSQL persistence for Hermes.
//!
//! One store object backs four traits: revisions (`RevisionStore`), the
//! transactional outbox (`OutboxStore`), pipeline execution records
//! (`ExecutionStore`), and provider health persistence
//! (`ProviderStatusStore`). The revision row and its outbox entry are
//! written in a single database transaction, which is what makes event
//! publication exactly-once from the consumer's point of view.
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_postgres::PostgresStore;
//!
//! let store = PostgresStore::connect(
//!     "host=localhost user=hermes password=hermes dbname=hermes",
//! )
//! .await?;
//! let store = std::sync::Arc::new(store);
//! ```

mod error;

pub use error::PostgresError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

use hermes::ai::{DocumentEmbeddings, Summary};
use hermes::error::Result;
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{BackendRevision, RevisionEntry, RevisionInfo, SyncStatus};
use hermes::outbox::{AppendOutcome, OutboxEntry, OutboxStatus, OutboxStore};
use hermes::pipeline::{ExecutionStore, PipelineExecution};
use hermes::router::{HealthStatus, ProviderConfig, ProviderStatusStore};
use hermes::store::{RevisionStore, StoreOutcome, StoredRevision};

/// Validate a PostgreSQL identifier (schema prefix for the Hermes tables).
///
/// Identifiers must start with a letter or underscore, contain only
/// letters, digits, and underscores, and fit the 63-character limit.
fn validate_identifier(name: &str) -> std::result::Result<(), PostgresError> {
    if name.is_empty() {
        return Err(PostgresError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }
    if name.len() > 63 {
        return Err(PostgresError::InvalidIdentifier(format!(
            "identifier '{name}' exceeds 63 characters"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(PostgresError::InvalidIdentifier(format!(
            "identifier '{name}' must start with a letter or underscore"
        )));
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(PostgresError::InvalidIdentifier(format!(
                "identifier '{name}' contains invalid character '{c}'"
            )));
        }
    }
    Ok(())
}

/// PostgreSQL-backed store.
///
/// Tables (created on construction, prefixed with `table_prefix`):
/// `documents`, `document_revisions`, `document_summaries`,
/// `document_embeddings`, `outbox_entries` (unique `idempotent_key`),
/// `pipeline_executions` (append-only), `provider_storage` (updatable
/// health columns).
pub struct PostgresStore {
    client: Client,
    prefix: String,
    /// Serializes multi-statement transactions issued over the shared
    /// connection.
    tx_lock: tokio::sync::Mutex<()>,
}

impl PostgresStore {
    /// Connect and initialize the schema with the default `hermes_` table
    /// prefix.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        Self::connect_with_prefix(connection_string, "hermes").await
    }

    /// Connect with a custom table prefix (must be a valid SQL
    /// identifier).
    pub async fn connect_with_prefix(connection_string: &str, prefix: &str) -> Result<Self> {
        validate_identifier(prefix).map_err(hermes::Error::from)?;

        info!("connecting to PostgreSQL");
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| {
                error!("failed to connect to PostgreSQL: {e}");
                hermes::Error::from(PostgresError::Connection(e.to_string()))
            })?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {e}");
            }
        });

        let store = Self {
            client,
            prefix: prefix.to_string(),
            tx_lock: tokio::sync::Mutex::new(()),
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    fn table(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix)
    }

    async fn initialize_schema(&self) -> Result<()> {
        let revisions = self.table("document_revisions");
        let summaries = self.table("document_summaries");
        let embeddings = self.table("document_embeddings");
        let documents = self.table("documents");
        let outbox = self.table("outbox_entries");
        let executions = self.table("pipeline_executions");
        let providers = self.table("provider_storage");
        let schema = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {documents} (
                uuid UUID PRIMARY KEY,
                name TEXT NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE TABLE IF NOT EXISTS {revisions} (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL,
                provider_type TEXT NOT NULL,
                provider_id TEXT NOT NULL,
                revision_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                sync_status TEXT NOT NULL,
                revision JSONB NOT NULL,
                summary JSONB,
                embeddings JSONB,
                stored_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {revisions}_uuid_idx
                ON {revisions} (uuid, provider_type, id DESC);
            CREATE TABLE IF NOT EXISTS {summaries} (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL,
                provider_type TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                summary JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE TABLE IF NOT EXISTS {embeddings} (
                id BIGSERIAL PRIMARY KEY,
                uuid UUID NOT NULL,
                provider_type TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                embeddings JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE TABLE IF NOT EXISTS {outbox} (
                id BIGSERIAL PRIMARY KEY,
                idempotent_key TEXT NOT NULL UNIQUE,
                revision_id TEXT NOT NULL,
                document_uuid UUID NOT NULL,
                provider_type TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL,
                attempts INT NOT NULL DEFAULT 0,
                failure_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS {outbox}_pending_idx
                ON {outbox} (id) WHERE status = 'pending';
            CREATE TABLE IF NOT EXISTS {executions} (
                id BIGSERIAL PRIMARY KEY,
                revision_id TEXT NOT NULL,
                ruleset_name TEXT NOT NULL,
                document_uuid UUID NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                status TEXT NOT NULL,
                step_results JSONB NOT NULL,
                error_details TEXT
            );
            CREATE TABLE IF NOT EXISTS {providers} (
                name TEXT PRIMARY KEY,
                provider_type TEXT NOT NULL,
                is_primary BOOLEAN NOT NULL DEFAULT FALSE,
                is_writable BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL DEFAULT 'active',
                health TEXT NOT NULL DEFAULT 'healthy',
                last_health_check TIMESTAMPTZ
            );
            "#
        );
        self.client
            .batch_execute(&schema)
            .await
            .map_err(|e| hermes::Error::from(PostgresError::Schema(e.to_string())))?;
        debug!(prefix = %self.prefix, "schema initialized");
        Ok(())
    }

    /// Record a provider registration row; health sweeps update it in
    /// place.
    pub async fn upsert_provider(&self, config: &ProviderConfig) -> Result<()> {
        let providers = self.table("provider_storage");
        let statement = format!(
            "INSERT INTO {providers}
                 (name, provider_type, is_primary, is_writable, status, health, last_health_check)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (name) DO UPDATE SET
                 provider_type = EXCLUDED.provider_type,
                 is_primary = EXCLUDED.is_primary,
                 is_writable = EXCLUDED.is_writable,
                 status = EXCLUDED.status"
        );
        self.client
            .execute(
                &statement,
                &[
                    &config.name,
                    &config.provider_type.as_str(),
                    &config.is_primary,
                    &config.is_writable,
                    &to_json_text(&config.status)?,
                    &to_json_text(&config.health)?,
                    &config.last_health_check,
                ],
            )
            .await
            .map_err(|e| hermes::Error::from(PostgresError::from(e)))?;
        Ok(())
    }

    fn revision_from_row(row: &Row) -> Result<StoredRevision> {
        let uuid: Uuid = row.try_get("uuid").map_err(decode_err)?;
        let provider_type: String = row.try_get("provider_type").map_err(decode_err)?;
        let provider_id: String = row.try_get("provider_id").map_err(decode_err)?;
        let content_hash: String = row.try_get("content_hash").map_err(decode_err)?;
        let sync_status: String = row.try_get("sync_status").map_err(decode_err)?;
        let revision: serde_json::Value = row.try_get("revision").map_err(decode_err)?;
        let summary: Option<serde_json::Value> = row.try_get("summary").map_err(decode_err)?;
        let embeddings: Option<serde_json::Value> =
            row.try_get("embeddings").map_err(decode_err)?;
        let stored_at: DateTime<Utc> = row.try_get("stored_at").map_err(decode_err)?;

        Ok(StoredRevision {
            uuid,
            provider_type: provider_type.parse()?,
            provider_id: provider_id.parse::<ProviderId>()?,
            revision: serde_json::from_value::<BackendRevision>(revision)?,
            content_hash,
            sync_status: SyncStatus::parse(&sync_status).unwrap_or_default(),
            summary: summary
                .map(serde_json::from_value::<Summary>)
                .transpose()?,
            embeddings: embeddings
                .map(serde_json::from_value::<DocumentEmbeddings>)
                .transpose()?,
            stored_at,
        })
    }

    fn entry_from_row(row: &Row) -> Result<OutboxEntry> {
        let provider_type: String = row.try_get("provider_type").map_err(decode_err)?;
        let event_type: String = row.try_get("event_type").map_err(decode_err)?;
        let status: String = row.try_get("status").map_err(decode_err)?;
        let attempts: i32 = row.try_get("attempts").map_err(decode_err)?;
        Ok(OutboxEntry {
            revision_id: row.try_get("revision_id").map_err(decode_err)?,
            document_uuid: row.try_get("document_uuid").map_err(decode_err)?,
            provider_type: provider_type.parse()?,
            content_hash: row.try_get("content_hash").map_err(decode_err)?,
            idempotent_key: row.try_get("idempotent_key").map_err(decode_err)?,
            event_type: from_json_text(&event_type)?,
            payload: row.try_get("payload").map_err(decode_err)?,
            status: from_json_text(&status)?,
            attempts: attempts.max(0) as u32,
            failure_reason: row.try_get("failure_reason").map_err(decode_err)?,
            created_at: row.try_get("created_at").map_err(decode_err)?,
            updated_at: row.try_get("updated_at").map_err(decode_err)?,
        })
    }

    async fn insert_revision(&self, revision: &StoredRevision) -> Result<StoreOutcome> {
        let revisions = self.table("document_revisions");
        let latest = format!(
            "SELECT content_hash FROM {revisions}
             WHERE uuid = $1 AND provider_type = $2
             ORDER BY id DESC LIMIT 1"
        );
        let existing = self
            .client
            .query_opt(
                &latest,
                &[&revision.uuid, &revision.provider_type.as_str()],
            )
            .await
            .map_err(query_err)?;
        if let Some(row) = existing {
            let hash: String = row.try_get(0).map_err(decode_err)?;
            if hash == revision.content_hash {
                return Ok(StoreOutcome::Unchanged);
            }
        }

        let insert = format!(
            "INSERT INTO {revisions}
                 (uuid, provider_type, provider_id, revision_id, content_hash,
                  sync_status, revision, summary, embeddings, stored_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        self.client
            .execute(
                &insert,
                &[
                    &revision.uuid,
                    &revision.provider_type.as_str(),
                    &revision.provider_id.to_string(),
                    &revision.revision.revision_id,
                    &revision.content_hash,
                    &revision.sync_status.as_str(),
                    &serde_json::to_value(&revision.revision)?,
                    &revision
                        .summary
                        .as_ref()
                        .map(serde_json::to_value)
                        .transpose()?,
                    &revision
                        .embeddings
                        .as_ref()
                        .map(serde_json::to_value)
                        .transpose()?,
                    &revision.stored_at,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(StoreOutcome::Inserted)
    }
}

fn decode_err(err: tokio_postgres::Error) -> hermes::Error {
    PostgresError::Decode(err.to_string()).into()
}

fn query_err(err: tokio_postgres::Error) -> hermes::Error {
    PostgresError::Query(err.to_string()).into()
}

/// Serialize an enum to its serde string form (e.g. `pending`).
fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

/// Parse an enum from its serde string form.
fn from_json_text<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        text.to_string(),
    ))?)
}

#[async_trait]
impl RevisionStore for PostgresStore {
    async fn store_revision(&self, revision: StoredRevision) -> Result<StoreOutcome> {
        self.insert_revision(&revision).await
    }

    async fn latest_revision(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
    ) -> Result<Option<StoredRevision>> {
        let revisions = self.table("document_revisions");
        let statement = format!(
            "SELECT * FROM {revisions}
             WHERE uuid = $1 AND provider_type = $2
             ORDER BY id DESC LIMIT 1"
        );
        let row = self
            .client
            .query_opt(&statement, &[&uuid, &provider_type.as_str()])
            .await
            .map_err(query_err)?;
        row.map(|r| Self::revision_from_row(&r)).transpose()
    }

    async fn revisions_for_uuid(&self, uuid: Uuid) -> Result<Vec<StoredRevision>> {
        let revisions = self.table("document_revisions");
        let statement = format!("SELECT * FROM {revisions} WHERE uuid = $1 ORDER BY id ASC");
        let rows = self
            .client
            .query(&statement, &[&uuid])
            .await
            .map_err(query_err)?;
        rows.iter().map(Self::revision_from_row).collect()
    }

    async fn revision_info(&self, uuid: Uuid) -> Result<RevisionInfo> {
        let revisions = self.table("document_revisions");
        let statement = format!(
            "SELECT DISTINCT ON (provider_type) * FROM {revisions}
             WHERE uuid = $1
             ORDER BY provider_type, id DESC"
        );
        let rows = self
            .client
            .query(&statement, &[&uuid])
            .await
            .map_err(query_err)?;
        if rows.is_empty() {
            return Err(hermes::Error::not_found(format!(
                "revisions for document {uuid}"
            )));
        }
        let entries = rows
            .iter()
            .map(|row| {
                let stored = Self::revision_from_row(row)?;
                Ok(RevisionEntry {
                    provider_type: stored.provider_type,
                    provider_id: stored.provider_id,
                    revision: stored.revision,
                    content_hash: stored.content_hash,
                    sync_status: stored.sync_status,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RevisionInfo { uuid, entries })
    }

    async fn detect_drift(&self, uuid: Uuid) -> Result<bool> {
        let revisions = self.table("document_revisions");
        let latest = format!(
            "SELECT DISTINCT ON (provider_type) id, content_hash FROM {revisions}
             WHERE uuid = $1
             ORDER BY provider_type, id DESC"
        );
        let rows = self
            .client
            .query(&latest, &[&uuid])
            .await
            .map_err(query_err)?;
        if rows.len() < 2 {
            return Ok(false);
        }
        let hashes: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<_, String>("content_hash").map_err(decode_err))
            .collect::<Result<_>>()?;
        let drifted = hashes.windows(2).any(|pair| pair[0] != pair[1]);
        if drifted {
            let ids: Vec<i64> = rows
                .iter()
                .map(|row| row.try_get::<_, i64>("id").map_err(decode_err))
                .collect::<Result<_>>()?;
            let update = format!(
                "UPDATE {revisions} SET sync_status = 'conflict' WHERE id = ANY($1)"
            );
            self.client
                .execute(&update, &[&ids])
                .await
                .map_err(query_err)?;
        }
        Ok(drifted)
    }

    async fn attach_summary(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        summary: Summary,
    ) -> Result<()> {
        let revisions = self.table("document_revisions");
        let summaries = self.table("document_summaries");
        let summary_json = serde_json::to_value(&summary)?;
        let update = format!(
            "UPDATE {revisions} SET summary = $3
             WHERE id = (SELECT id FROM {revisions}
                         WHERE uuid = $1 AND provider_type = $2
                         ORDER BY id DESC LIMIT 1)
             RETURNING content_hash"
        );
        let row = self
            .client
            .query_opt(&update, &[&uuid, &provider_type.as_str(), &summary_json])
            .await
            .map_err(query_err)?
            .ok_or_else(|| {
                hermes::Error::not_found(format!("revision for {uuid} on {provider_type}"))
            })?;
        let content_hash: String = row.try_get(0).map_err(decode_err)?;
        let insert = format!(
            "INSERT INTO {summaries} (uuid, provider_type, content_hash, summary)
             VALUES ($1, $2, $3, $4)"
        );
        self.client
            .execute(
                &insert,
                &[&uuid, &provider_type.as_str(), &content_hash, &summary_json],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn attach_embeddings(
        &self,
        uuid: Uuid,
        provider_type: ProviderType,
        embeddings: DocumentEmbeddings,
    ) -> Result<()> {
        let revisions = self.table("document_revisions");
        let embeddings_table = self.table("document_embeddings");
        let embeddings_json = serde_json::to_value(&embeddings)?;
        let update = format!(
            "UPDATE {revisions} SET embeddings = $3
             WHERE id = (SELECT id FROM {revisions}
                         WHERE uuid = $1 AND provider_type = $2
                         ORDER BY id DESC LIMIT 1)
             RETURNING content_hash"
        );
        let row = self
            .client
            .query_opt(&update, &[&uuid, &provider_type.as_str(), &embeddings_json])
            .await
            .map_err(query_err)?
            .ok_or_else(|| {
                hermes::Error::not_found(format!("revision for {uuid} on {provider_type}"))
            })?;
        let content_hash: String = row.try_get(0).map_err(decode_err)?;
        let insert = format!(
            "INSERT INTO {embeddings_table} (uuid, provider_type, content_hash, embeddings)
             VALUES ($1, $2, $3, $4)"
        );
        self.client
            .execute(
                &insert,
                &[&uuid, &provider_type.as_str(), &content_hash, &embeddings_json],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn store_revision_with_event(
        &self,
        revision: StoredRevision,
        entry: OutboxEntry,
    ) -> Result<AppendOutcome> {
        // The shared connection pipelines statements; the lock keeps the
        // BEGIN..COMMIT window exclusive.
        let _guard = self.tx_lock.lock().await;
        let outbox = self.table("outbox_entries");

        self.client.batch_execute("BEGIN").await.map_err(query_err)?;
        let result: Result<AppendOutcome> = async {
            let insert = format!(
                "INSERT INTO {outbox}
                     (idempotent_key, revision_id, document_uuid, provider_type,
                      content_hash, event_type, payload, status, attempts,
                      failure_reason, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (idempotent_key) DO NOTHING"
            );
            let inserted = self
                .client
                .execute(
                    &insert,
                    &[
                        &entry.idempotent_key,
                        &entry.revision_id,
                        &entry.document_uuid,
                        &entry.provider_type.as_str(),
                        &entry.content_hash,
                        &to_json_text(&entry.event_type)?,
                        &entry.payload,
                        &to_json_text(&entry.status)?,
                        &(entry.attempts as i32),
                        &entry.failure_reason,
                        &entry.created_at,
                        &entry.updated_at,
                    ],
                )
                .await
                .map_err(query_err)?;
            if inserted == 0 {
                return Ok(AppendOutcome::Duplicate);
            }
            self.insert_revision(&revision).await?;
            Ok(AppendOutcome::Inserted)
        }
        .await;

        match &result {
            Ok(_) => {
                self.client
                    .batch_execute("COMMIT")
                    .await
                    .map_err(query_err)?;
            }
            Err(_) => {
                // Best effort; a failed ROLLBACK leaves the connection task
                // to clean up.
                let _ = self.client.batch_execute("ROLLBACK").await;
            }
        }
        result
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let outbox = self.table("outbox_entries");
        let statement = format!(
            "SELECT * FROM {outbox} WHERE status = 'pending' ORDER BY id ASC LIMIT $1"
        );
        let rows = self
            .client
            .query(&statement, &[&(limit as i64)])
            .await
            .map_err(query_err)?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn mark_published(&self, idempotent_key: &str) -> Result<()> {
        let outbox = self.table("outbox_entries");
        let statement = format!(
            "UPDATE {outbox} SET status = 'published', updated_at = now()
             WHERE idempotent_key = $1"
        );
        let updated = self
            .client
            .execute(&statement, &[&idempotent_key])
            .await
            .map_err(query_err)?;
        if updated == 0 {
            return Err(hermes::Error::not_found(format!(
                "outbox entry {idempotent_key}"
            )));
        }
        Ok(())
    }

    async fn record_failure(&self, idempotent_key: &str, reason: &str) -> Result<u32> {
        let outbox = self.table("outbox_entries");
        let statement = format!(
            "UPDATE {outbox}
             SET attempts = attempts + 1, failure_reason = $2, updated_at = now()
             WHERE idempotent_key = $1
             RETURNING attempts"
        );
        let row = self
            .client
            .query_opt(&statement, &[&idempotent_key, &reason])
            .await
            .map_err(query_err)?
            .ok_or_else(|| {
                hermes::Error::not_found(format!("outbox entry {idempotent_key}"))
            })?;
        let attempts: i32 = row.try_get(0).map_err(decode_err)?;
        Ok(attempts.max(0) as u32)
    }

    async fn mark_failed(&self, idempotent_key: &str, reason: &str) -> Result<()> {
        let outbox = self.table("outbox_entries");
        let statement = format!(
            "UPDATE {outbox}
             SET status = 'failed', failure_reason = $2, updated_at = now()
             WHERE idempotent_key = $1"
        );
        let updated = self
            .client
            .execute(&statement, &[&idempotent_key, &reason])
            .await
            .map_err(query_err)?;
        if updated == 0 {
            return Err(hermes::Error::not_found(format!(
                "outbox entry {idempotent_key}"
            )));
        }
        Ok(())
    }

    async fn entries_for_document(&self, uuid: Uuid) -> Result<Vec<OutboxEntry>> {
        let outbox = self.table("outbox_entries");
        let statement =
            format!("SELECT * FROM {outbox} WHERE document_uuid = $1 ORDER BY id ASC");
        let rows = self
            .client
            .query(&statement, &[&uuid])
            .await
            .map_err(query_err)?;
        rows.iter().map(Self::entry_from_row).collect()
    }
}

#[async_trait]
impl ExecutionStore for PostgresStore {
    async fn record_execution(&self, execution: PipelineExecution) -> Result<()> {
        let executions = self.table("pipeline_executions");
        let statement = format!(
            "INSERT INTO {executions}
                 (revision_id, ruleset_name, document_uuid, started_at,
                  completed_at, status, step_results, error_details)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        self.client
            .execute(
                &statement,
                &[
                    &execution.revision_id,
                    &execution.ruleset_name,
                    &execution.document_uuid,
                    &execution.started_at,
                    &execution.completed_at,
                    &to_json_text(&execution.status)?,
                    &serde_json::to_value(&execution.step_results)?,
                    &execution.error_details,
                ],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn executions_for_document(&self, uuid: Uuid) -> Result<Vec<PipelineExecution>> {
        let executions = self.table("pipeline_executions");
        let statement =
            format!("SELECT * FROM {executions} WHERE document_uuid = $1 ORDER BY id ASC");
        let rows = self
            .client
            .query(&statement, &[&uuid])
            .await
            .map_err(query_err)?;
        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(decode_err)?;
                let step_results: serde_json::Value =
                    row.try_get("step_results").map_err(decode_err)?;
                Ok(PipelineExecution {
                    revision_id: row.try_get("revision_id").map_err(decode_err)?,
                    ruleset_name: row.try_get("ruleset_name").map_err(decode_err)?,
                    document_uuid: row.try_get("document_uuid").map_err(decode_err)?,
                    started_at: row.try_get("started_at").map_err(decode_err)?,
                    completed_at: row.try_get("completed_at").map_err(decode_err)?,
                    status: from_json_text(&status)?,
                    step_results: serde_json::from_value(step_results)?,
                    error_details: row.try_get("error_details").map_err(decode_err)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProviderStatusStore for PostgresStore {
    async fn record_health(
        &self,
        provider: &str,
        health: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let providers = self.table("provider_storage");
        let statement = format!(
            "UPDATE {providers} SET health = $2, last_health_check = $3 WHERE name = $1"
        );
        self.client
            .execute(
                &statement,
                &[&provider, &to_json_text(&health)?, &checked_at],
            )
            .await
            .map_err(query_err)?;
        Ok(())
    }
}
