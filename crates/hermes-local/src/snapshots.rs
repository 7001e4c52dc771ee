//! Content-addressed revision snapshots for the filesystem adapter.
//!
//! The filesystem has no native revision history. When a snapshot directory
//! is configured, every content update writes one immutable snapshot file
//! and history is served newest-first from the directory listing. Snapshot
//! ids are opaque: `<unix-millis>-<hash-prefix>`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hermes::error::{Error, Result};
use hermes::identity::{ProviderId, ProviderType};
use hermes::model::{content_hash, BackendRevision};
use sha2::{Digest, Sha256};

pub(crate) struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding snapshots for one document, keyed by a digest of
    /// its backend id so arbitrary paths stay filesystem-safe.
    fn document_dir(&self, provider_id: &ProviderId) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.id.as_bytes());
        self.dir.join(hex::encode(&hasher.finalize()[..16]))
    }

    /// Write one snapshot of `body`. Re-snapshotting identical content is a
    /// no-op returning the existing revision.
    pub(crate) async fn snapshot(
        &self,
        provider_id: &ProviderId,
        body: &str,
    ) -> Result<BackendRevision> {
        let hash = content_hash(body);
        if let Some(existing) = self
            .history(provider_id, 0)
            .await?
            .into_iter()
            .find(|r| r.metadata.get("content_hash").and_then(|v| v.as_str()) == Some(&hash))
        {
            return Ok(existing);
        }

        let dir = self.document_dir(provider_id);
        tokio::fs::create_dir_all(&dir).await?;
        let now = Utc::now();
        let short = hash
            .strip_prefix("sha256:")
            .unwrap_or(&hash)
            .chars()
            .take(12)
            .collect::<String>();
        let revision_id = format!("{}-{short}", now.timestamp_millis());
        tokio::fs::write(dir.join(format!("{revision_id}.md")), body).await?;
        Ok(self.revision(provider_id, &revision_id, now, &hash))
    }

    /// Snapshots newest-first. `limit <= 0` means unbounded.
    pub(crate) async fn history(
        &self,
        provider_id: &ProviderId,
        limit: i64,
    ) -> Result<Vec<BackendRevision>> {
        let dir = self.document_dir(provider_id);
        let mut names: Vec<String> = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(ToString::to_string)
            {
                names.push(name);
            }
        }
        // Ids are prefixed with a millisecond timestamp, so the
        // lexicographic-by-numeric-prefix sort yields age order.
        names.sort_by_key(|name| {
            name.split('-')
                .next()
                .and_then(|p| p.parse::<i64>().ok())
                .unwrap_or(0)
        });
        names.reverse();

        let mut revisions = Vec::new();
        for name in names {
            if limit > 0 && revisions.len() as i64 >= limit {
                break;
            }
            let body = tokio::fs::read_to_string(dir.join(format!("{name}.md"))).await?;
            let millis = name
                .split('-')
                .next()
                .and_then(|p| p.parse::<i64>().ok())
                .unwrap_or(0);
            let modified = DateTime::<Utc>::from_timestamp_millis(millis)
                .unwrap_or_else(Utc::now);
            revisions.push(self.revision(provider_id, &name, modified, &content_hash(&body)));
        }
        Ok(revisions)
    }

    /// Body of one snapshot.
    pub(crate) async fn read(
        &self,
        provider_id: &ProviderId,
        revision_id: &str,
    ) -> Result<String> {
        let path = self.document_dir(provider_id).join(format!("{revision_id}.md"));
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(
                format!("snapshot '{revision_id}' of '{provider_id}'"),
            )),
            Err(err) => Err(err.into()),
        }
    }

    fn revision(
        &self,
        provider_id: &ProviderId,
        revision_id: &str,
        modified: DateTime<Utc>,
        hash: &str,
    ) -> BackendRevision {
        let mut metadata = hermes::model::ExtendedMetadata::new();
        metadata.insert(
            "content_hash".to_string(),
            serde_json::Value::String(hash.to_string()),
        );
        metadata.insert(
            "document".to_string(),
            serde_json::Value::String(provider_id.to_string()),
        );
        BackendRevision {
            provider_type: ProviderType::Local,
            revision_id: revision_id.to_string(),
            modified_time: modified,
            modified_by: None,
            comment: None,
            keep_forever: None,
            metadata,
        }
    }
}

pub(crate) fn snapshot_root(base: &Path) -> PathBuf {
    base.join(".hermes-snapshots")
}
