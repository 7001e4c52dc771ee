//! Multi-provider router.
//!
//! Providers are registered once at startup and read frequently; the
//! registry lives behind a reader-writer lock and is snapshotted before any
//! I/O, so the lock is never held across a provider call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constants::{HEALTH_CHECK_INTERVAL, HEALTH_CHECK_TIMEOUT};
use crate::error::{Error, Result};
use crate::identity::{self, ProviderType};
use crate::model::{DocumentContent, DocumentMetadata};
use crate::provider::WorkspaceProvider;

/// How reads are dispatched across providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// Reads go to the single active primary.
    PrimaryOnly,
    /// Try the primary, then the remaining active providers in insertion
    /// order.
    #[default]
    PrimaryThenFallback,
    /// Try every currently healthy provider, first success wins.
    LoadBalance,
}

/// How writes are dispatched across providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Writes go to the single active, writable primary.
    #[default]
    PrimaryOnly,
    /// Writes fan out to every active, writable provider concurrently.
    AllWritable,
    /// Same as `all_writable` today; a restricted mirror set is a future
    /// extension.
    Mirror,
}

/// Administrative state of a registered provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[default]
    Active,
    Readonly,
    Disabled,
    Migrating,
}

/// Observed health of a registered provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

/// Registration record for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub provider_type: ProviderType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub is_writable: bool,
    #[serde(default)]
    pub status: ProviderStatus,
    #[serde(default)]
    pub health: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            name: name.into(),
            provider_type,
            is_primary: false,
            is_writable: false,
            status: ProviderStatus::Active,
            health: HealthStatus::Healthy,
            last_health_check: None,
        }
    }

    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    #[must_use]
    pub fn writable(mut self) -> Self {
        self.is_writable = true;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ProviderStatus) -> Self {
        self.status = status;
        self
    }

    fn is_active(&self) -> bool {
        self.status == ProviderStatus::Active
    }
}

/// Persistence hook for health transitions (`provider_storage` table in the
/// PostgreSQL deployment).
#[async_trait]
pub trait ProviderStatusStore: Send + Sync {
    async fn record_health(
        &self,
        provider: &str,
        health: HealthStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;
}

#[derive(Clone)]
struct Registration {
    provider: Arc<dyn WorkspaceProvider>,
    config: ProviderConfig,
}

/// Routes reads and writes across registered providers and monitors their
/// health.
pub struct Router {
    registrations: RwLock<Vec<Registration>>,
    read_strategy: ReadStrategy,
    write_strategy: WriteStrategy,
    health_interval: Duration,
    health_timeout: Duration,
    status_store: Option<Arc<dyn ProviderStatusStore>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            read_strategy: ReadStrategy::default(),
            write_strategy: WriteStrategy::default(),
            health_interval: HEALTH_CHECK_INTERVAL,
            health_timeout: HEALTH_CHECK_TIMEOUT,
            status_store: None,
        }
    }

    #[must_use]
    pub fn with_read_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.read_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.write_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    #[must_use]
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_status_store(mut self, store: Arc<dyn ProviderStatusStore>) -> Self {
        self.status_store = Some(store);
        self
    }

    /// Register a provider. Names are unique and at most one active primary
    /// may exist.
    pub fn register(
        &self,
        provider: Arc<dyn WorkspaceProvider>,
        config: ProviderConfig,
    ) -> Result<()> {
        let mut registrations = self.registrations.write();
        if registrations.iter().any(|r| r.config.name == config.name) {
            return Err(Error::already_exists(format!(
                "provider '{}'",
                config.name
            )));
        }
        if config.is_primary
            && config.is_active()
            && registrations
                .iter()
                .any(|r| r.config.is_primary && r.config.is_active())
        {
            return Err(Error::invalid_argument(format!(
                "cannot register '{}' as primary: an active primary already exists",
                config.name
            )));
        }
        info!(provider = %config.name, provider_type = %config.provider_type, "registered provider");
        registrations.push(Registration { provider, config });
        Ok(())
    }

    /// Remove a provider from the registry.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.config.name != name);
        if registrations.len() == before {
            return Err(Error::not_found(format!("provider '{name}'")));
        }
        info!(provider = %name, "unregistered provider");
        Ok(())
    }

    /// Registered provider configs, in insertion order.
    #[must_use]
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        self.registrations
            .read()
            .iter()
            .map(|r| r.config.clone())
            .collect()
    }

    fn snapshot(&self) -> Vec<Registration> {
        self.registrations.read().clone()
    }

    /// Ordered candidates for the current read strategy.
    fn read_candidates(&self) -> Result<Vec<Registration>> {
        let snapshot = self.snapshot();
        match self.read_strategy {
            ReadStrategy::PrimaryOnly => {
                let primary = snapshot
                    .into_iter()
                    .find(|r| r.config.is_primary && r.config.is_active())
                    .ok_or_else(|| Error::not_found("active primary provider"))?;
                Ok(vec![primary])
            }
            ReadStrategy::PrimaryThenFallback => {
                let mut ordered: Vec<Registration> = Vec::new();
                let mut rest: Vec<Registration> = Vec::new();
                for registration in snapshot {
                    if !registration.config.is_active() {
                        continue;
                    }
                    if registration.config.is_primary {
                        ordered.insert(0, registration);
                    } else {
                        rest.push(registration);
                    }
                }
                ordered.extend(rest);
                if ordered.is_empty() {
                    return Err(Error::not_found("active providers"));
                }
                Ok(ordered)
            }
            ReadStrategy::LoadBalance => {
                let healthy: Vec<Registration> = snapshot
                    .into_iter()
                    .filter(|r| r.config.is_active() && r.config.health == HealthStatus::Healthy)
                    .collect();
                if healthy.is_empty() {
                    return Err(Error::not_found("healthy providers"));
                }
                Ok(healthy)
            }
        }
    }

    /// Writable targets for the current write strategy.
    fn write_targets(&self) -> Result<Vec<Registration>> {
        let snapshot = self.snapshot();
        match self.write_strategy {
            WriteStrategy::PrimaryOnly => {
                let primary = snapshot
                    .into_iter()
                    .find(|r| {
                        r.config.is_primary && r.config.is_active() && r.config.is_writable
                    })
                    .ok_or_else(|| Error::not_found("active writable primary provider"))?;
                Ok(vec![primary])
            }
            WriteStrategy::AllWritable | WriteStrategy::Mirror => {
                let writable: Vec<Registration> = snapshot
                    .into_iter()
                    .filter(|r| r.config.is_active() && r.config.is_writable)
                    .collect();
                if writable.is_empty() {
                    return Err(Error::not_found("active writable providers"));
                }
                Ok(writable)
            }
        }
    }

    /// Route a metadata read by UUID.
    ///
    /// With `primary_then_fallback`, each failing provider is skipped and
    /// the next is tried in insertion order; `NotFound` is returned when no
    /// provider holds the document.
    pub async fn route_read(&self, uuid: Uuid) -> Result<DocumentMetadata> {
        let candidates = self.read_candidates()?;
        if candidates.len() == 1 {
            return candidates[0].provider.get_document_by_uuid(uuid).await;
        }
        for registration in &candidates {
            match registration.provider.get_document_by_uuid(uuid).await {
                Ok(metadata) => return Ok(metadata),
                Err(err) => {
                    debug!(
                        provider = %registration.config.name,
                        error = %err,
                        "read failed; trying next provider"
                    );
                }
            }
        }
        Err(Error::not_found(format!("document with UUID {uuid}")))
    }

    /// Route a content read by UUID: resolve the document, then fetch its
    /// body from the same provider.
    pub async fn route_read_content(&self, uuid: Uuid) -> Result<DocumentContent> {
        let candidates = self.read_candidates()?;
        if candidates.len() == 1 {
            let registration = &candidates[0];
            let metadata = registration.provider.get_document_by_uuid(uuid).await?;
            return registration.provider.get_content(&metadata.provider_id).await;
        }
        for registration in &candidates {
            let result = async {
                let metadata = registration.provider.get_document_by_uuid(uuid).await?;
                registration.provider.get_content(&metadata.provider_id).await
            }
            .await;
            match result {
                Ok(content) => return Ok(content),
                Err(err) => {
                    debug!(
                        provider = %registration.config.name,
                        error = %err,
                        "content read failed; trying next provider"
                    );
                }
            }
        }
        Err(Error::not_found(format!("content for document {uuid}")))
    }

    /// Route a content update. Under `all_writable`/`mirror` the write fans
    /// out concurrently and the router waits for all targets.
    ///
    /// Partial success is reported, not rolled back: the aggregate error
    /// names every failed provider.
    pub async fn route_update_content(
        &self,
        uuid: Uuid,
        body: &str,
    ) -> Result<Vec<DocumentContent>> {
        let targets = self.write_targets()?;
        let body = body.to_string();
        let mut join_set: JoinSet<(String, Result<DocumentContent>)> = JoinSet::new();
        for registration in targets {
            let body = body.clone();
            join_set.spawn(async move {
                let name = registration.config.name.clone();
                let result = async {
                    let metadata = registration.provider.get_document_by_uuid(uuid).await?;
                    registration
                        .provider
                        .update_content(&metadata.provider_id, &body)
                        .await
                }
                .await;
                (name, result)
            });
        }
        Self::collect_write_results(join_set).await
    }

    /// Route a document creation carrying a fixed UUID to every write
    /// target.
    pub async fn route_create_document(
        &self,
        uuid: Uuid,
        name: &str,
        parent: Option<&str>,
        body: &str,
    ) -> Result<Vec<DocumentMetadata>> {
        let targets = self.write_targets()?;
        let name = name.to_string();
        let parent = parent.map(ToString::to_string);
        let body = body.to_string();
        let mut join_set: JoinSet<(String, Result<DocumentMetadata>)> = JoinSet::new();
        for registration in targets {
            let name = name.clone();
            let parent = parent.clone();
            let body = body.clone();
            join_set.spawn(async move {
                let provider_name = registration.config.name.clone();
                let result = registration
                    .provider
                    .create_document_with_uuid(uuid, &name, parent.as_deref(), &body)
                    .await;
                (provider_name, result)
            });
        }
        Self::collect_write_results(join_set).await
    }

    async fn collect_write_results<T: 'static>(
        mut join_set: JoinSet<(String, Result<T>)>,
    ) -> Result<Vec<T>> {
        let mut successes = Vec::new();
        let mut failed = Vec::new();
        let mut reasons = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (name, result) =
                joined.map_err(|e| Error::internal(format!("write worker panicked: {e}")))?;
            match result {
                Ok(value) => successes.push(value),
                Err(err) => {
                    warn!(provider = %name, error = %err, "write failed");
                    reasons.push(err.to_string());
                    failed.push(name);
                }
            }
        }
        if failed.is_empty() {
            Ok(successes)
        } else {
            Err(Error::Aggregate { failed, reasons })
        }
    }

    /// Probe every provider once and update health state.
    ///
    /// The probe asks for a freshly minted random UUID. A provider is
    /// healthy iff the call succeeds or returns a structured `NotFound`
    /// that quotes the probed UUID; anything else, including a deadline
    /// expiry, marks it unhealthy.
    pub async fn run_health_checks(&self) -> Vec<(String, HealthStatus)> {
        let snapshot = self.snapshot();
        let timeout = self.health_timeout;

        let mut join_set: JoinSet<(String, HealthStatus)> = JoinSet::new();
        for registration in snapshot {
            join_set.spawn(async move {
                let probe = identity::new_uuid();
                let name = registration.config.name.clone();
                let outcome =
                    tokio::time::timeout(timeout, registration.provider.get_document_by_uuid(probe))
                        .await;
                let health = match outcome {
                    Ok(Ok(_)) => HealthStatus::Healthy,
                    Ok(Err(Error::NotFound(msg))) if msg.contains(&probe.to_string()) => {
                        HealthStatus::Healthy
                    }
                    Ok(Err(_)) | Err(_) => HealthStatus::Unhealthy,
                };
                (name, health)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok(result) = joined {
                results.push(result);
            }
        }

        let checked_at = Utc::now();
        {
            let mut registrations = self.registrations.write();
            for (name, health) in &results {
                if let Some(registration) =
                    registrations.iter_mut().find(|r| &r.config.name == name)
                {
                    if registration.config.health != *health {
                        match health {
                            HealthStatus::Healthy => {
                                info!(provider = %name, "provider recovered")
                            }
                            _ => warn!(provider = %name, health = ?health, "provider unhealthy"),
                        }
                    }
                    registration.config.health = *health;
                    registration.config.last_health_check = Some(checked_at);
                }
            }
        }

        if let Some(store) = &self.status_store {
            for (name, health) in &results {
                if let Err(err) = store.record_health(name, *health, checked_at).await {
                    warn!(provider = %name, error = %err, "failed to persist health status");
                }
            }
        }
        results
    }

    /// Spawn the periodic health sweep. The task runs until aborted.
    #[must_use]
    pub fn start_health_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(router.health_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                router.run_health_checks().await;
            }
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{new_uuid, ProviderId};
    use crate::provider::{
        ContentProvider, DocumentProvider, NotificationProvider, PeopleProvider,
        PermissionProvider, RevisionTrackingProvider, TeamProvider,
    };
    use crate::test_support::StubProvider;

    fn seeded(name: &str, uuid: Uuid) -> Arc<StubProvider> {
        let provider = Arc::new(StubProvider::new(name));
        let pid = ProviderId::new(ProviderType::Local, format!("{name}/doc.md")).unwrap();
        let mut meta = DocumentMetadata::new(uuid, pid, "Doc");
        meta.content_hash = crate::model::content_hash("body");
        provider.insert_document(meta, "body");
        provider
    }

    /// Fails every document read with a transient error.
    struct BrokenProvider {
        inner: StubProvider,
    }

    impl BrokenProvider {
        fn new(name: &str) -> Self {
            Self {
                inner: StubProvider::new(name),
            }
        }
    }

    #[async_trait]
    impl crate::provider::DocumentProvider for BrokenProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Local
        }

        fn name(&self) -> &str {
            crate::provider::DocumentProvider::name(&self.inner)
        }

        async fn get_document(
            &self,
            _provider_id: &ProviderId,
        ) -> Result<DocumentMetadata> {
            Err(Error::transient("backend down"))
        }

        async fn get_document_by_uuid(&self, _uuid: Uuid) -> Result<DocumentMetadata> {
            Err(Error::transient("backend down"))
        }

        async fn create_document(
            &self,
            name: &str,
            parent: Option<&str>,
            body: &str,
        ) -> Result<DocumentMetadata> {
            self.inner.create_document(name, parent, body).await
        }

        async fn create_document_with_uuid(
            &self,
            uuid: Uuid,
            name: &str,
            parent: Option<&str>,
            body: &str,
        ) -> Result<DocumentMetadata> {
            self.inner
                .create_document_with_uuid(uuid, name, parent, body)
                .await
        }

        async fn register_document(
            &self,
            metadata: &DocumentMetadata,
        ) -> Result<DocumentMetadata> {
            self.inner.register_document(metadata).await
        }

        async fn copy_document(
            &self,
            source: &ProviderId,
            new_name: &str,
        ) -> Result<DocumentMetadata> {
            self.inner.copy_document(source, new_name).await
        }

        async fn move_document(
            &self,
            provider_id: &ProviderId,
            new_parent: &str,
        ) -> Result<DocumentMetadata> {
            self.inner.move_document(provider_id, new_parent).await
        }

        async fn rename_document(
            &self,
            provider_id: &ProviderId,
            new_name: &str,
        ) -> Result<DocumentMetadata> {
            self.inner.rename_document(provider_id, new_name).await
        }

        async fn delete_document(&self, provider_id: &ProviderId) -> Result<DocumentMetadata> {
            self.inner.delete_document(provider_id).await
        }
    }

    macro_rules! delegate_rest {
        ($ty:ty) => {
            #[async_trait]
            impl crate::provider::ContentProvider for $ty {
                async fn get_content(
                    &self,
                    provider_id: &ProviderId,
                ) -> Result<DocumentContent> {
                    self.inner.get_content(provider_id).await
                }

                async fn update_content(
                    &self,
                    provider_id: &ProviderId,
                    body: &str,
                ) -> Result<DocumentContent> {
                    self.inner.update_content(provider_id, body).await
                }
            }

            #[async_trait]
            impl crate::provider::RevisionTrackingProvider for $ty {
                async fn get_revision_history(
                    &self,
                    provider_id: &ProviderId,
                    limit: i64,
                ) -> Result<Vec<crate::model::BackendRevision>> {
                    self.inner.get_revision_history(provider_id, limit).await
                }

                async fn get_all_document_revisions(
                    &self,
                    uuid: Uuid,
                ) -> Result<crate::model::RevisionInfo> {
                    self.inner.get_all_document_revisions(uuid).await
                }
            }

            #[async_trait]
            impl crate::provider::PermissionProvider for $ty {
                async fn list_permissions(
                    &self,
                    provider_id: &ProviderId,
                ) -> Result<Vec<crate::model::FilePermission>> {
                    self.inner.list_permissions(provider_id).await
                }

                async fn grant_permission(
                    &self,
                    provider_id: &ProviderId,
                    permission: &crate::model::FilePermission,
                ) -> Result<crate::model::FilePermission> {
                    self.inner.grant_permission(provider_id, permission).await
                }

                async fn revoke_permission(
                    &self,
                    provider_id: &ProviderId,
                    permission_id: &str,
                ) -> Result<()> {
                    self.inner
                        .revoke_permission(provider_id, permission_id)
                        .await
                }
            }

            #[async_trait]
            impl crate::provider::PeopleProvider for $ty {
                async fn search_people(
                    &self,
                    query: &str,
                ) -> Result<Vec<crate::model::UserIdentity>> {
                    self.inner.search_people(query).await
                }

                async fn get_person(&self, email: &str) -> Result<crate::model::UserIdentity> {
                    self.inner.get_person(email).await
                }

                async fn get_person_by_unified_id(
                    &self,
                    unified_id: &str,
                ) -> Result<crate::model::UserIdentity> {
                    self.inner.get_person_by_unified_id(unified_id).await
                }

                async fn resolve_identities(
                    &self,
                    emails: &[String],
                ) -> Result<Vec<crate::model::UserIdentity>> {
                    self.inner.resolve_identities(emails).await
                }
            }

            #[async_trait]
            impl crate::provider::TeamProvider for $ty {
                async fn list_teams(&self) -> Result<Vec<crate::model::Team>> {
                    self.inner.list_teams().await
                }

                async fn get_team(&self, team_id: &str) -> Result<crate::model::Team> {
                    self.inner.get_team(team_id).await
                }

                async fn get_teams_for_user(
                    &self,
                    email: &str,
                ) -> Result<Vec<crate::model::Team>> {
                    self.inner.get_teams_for_user(email).await
                }

                async fn list_team_members(
                    &self,
                    team_id: &str,
                ) -> Result<Vec<crate::model::UserIdentity>> {
                    self.inner.list_team_members(team_id).await
                }
            }

            #[async_trait]
            impl crate::provider::NotificationProvider for $ty {
                async fn send_notification(
                    &self,
                    notification: &crate::model::Notification,
                ) -> Result<()> {
                    self.inner.send_notification(notification).await
                }
            }
        };
    }

    delegate_rest!(BrokenProvider);

    #[tokio::test]
    async fn test_primary_then_fallback_returns_secondary_copy() {
        let uuid = new_uuid();
        let router = Router::new().with_read_strategy(ReadStrategy::PrimaryThenFallback);
        router
            .register(
                Arc::new(BrokenProvider::new("primary")),
                ProviderConfig::new("primary", ProviderType::Local).primary(),
            )
            .unwrap();
        router
            .register(
                seeded("secondary", uuid),
                ProviderConfig::new("secondary", ProviderType::Local),
            )
            .unwrap();

        let metadata = router.route_read(uuid).await.unwrap();
        assert_eq!(metadata.uuid, uuid);
    }

    #[tokio::test]
    async fn test_fallback_not_found_when_no_provider_holds_document() {
        let router = Router::new().with_read_strategy(ReadStrategy::PrimaryThenFallback);
        router
            .register(
                Arc::new(BrokenProvider::new("primary")),
                ProviderConfig::new("primary", ProviderType::Local).primary(),
            )
            .unwrap();
        router
            .register(
                seeded("secondary", new_uuid()),
                ProviderConfig::new("secondary", ProviderType::Local),
            )
            .unwrap();

        let missing = new_uuid();
        let err = router.route_read(missing).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains(&missing.to_string()));
    }

    #[tokio::test]
    async fn test_primary_only_requires_primary() {
        let router = Router::new().with_read_strategy(ReadStrategy::PrimaryOnly);
        router
            .register(
                seeded("secondary", new_uuid()),
                ProviderConfig::new("secondary", ProviderType::Local),
            )
            .unwrap();
        let err = router.route_read(new_uuid()).await.unwrap_err();
        assert!(err.to_string().contains("primary"));
    }

    #[tokio::test]
    async fn test_write_all_reaches_every_writable_provider() {
        let uuid = new_uuid();
        let a = seeded("a", uuid);
        let b = seeded("b", uuid);
        let router = Router::new().with_write_strategy(WriteStrategy::AllWritable);
        router
            .register(
                a.clone(),
                ProviderConfig::new("a", ProviderType::Local).primary().writable(),
            )
            .unwrap();
        router
            .register(
                b.clone(),
                ProviderConfig::new("b", ProviderType::Local).writable(),
            )
            .unwrap();

        let results = router.route_update_content(uuid, "new body").await.unwrap();
        assert_eq!(results.len(), 2);
        for provider in [a, b] {
            let meta = provider.get_document_by_uuid(uuid).await.unwrap();
            assert_eq!(meta.content_hash, crate::model::content_hash("new body"));
        }
    }

    #[tokio::test]
    async fn test_write_all_reports_partial_failure_as_aggregate() {
        let uuid = new_uuid();
        let good = seeded("good", uuid);
        let router = Router::new().with_write_strategy(WriteStrategy::AllWritable);
        router
            .register(
                good,
                ProviderConfig::new("good", ProviderType::Local).writable(),
            )
            .unwrap();
        // Holds no documents, so the resolve step fails.
        router
            .register(
                Arc::new(StubProvider::new("empty")),
                ProviderConfig::new("empty", ProviderType::Local).writable(),
            )
            .unwrap();

        let err = router.route_update_content(uuid, "x").await.unwrap_err();
        match err {
            Error::Aggregate { failed, .. } => assert_eq!(failed, vec!["empty".to_string()]),
            other => panic!("expected aggregate error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_mirror_behaves_like_all_writable() {
        let uuid = new_uuid();
        let a = seeded("a", uuid);
        let b = seeded("b", uuid);
        let router = Router::new().with_write_strategy(WriteStrategy::Mirror);
        router
            .register(a, ProviderConfig::new("a", ProviderType::Local).writable())
            .unwrap();
        router
            .register(b, ProviderConfig::new("b", ProviderType::Local).writable())
            .unwrap();
        let results = router.route_update_content(uuid, "mirrored").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let router = Router::new();
        router
            .register(
                seeded("dup", new_uuid()),
                ProviderConfig::new("dup", ProviderType::Local),
            )
            .unwrap();
        let err = router
            .register(
                seeded("dup", new_uuid()),
                ProviderConfig::new("dup", ProviderType::Local),
            )
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_second_active_primary_rejected() {
        let router = Router::new();
        router
            .register(
                seeded("p1", new_uuid()),
                ProviderConfig::new("p1", ProviderType::Local).primary(),
            )
            .unwrap();
        let err = router
            .register(
                seeded("p2", new_uuid()),
                ProviderConfig::new("p2", ProviderType::Local).primary(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_health_check_generic_failure_marks_unhealthy() {
        let router = Arc::new(Router::new().with_health_timeout(Duration::from_millis(200)));
        router
            .register(
                Arc::new(BrokenProvider::new("broken")),
                ProviderConfig::new("broken", ProviderType::Local),
            )
            .unwrap();
        router
            .register(
                seeded("healthy", new_uuid()),
                ProviderConfig::new("healthy", ProviderType::Local),
            )
            .unwrap();

        router.run_health_checks().await;
        let configs = router.provider_configs();
        let broken = configs.iter().find(|c| c.name == "broken").unwrap();
        let healthy = configs.iter().find(|c| c.name == "healthy").unwrap();
        // StubProvider returns NotFound quoting the probed UUID.
        assert_eq!(broken.health, HealthStatus::Unhealthy);
        assert_eq!(healthy.health, HealthStatus::Healthy);
        assert!(broken.last_health_check.is_some());
    }

    #[tokio::test]
    async fn test_health_check_persists_transitions() {
        struct RecordingStatusStore {
            records: RwLock<Vec<(String, HealthStatus)>>,
        }

        #[async_trait]
        impl ProviderStatusStore for RecordingStatusStore {
            async fn record_health(
                &self,
                provider: &str,
                health: HealthStatus,
                _checked_at: DateTime<Utc>,
            ) -> Result<()> {
                self.records.write().push((provider.to_string(), health));
                Ok(())
            }
        }

        let store = Arc::new(RecordingStatusStore {
            records: RwLock::new(Vec::new()),
        });
        let router = Router::new()
            .with_health_timeout(Duration::from_millis(200))
            .with_status_store(store.clone());
        router
            .register(
                seeded("ok", new_uuid()),
                ProviderConfig::new("ok", ProviderType::Local),
            )
            .unwrap();
        router.run_health_checks().await;
        let records = store.records.read();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], ("ok".to_string(), HealthStatus::Healthy));
    }

    #[tokio::test]
    async fn test_load_balance_skips_unhealthy_providers() {
        let uuid = new_uuid();
        let router = Router::new()
            .with_read_strategy(ReadStrategy::LoadBalance)
            .with_health_timeout(Duration::from_millis(200));
        router
            .register(
                Arc::new(BrokenProvider::new("broken")),
                ProviderConfig::new("broken", ProviderType::Local),
            )
            .unwrap();
        router
            .register(
                seeded("holder", uuid),
                ProviderConfig::new("holder", ProviderType::Local),
            )
            .unwrap();

        // After a sweep the broken provider is excluded from load balancing.
        router.run_health_checks().await;
        let metadata = router.route_read(uuid).await.unwrap();
        assert_eq!(metadata.uuid, uuid);
    }
}
