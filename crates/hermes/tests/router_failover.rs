//! Router scenarios over the shared mocks: read fallback, write fan-out,
//! and health transitions.

use std::sync::Arc;
use std::time::Duration;

use hermes::error::Error;
use hermes::identity::{new_uuid, ProviderType};
use hermes::router::{
    HealthStatus, ProviderConfig, ReadStrategy, Router, WriteStrategy,
};
use hermes_test_utils::{init_tracing, MockWorkspaceProvider};

#[tokio::test]
async fn fallback_read_returns_secondary_copy() {
    init_tracing();
    let uuid = new_uuid();
    let primary = Arc::new(MockWorkspaceProvider::new("primary"));
    primary.seed(uuid, "docs/held-by-both.md", "primary copy");
    primary.fail_reads(true);
    let secondary = Arc::new(MockWorkspaceProvider::new("secondary"));
    secondary.seed(uuid, "docs/held-by-both.md", "secondary copy");

    let router = Router::new().with_read_strategy(ReadStrategy::PrimaryThenFallback);
    router
        .register(
            primary,
            ProviderConfig::new("primary", ProviderType::Local).primary(),
        )
        .unwrap();
    router
        .register(
            secondary,
            ProviderConfig::new("secondary", ProviderType::Local),
        )
        .unwrap();

    let metadata = router.route_read(uuid).await.unwrap();
    assert_eq!(metadata.uuid, uuid);

    // A UUID nobody holds comes back NotFound.
    let missing = new_uuid();
    let err = router.route_read(missing).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn write_all_reaches_each_provider_exactly_once() {
    init_tracing();
    let a = Arc::new(MockWorkspaceProvider::new("a"));
    let b = Arc::new(MockWorkspaceProvider::new("b"));
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

    let uuid = new_uuid();
    let results = router
        .route_create_document(uuid, "fanout.md", None, "fanned out body")
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(a.write_count(), 1);
    assert_eq!(b.write_count(), 1);
}

#[tokio::test]
async fn health_sweep_distinguishes_not_found_from_failure() {
    init_tracing();
    // Holds nothing: probes come back NotFound quoting the probed UUID.
    let empty = Arc::new(MockWorkspaceProvider::new("empty"));
    // Fails every read outright.
    let broken = Arc::new(MockWorkspaceProvider::new("broken"));
    broken.fail_reads(true);

    let router = Arc::new(Router::new().with_health_timeout(Duration::from_millis(200)));
    router
        .register(empty, ProviderConfig::new("empty", ProviderType::Local))
        .unwrap();
    router
        .register(broken, ProviderConfig::new("broken", ProviderType::Local))
        .unwrap();

    router.run_health_checks().await;

    let configs = router.provider_configs();
    let by_name = |name: &str| {
        configs
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.health)
            .unwrap_or(HealthStatus::Degraded)
    };
    assert_eq!(by_name("empty"), HealthStatus::Healthy);
    assert_eq!(by_name("broken"), HealthStatus::Unhealthy);
}
