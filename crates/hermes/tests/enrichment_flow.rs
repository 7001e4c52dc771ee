//! End-to-end enrichment scenarios over in-memory fakes: ruleset dispatch,
//! the full step chain, outbox idempotency, relay ordering, and drift
//! detection.

use std::collections::BTreeMap;
use std::sync::Arc;

use hermes::identity::{new_uuid, ProviderType};
use hermes::model::content_hash;
use hermes::outbox::{MemoryOutboxStore, OutboxRelay, OutboxStatus, OutboxStore};
use hermes::pipeline::steps::{default_registry, StepDependencies};
use hermes::pipeline::{Pipeline, PipelineEngine, StepContext};
use hermes::ruleset::{match_rulesets, Ruleset};
use hermes::store::RevisionStore;
use hermes_test_utils::{
    init_tracing, MockAiProvider, MockWorkspaceProvider, RecordingBus, RecordingIndexer,
};

struct Rig {
    provider: Arc<MockWorkspaceProvider>,
    ai: Arc<MockAiProvider>,
    indexer: Arc<RecordingIndexer>,
    store: Arc<MemoryOutboxStore>,
    engine: PipelineEngine,
    pipeline: Pipeline,
}

const FULL_CHAIN: &[&str] = &[
    "discover",
    "assign_uuid",
    "extract_content",
    "hash",
    "summarize",
    "embed",
    "transform",
    "index",
    "track_revision",
];

fn rig() -> Rig {
    init_tracing();
    let provider = Arc::new(MockWorkspaceProvider::new("mock"));
    let ai = Arc::new(MockAiProvider::new());
    let indexer = Arc::new(RecordingIndexer::new());
    let store = Arc::new(MemoryOutboxStore::new());
    let registry = default_registry(StepDependencies {
        ai: Some(ai.clone()),
        indexer: Some(indexer.clone()),
        revision_store: Some(store.clone()),
        outbox: Some(store.clone()),
        ..Default::default()
    });
    let step_names: Vec<String> = FULL_CHAIN.iter().map(ToString::to_string).collect();
    let pipeline = Pipeline::from_names("all-documents", &step_names, &registry)
        .expect("canonical steps resolve");
    Rig {
        provider,
        ai,
        indexer,
        store,
        engine: PipelineEngine::new(),
        pipeline,
    }
}

fn contexts_for(rig: &Rig, docs: &[(&str, &str)]) -> Vec<StepContext> {
    docs.iter()
        .map(|(path, body)| {
            let metadata = rig.provider.seed(new_uuid(), path, body);
            StepContext::new(metadata, rig.provider.clone())
        })
        .collect()
}

#[tokio::test]
async fn full_chain_enriches_indexes_and_tracks() {
    let rig = rig();
    let contexts = contexts_for(
        &rig,
        &[
            ("docs/alpha.md", "Alpha body text."),
            ("docs/beta.md", "Beta body text."),
        ],
    );
    let uuids: Vec<_> = contexts.iter().map(|c| c.metadata.uuid).collect();

    let report = rig.engine.execute(&rig.pipeline, contexts).await.unwrap();
    assert!(report.is_fully_successful());
    assert_eq!(report.completed.len(), 2);

    for cx in &report.completed {
        assert!(cx.summary.is_some(), "summary missing");
        let embeddings = cx.embeddings.as_ref().expect("embeddings missing");
        assert!(!embeddings.content_embedding.is_empty());
        assert!(cx.search_doc.is_some(), "search projection missing");
    }

    // Both documents were indexed and tracked.
    assert_eq!(rig.indexer.documents().len(), 2);
    for uuid in uuids {
        let revisions = rig.store.revisions_for_uuid(uuid).await.unwrap();
        assert_eq!(revisions.len(), 1);
        assert!(revisions[0].summary.is_some());
        assert!(revisions[0].embeddings.is_some());
        let entries = rig.store.entries_for_document(uuid).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, OutboxStatus::Pending);
    }
}

#[tokio::test]
async fn rerun_on_unchanged_content_is_idempotent() {
    let rig = rig();
    let contexts = contexts_for(&rig, &[("docs/alpha.md", "Stable body.")]);
    let uuid = contexts[0].metadata.uuid;

    rig.engine
        .execute(&rig.pipeline, contexts)
        .await
        .unwrap();
    // Second run over the same content: same metadata, same body.
    let metadata = rig
        .provider
        .metadata_by_uuid(uuid)
        .expect("document still present");
    let rerun = vec![StepContext::new(metadata, rig.provider.clone())];
    rig.engine.execute(&rig.pipeline, rerun).await.unwrap();

    assert_eq!(rig.store.entries_for_document(uuid).await.unwrap().len(), 1);
    assert_eq!(rig.store.revisions_for_uuid(uuid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failing_enrichment_excludes_document_but_not_others() {
    let rig = rig();
    let contexts = contexts_for(
        &rig,
        &[("docs/good.md", "Good body."), ("docs/other.md", "Other body.")],
    );

    // AI down for the whole run: summarize fails for every document, so
    // nothing reaches the index.
    rig.ai.fail(true);
    let report = rig.engine.execute(&rig.pipeline, contexts).await.unwrap();
    assert_eq!(report.completed.len(), 0);
    assert_eq!(report.failed.len(), 2);
    for failure in &report.failed {
        assert_eq!(failure.step, "summarize");
    }
    assert!(rig.indexer.documents().is_empty());
}

#[tokio::test]
async fn ruleset_dispatch_selects_pipelines() {
    let rig = rig();
    let rulesets = vec![
        Ruleset {
            name: "rfcs-only".to_string(),
            conditions: BTreeMap::from([(
                "document_type".to_string(),
                "RFC".to_string(),
            )]),
            pipeline: vec!["extract_content".to_string(), "hash".to_string()],
            config: BTreeMap::new(),
        },
        Ruleset {
            name: "all-documents".to_string(),
            conditions: BTreeMap::new(),
            pipeline: FULL_CHAIN.iter().map(ToString::to_string).collect(),
            config: BTreeMap::new(),
        },
    ];

    let mut metadata = rig.provider.seed(new_uuid(), "docs/prd.md", "PRD body.");
    metadata
        .extended
        .insert("document_type".to_string(), serde_json::json!("PRD"));

    let matched = match_rulesets(&metadata, &rulesets);
    let names: Vec<&str> = matched.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["all-documents"]);

    // Matched rulesets resolve into runnable pipelines.
    let registry = default_registry(StepDependencies {
        ai: Some(rig.ai.clone()),
        indexer: Some(rig.indexer.clone()),
        revision_store: Some(rig.store.clone()),
        outbox: Some(rig.store.clone()),
        ..Default::default()
    });
    for ruleset in matched {
        assert!(Pipeline::from_names(&ruleset.name, &ruleset.pipeline, &registry).is_ok());
    }
}

#[tokio::test]
async fn relay_preserves_per_document_order() {
    let rig = rig();
    let contexts = contexts_for(&rig, &[("docs/alpha.md", "Version one.")]);
    let uuid = contexts[0].metadata.uuid;
    rig.engine.execute(&rig.pipeline, contexts).await.unwrap();

    // Change the body and run again: a second revision and entry.
    rig.provider
        .update_body(uuid, "Version two.")
        .expect("update seeded document");
    let metadata = rig
        .provider
        .metadata_by_uuid(uuid)
        .expect("document still present");
    rig.engine
        .execute(&rig.pipeline, vec![StepContext::new(metadata, rig.provider.clone())])
        .await
        .unwrap();

    let bus = Arc::new(RecordingBus::new());
    let relay = OutboxRelay::new(rig.store.clone(), bus.clone());
    assert_eq!(relay.run_once().await.unwrap(), 2);

    let keys = bus.partition_keys();
    assert_eq!(keys, vec![uuid.to_string(), uuid.to_string()]);
    let messages = bus.messages();
    assert_eq!(
        messages[0].payload["content_hash"],
        serde_json::json!(content_hash("Version one."))
    );
    assert_eq!(
        messages[1].payload["content_hash"],
        serde_json::json!(content_hash("Version two."))
    );
}

#[tokio::test]
async fn cross_backend_drift_marks_conflict() {
    init_tracing();
    let store = Arc::new(MemoryOutboxStore::new());
    let registry = default_registry(StepDependencies {
        revision_store: Some(store.clone()),
        outbox: Some(store.clone()),
        ..Default::default()
    });
    let step_names: Vec<String> = ["extract_content", "hash", "track_revision"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let pipeline = Pipeline::from_names("track-only", &step_names, &registry).unwrap();
    let engine = PipelineEngine::new();

    let uuid = new_uuid();
    let local = Arc::new(MockWorkspaceProvider::new("local"));
    let google = Arc::new(
        MockWorkspaceProvider::new("google").with_provider_type(ProviderType::Google),
    );
    let local_meta = local.seed(uuid, "docs/shared.md", "Local version.");
    let google_meta = google.seed(uuid, "drive-file-1", "Drive version, diverged.");

    engine
        .execute(
            &pipeline,
            vec![
                StepContext::new(local_meta, local.clone()),
                StepContext::new(google_meta, google.clone()),
            ],
        )
        .await
        .unwrap();

    let info = store.revision_info(uuid).await.unwrap();
    assert_eq!(info.entries.len(), 2);
    for entry in &info.entries {
        assert_eq!(entry.sync_status, hermes::model::SyncStatus::Conflict);
    }
}
