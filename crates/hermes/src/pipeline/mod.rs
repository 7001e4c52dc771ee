//! Pipeline engine: ordered steps over per-document contexts.
//!
//! Step order is strict; within a step, documents run on separate workers
//! bounded by `max_parallel`. A document that fails a step is excluded from
//! later steps; a batch-level failure aborts the whole run.

pub mod context;
pub mod step;
pub mod steps;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::constants::DEFAULT_MAX_PARALLEL;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

pub use context::StepContext;
pub use step::{Step, StepRegistry};

/// Outcome of one step for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Per-step record kept on the context and in execution rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Lifecycle of a pipeline execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Append-only record of one pipeline run over one document revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub revision_id: String,
    pub ruleset_name: String,
    pub document_uuid: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_results: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

/// Append-only storage of pipeline executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn record_execution(&self, execution: PipelineExecution) -> Result<()>;

    async fn executions_for_document(&self, uuid: Uuid) -> Result<Vec<PipelineExecution>>;
}

/// In-memory execution store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryExecutionStore {
    rows: RwLock<Vec<PipelineExecution>>,
}

impl MemoryExecutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn record_execution(&self, execution: PipelineExecution) -> Result<()> {
        self.rows.write().push(execution);
        Ok(())
    }

    async fn executions_for_document(&self, uuid: Uuid) -> Result<Vec<PipelineExecution>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|e| e.document_uuid == uuid)
            .cloned()
            .collect())
    }
}

/// An ordered list of steps under a ruleset's name.
pub struct Pipeline {
    pub name: String,
    pub steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    /// Resolve a ruleset's step names against a registry.
    pub fn from_names(
        name: impl Into<String>,
        step_names: &[String],
        registry: &StepRegistry,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            steps: registry.resolve(step_names)?,
        })
    }
}

/// One document that failed a step and was excluded from the rest of the
/// run.
pub struct FailedDocument {
    pub context: StepContext,
    pub step: String,
    pub error: Error,
}

/// Result of one pipeline run.
pub struct PipelineReport {
    pub pipeline: String,
    /// Documents that completed every step, in input order.
    pub completed: Vec<StepContext>,
    /// Documents excluded by a step failure.
    pub failed: Vec<FailedDocument>,
}

impl PipelineReport {
    #[must_use]
    pub fn is_fully_successful(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Executes pipelines with bounded per-step parallelism.
pub struct PipelineEngine {
    max_parallel: usize,
    retry_policy: RetryPolicy,
    executions: Option<Arc<dyn ExecutionStore>>,
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            retry_policy: RetryPolicy::exponential(2),
            executions: None,
        }
    }

    /// Bound on concurrently executing documents within one step.
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Retry schedule applied when a step reports an error as retryable.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Record per-document executions to this store.
    #[must_use]
    pub fn with_execution_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.executions = Some(store);
        self
    }

    /// Run `pipeline` over `contexts`.
    ///
    /// Per-document failures are reported in the returned
    /// [`PipelineReport`]; only a batch-level failure is an `Err`.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        contexts: Vec<StepContext>,
    ) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let mut survivors = contexts;
        let mut failed: Vec<FailedDocument> = Vec::new();

        for step in &pipeline.steps {
            if survivors.is_empty() {
                break;
            }
            debug!(
                pipeline = %pipeline.name,
                step = step.name(),
                documents = survivors.len(),
                "executing step"
            );
            if step.supports_batch() {
                survivors = self.run_batch_step(step, survivors).await?;
            } else {
                survivors = self
                    .run_parallel_step(step, survivors, &mut failed)
                    .await?;
            }
        }

        let report = PipelineReport {
            pipeline: pipeline.name.clone(),
            completed: survivors,
            failed,
        };
        self.record_executions(pipeline, &report, started_at).await;
        Ok(report)
    }

    /// Run with an overall deadline. On expiry the engine returns a timeout
    /// error; in-flight steps are dropped at the await point.
    pub async fn execute_with_deadline(
        &self,
        pipeline: &Pipeline,
        contexts: Vec<StepContext>,
        deadline: Duration,
    ) -> Result<PipelineReport> {
        match tokio::time::timeout(deadline, self.execute(pipeline, contexts)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                deadline,
                format!("pipeline '{}'", pipeline.name),
            )),
        }
    }

    async fn run_batch_step(
        &self,
        step: &Arc<dyn Step>,
        mut survivors: Vec<StepContext>,
    ) -> Result<Vec<StepContext>> {
        let started = std::time::Instant::now();
        match step.execute_batch(&mut survivors).await {
            Ok(()) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                for cx in &mut survivors {
                    cx.step_results.push(StepResult {
                        step: step.name().to_string(),
                        status: StepStatus::Completed,
                        error: None,
                        duration_ms,
                    });
                }
                Ok(survivors)
            }
            // A whole-batch failure aborts the pipeline.
            Err(err) => Err(err.in_step(step.name())),
        }
    }

    async fn run_parallel_step(
        &self,
        step: &Arc<dyn Step>,
        survivors: Vec<StepContext>,
        failed: &mut Vec<FailedDocument>,
    ) -> Result<Vec<StepContext>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut join_set: JoinSet<(usize, StepContext, Result<()>)> = JoinSet::new();

        for (idx, mut cx) in survivors.into_iter().enumerate() {
            let step = Arc::clone(step);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry_policy.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let started = std::time::Instant::now();
                let mut attempt = 0u32;
                let mut result = step.execute(&mut cx).await;
                while let Err(err) = &result {
                    if step.is_retryable(err) && attempt < retry.max_retries {
                        attempt += 1;
                        tokio::time::sleep(retry.backoff_for_attempt(attempt)).await;
                        result = step.execute(&mut cx).await;
                    } else {
                        break;
                    }
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                cx.step_results.push(StepResult {
                    step: step.name().to_string(),
                    status: if result.is_ok() {
                        StepStatus::Completed
                    } else {
                        StepStatus::Failed
                    },
                    error: result.as_ref().err().map(ToString::to_string),
                    duration_ms,
                });
                (idx, cx, result)
            });
        }

        let mut ok: Vec<(usize, StepContext)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (idx, cx, result) = joined
                .map_err(|e| Error::internal(format!("pipeline worker panicked: {e}")))?;
            match result {
                Ok(()) => ok.push((idx, cx)),
                Err(err) => {
                    warn!(
                        document = %cx.metadata.uuid,
                        step = step.name(),
                        error = %err,
                        "document failed step; excluding from remaining steps"
                    );
                    failed.push(FailedDocument {
                        context: cx,
                        step: step.name().to_string(),
                        error: err.in_step(step.name()),
                    });
                }
            }
        }
        ok.sort_by_key(|(idx, _)| *idx);
        Ok(ok.into_iter().map(|(_, cx)| cx).collect())
    }

    async fn record_executions(
        &self,
        pipeline: &Pipeline,
        report: &PipelineReport,
        started_at: DateTime<Utc>,
    ) {
        let Some(store) = &self.executions else {
            return;
        };
        let completed_at = Some(Utc::now());
        let executions = report
            .completed
            .iter()
            .map(|cx| (cx, ExecutionStatus::Completed, None))
            .chain(report.failed.iter().map(|f| {
                (
                    &f.context,
                    ExecutionStatus::Failed,
                    Some(f.error.to_string()),
                )
            }))
            .map(|(cx, status, error_details)| PipelineExecution {
                revision_id: cx.revision_marker(),
                ruleset_name: pipeline.name.clone(),
                document_uuid: cx.metadata.uuid,
                started_at,
                completed_at,
                status,
                step_results: cx.step_results.clone(),
                error_details,
            });
        for execution in executions {
            if let Err(err) = store.record_execution(execution).await {
                warn!(error = %err, "failed to record pipeline execution");
            }
        }
    }
}
