//! The step trait and the name registry rulesets resolve against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::context::StepContext;

/// One named operation in a pipeline.
///
/// Steps must be idempotent: re-executing over the same context must not
/// duplicate side effects. Steps that persist key on (UUID, ContentHash)
/// and skip when the row already exists unchanged.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name rulesets refer to.
    fn name(&self) -> &str;

    /// Run this step for one document.
    async fn execute(&self, cx: &mut StepContext) -> Result<()>;

    /// Whether the engine should call [`Step::execute_batch`] once over the
    /// whole document set instead of fanning out per document.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Batch execution over the surviving document set. The default loops
    /// [`Step::execute`]; a batch step that fails as a whole aborts the
    /// pipeline.
    async fn execute_batch(&self, cxs: &mut [StepContext]) -> Result<()> {
        for cx in cxs.iter_mut() {
            self.execute(cx).await?;
        }
        Ok(())
    }

    /// Whether a failed execution may be retried on the same context.
    fn is_retryable(&self, err: &Error) -> bool {
        err.is_retryable()
    }
}

/// Resolves stable step names to step instances at pipeline construction.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under its own name.
    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.insert(step.name().to_string(), step);
    }

    /// Register a step under an alias, e.g. `track` for `track_revision`.
    pub fn register_alias(&mut self, alias: impl Into<String>, step: Arc<dyn Step>) {
        self.steps.insert(alias.into(), step);
    }

    /// Look up one step by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Step>> {
        self.steps
            .get(name)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("unknown pipeline step '{name}'")))
    }

    /// Resolve an ordered list of step names, failing on the first unknown
    /// name.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Step>>> {
        names.iter().map(|n| self.get(n)).collect()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.steps.keys().cloned().collect();
        names.sort();
        names
    }
}
