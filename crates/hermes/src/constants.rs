//! Timeouts and tuning defaults shared across the workspace.

use std::time::Duration;

/// Default timeout for remote peer HTTP calls.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for cloud LLM calls.
pub const CLOUD_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for local LLM runtimes, which may be CPU-bound.
pub const LOCAL_LLM_TIMEOUT: Duration = Duration::from_secs(300);

/// Interval between router health sweeps.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Per-provider timeout applied to a single health probe.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on per-step document parallelism in the pipeline engine.
pub const DEFAULT_MAX_PARALLEL: usize = 3;

/// Character budget applied to content before it is sent to an LLM.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 40_000;

/// Idle HTTP connections kept per host by adapter clients.
pub const MAX_IDLE_CONNS_PER_HOST: usize = 10;

/// Idle timeout for pooled HTTP connections.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
