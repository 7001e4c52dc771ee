//! Error taxonomy shared across the Hermes workspace.
//!
//! Every provider adapter classifies backend failures into one of these
//! categories before surfacing them. The router and pipeline engine make
//! routing/retry decisions from the category alone, never from the backend's
//! raw error text.

use thiserror::Error;

/// Result type used across the Hermes workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the ingestion pipeline, the router, and the
/// provider adapters.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The requested subject does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The subject already exists and cannot be created again
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The caller supplied an invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The credential was rejected or missing
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The provider does not implement this capability
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The operation exceeded its deadline
    #[error("timeout after {0:?}: {1}")]
    Timeout(std::time::Duration, String),

    /// Cross-backend state disagreement, e.g. a content hash mismatch
    #[error("conflict: {0}")]
    Conflict(String),

    /// More than one backend document advertises the same UUID
    #[error("ambiguous identity: {0}")]
    AmbiguousIdentity(String),

    /// Transient failure (5xx, transport); safe to retry
    #[error("transient error: {0}")]
    Transient(String),

    /// Frontmatter or AI response could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Unclassified internal failure
    #[error("internal error: {0}")]
    Internal(String),

    /// A pipeline step failed; carries the originating step name
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },

    /// Aggregate failure from a fan-out write; names the failed providers
    #[error("write failed on providers [{}]: {}", failed.join(", "), reasons.join("; "))]
    Aggregate {
        failed: Vec<String>,
        reasons: Vec<String>,
    },
}

impl Error {
    pub fn not_found(subject: impl Into<String>) -> Self {
        Error::NotFound(subject.into())
    }

    pub fn already_exists(subject: impl Into<String>) -> Self {
        Error::AlreadyExists(subject.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Error::Unauthorized(msg.into())
    }

    pub fn not_supported(capability: impl Into<String>) -> Self {
        Error::NotSupported(capability.into())
    }

    pub fn timeout(after: std::time::Duration, subject: impl Into<String>) -> Self {
        Error::Timeout(after, subject.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub fn ambiguous_identity(msg: impl Into<String>) -> Self {
        Error::AmbiguousIdentity(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Attach the originating pipeline step name to this error.
    ///
    /// Already-attributed errors are returned unchanged so nested step
    /// composition reports the innermost step.
    #[must_use]
    pub fn in_step(self, step: impl Into<String>) -> Self {
        match self {
            Error::Step { .. } => self,
            other => Error::Step {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether a retry of the same operation may succeed.
    ///
    /// The router treats retryable errors as fallback candidates; the
    /// pipeline engine retries a step only when the step opts in AND the
    /// error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Timeout(..) => true,
            Error::Step { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// The step name attached by the pipeline engine, if any.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Error::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Error::Unauthorized(err.to_string()),
            std::io::ErrorKind::TimedOut => {
                Error::Timeout(std::time::Duration::ZERO, err.to_string())
            }
            _ => Error::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_not_found_display_names_subject() {
        let err = Error::not_found("document with UUID 1234");
        assert_eq!(err.to_string(), "document with UUID 1234 not found");
    }

    #[test]
    fn test_not_supported_display() {
        let err = Error::not_supported("revision history");
        assert_eq!(err.to_string(), "not supported: revision history");
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::timeout(Duration::from_secs(5), "health probe");
        assert_eq!(err.to_string(), "timeout after 5s: health probe");
    }

    #[test]
    fn test_step_attribution() {
        let err = Error::transient("backend 503").in_step("summarize");
        assert_eq!(err.step_name(), Some("summarize"));
        assert_eq!(
            err.to_string(),
            "step 'summarize' failed: transient error: backend 503"
        );
    }

    #[test]
    fn test_step_attribution_keeps_innermost() {
        let err = Error::parse("bad response")
            .in_step("summarize")
            .in_step("embed");
        assert_eq!(err.step_name(), Some("summarize"));
    }

    #[test]
    fn test_transient_is_retryable() {
        assert!(Error::transient("503").is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(Error::timeout(Duration::from_secs(1), "read").is_retryable());
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        assert!(!Error::not_found("doc").is_retryable());
    }

    #[test]
    fn test_step_retryability_follows_source() {
        assert!(Error::transient("x").in_step("hash").is_retryable());
        assert!(!Error::parse("x").in_step("hash").is_retryable());
    }

    #[test]
    fn test_aggregate_display_names_failed_providers() {
        let err = Error::Aggregate {
            failed: vec!["google-prod".to_string(), "peer-eu".to_string()],
            reasons: vec!["timeout".to_string(), "503".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("google-prod"));
        assert!(msg.contains("peer-eu"));
    }

    #[test]
    fn test_io_not_found_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.md");
        let err = Error::from(io);
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_io_permission_denied_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no access");
        assert!(matches!(Error::from(io), Error::Unauthorized(_)));
    }

    #[test]
    fn test_serde_json_classified_as_parse() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
