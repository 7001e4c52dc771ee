//! Configuration loading.
//!
//! Typed sub-configs with serde defaults, loadable from YAML, with
//! environment overrides applied on top. Secrets are referenced, never
//! inlined: a [`SecretRef`] names an environment variable or carries an
//! explicit value for tests.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Error, Result};
use crate::router::{ReadStrategy, WriteStrategy};

/// Environment variable names and typed accessors.
pub mod env_vars {
    pub const HERMES_READ_STRATEGY: &str = "HERMES_READ_STRATEGY";
    pub const HERMES_WRITE_STRATEGY: &str = "HERMES_WRITE_STRATEGY";
    pub const HERMES_MAX_PARALLEL: &str = "HERMES_MAX_PARALLEL";
    pub const HERMES_HEALTH_CHECK_INTERVAL_SECS: &str = "HERMES_HEALTH_CHECK_INTERVAL_SECS";
    pub const HERMES_HEALTH_CHECK_TIMEOUT_SECS: &str = "HERMES_HEALTH_CHECK_TIMEOUT_SECS";
    pub const HERMES_MAX_RETRIES: &str = "HERMES_MAX_RETRIES";
    pub const HERMES_INITIAL_BACKOFF_MS: &str = "HERMES_INITIAL_BACKOFF_MS";
    pub const HERMES_MAX_BACKOFF_MS: &str = "HERMES_MAX_BACKOFF_MS";
    pub const HERMES_BACKOFF_MULTIPLIER: &str = "HERMES_BACKOFF_MULTIPLIER";
    pub const HERMES_CORE_FIELDS: &str = "HERMES_CORE_FIELDS";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OLLAMA_HOST: &str = "OLLAMA_HOST";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

    /// Read a variable, treating empty values as unset.
    #[must_use]
    pub fn env_string(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn env_string_or_default(name: &str, default: &str) -> String {
        env_string(name).unwrap_or_else(|| default.to_string())
    }

    #[must_use]
    pub fn env_is_set(name: &str) -> bool {
        env_string(name).is_some()
    }

    #[must_use]
    pub fn env_u64_or_default(name: &str, default: u64) -> u64 {
        env_string(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Reference to a secret: resolved from the environment, or explicit (tests
/// and local tooling only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecretRef {
    Env { env: String },
    Value { value: String },
}

impl SecretRef {
    #[must_use]
    pub fn from_env(name: impl Into<String>) -> Self {
        SecretRef::Env { env: name.into() }
    }

    /// Resolve the secret's value.
    pub fn resolve(&self) -> Result<String> {
        match self {
            SecretRef::Env { env } => env_vars::env_string(env).ok_or_else(|| {
                Error::unauthorized(format!("environment variable {env} is not set"))
            }),
            SecretRef::Value { value } => Ok(value.clone()),
        }
    }
}

/// Router tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    pub read_strategy: ReadStrategy,
    pub write_strategy: WriteStrategy,
    pub health_check_interval_secs: u64,
    pub health_check_timeout_secs: u64,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            read_strategy: ReadStrategy::default(),
            write_strategy: WriteStrategy::default(),
            health_check_interval_secs: constants::HEALTH_CHECK_INTERVAL.as_secs(),
            health_check_timeout_secs: constants::HEALTH_CHECK_TIMEOUT.as_secs(),
        }
    }
}

/// Pipeline engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub max_parallel: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_parallel: constants::DEFAULT_MAX_PARALLEL,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// AI enrichment tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiOptions {
    /// Default model name, routed by the factory.
    pub model: String,
    pub max_content_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<SecretRef>,
    pub ollama_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrock_region: Option<String>,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_content_chars: constants::DEFAULT_MAX_CONTENT_CHARS,
            openai_api_key: Some(SecretRef::from_env(env_vars::OPENAI_API_KEY)),
            ollama_url: "http://localhost:11434".to_string(),
            bedrock_region: None,
        }
    }
}

/// Outbox relay tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxOptions {
    pub max_attempts: u32,
    pub retry_initial_backoff_secs: u64,
    pub retry_backoff_multiplier: f64,
    pub retry_max_backoff_secs: u64,
}

impl Default for OutboxOptions {
    fn default() -> Self {
        Self {
            max_attempts: crate::outbox::DEFAULT_MAX_ATTEMPTS,
            retry_initial_backoff_secs: 60,
            retry_backoff_multiplier: 2.0,
            retry_max_backoff_secs: 7200,
        }
    }
}

/// Frontmatter codec overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontmatterConfig {
    /// Replacement core field set; `None` keeps the built-in enumeration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_fields: Option<Vec<String>>,
}

/// Top-level Hermes configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HermesConfig {
    pub router: RouterOptions,
    pub pipeline: PipelineOptions,
    pub ai: AiOptions,
    pub outbox: OutboxOptions,
    pub frontmatter: FrontmatterConfig,
}

impl HermesConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yml::from_str(yaml)
            .map_err(|e| Error::parse(format!("invalid configuration: {e}")))
    }

    /// Apply environment overrides on top of the loaded values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        use env_vars::*;

        if let Some(raw) = env_string(HERMES_READ_STRATEGY) {
            if let Ok(strategy) = serde_yml::from_str::<ReadStrategy>(&raw) {
                self.router.read_strategy = strategy;
            }
        }
        if let Some(raw) = env_string(HERMES_WRITE_STRATEGY) {
            if let Ok(strategy) = serde_yml::from_str::<WriteStrategy>(&raw) {
                self.router.write_strategy = strategy;
            }
        }
        self.router.health_check_interval_secs = env_u64_or_default(
            HERMES_HEALTH_CHECK_INTERVAL_SECS,
            self.router.health_check_interval_secs,
        );
        self.router.health_check_timeout_secs = env_u64_or_default(
            HERMES_HEALTH_CHECK_TIMEOUT_SECS,
            self.router.health_check_timeout_secs,
        );
        self.pipeline.max_parallel =
            env_u64_or_default(HERMES_MAX_PARALLEL, self.pipeline.max_parallel as u64) as usize;
        self.pipeline.max_retries =
            env_u64_or_default(HERMES_MAX_RETRIES, u64::from(self.pipeline.max_retries)) as u32;
        self.pipeline.initial_backoff_ms =
            env_u64_or_default(HERMES_INITIAL_BACKOFF_MS, self.pipeline.initial_backoff_ms);
        self.pipeline.max_backoff_ms =
            env_u64_or_default(HERMES_MAX_BACKOFF_MS, self.pipeline.max_backoff_ms);
        if let Some(raw) = env_string(HERMES_BACKOFF_MULTIPLIER) {
            if let Ok(multiplier) = raw.parse() {
                self.pipeline.backoff_multiplier = multiplier;
            }
        }
        if let Some(raw) = env_string(HERMES_CORE_FIELDS) {
            self.frontmatter.core_fields =
                Some(raw.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Some(url) = env_string(OLLAMA_HOST) {
            self.ai.ollama_url = url;
        }
        if let Some(region) = env_string(AWS_DEFAULT_REGION).or_else(|| env_string(AWS_REGION)) {
            self.ai.bedrock_region = Some(region);
        }
        self
    }

    /// Frontmatter options derived from this configuration.
    #[must_use]
    pub fn frontmatter_options(&self) -> crate::frontmatter::FrontmatterOptions {
        crate::frontmatter::FrontmatterOptions {
            core_fields: self
                .frontmatter
                .core_fields
                .as_ref()
                .map(|fields| fields.iter().cloned().collect()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HermesConfig::default();
        assert_eq!(config.router.read_strategy, ReadStrategy::PrimaryThenFallback);
        assert_eq!(config.router.write_strategy, WriteStrategy::PrimaryOnly);
        assert_eq!(config.router.health_check_interval_secs, 30);
        assert_eq!(config.router.health_check_timeout_secs, 5);
        assert_eq!(config.pipeline.max_parallel, 3);
        assert_eq!(config.ai.max_content_chars, 40_000);
        assert_eq!(config.outbox.max_attempts, 5);
        assert_eq!(config.outbox.retry_initial_backoff_secs, 60);
        assert_eq!(config.outbox.retry_max_backoff_secs, 7200);
    }

    #[test]
    fn test_from_yaml_partial_document() {
        let yaml = r"
router:
  read_strategy: load_balance
  health_check_interval_secs: 10
pipeline:
  max_parallel: 8
";
        let config = HermesConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.router.read_strategy, ReadStrategy::LoadBalance);
        assert_eq!(config.router.health_check_interval_secs, 10);
        assert_eq!(config.pipeline.max_parallel, 8);
        // Unspecified sections keep defaults.
        assert_eq!(config.router.write_strategy, WriteStrategy::PrimaryOnly);
        assert_eq!(config.outbox.max_attempts, 5);
    }

    #[test]
    fn test_from_yaml_rejects_malformed_input() {
        assert!(HermesConfig::from_yaml("router: [not, a, map]").is_err());
    }

    #[test]
    fn test_secret_ref_explicit_value() {
        let secret = SecretRef::Value {
            value: "sk-test".to_string(),
        };
        assert_eq!(secret.resolve().unwrap(), "sk-test");
    }

    #[test]
    fn test_secret_ref_missing_env_fails() {
        let secret = SecretRef::from_env("HERMES_TEST_SECRET_THAT_DOES_NOT_EXIST");
        let err = secret.resolve().unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_secret_ref_yaml_forms() {
        #[derive(Deserialize)]
        struct Holder {
            secret: SecretRef,
        }
        let env_form: Holder = serde_yml::from_str("secret:\n  env: OPENAI_API_KEY\n").unwrap();
        assert_eq!(env_form.secret, SecretRef::from_env("OPENAI_API_KEY"));
        let value_form: Holder = serde_yml::from_str("secret:\n  value: sk-123\n").unwrap();
        assert_eq!(
            value_form.secret,
            SecretRef::Value {
                value: "sk-123".to_string()
            }
        );
    }

    #[test]
    fn test_frontmatter_options_from_config() {
        let yaml = r"
frontmatter:
  core_fields: [uuid, title]
";
        let config = HermesConfig::from_yaml(yaml).unwrap();
        let options = config.frontmatter_options();
        let set = options.core_fields.unwrap();
        assert!(set.contains("uuid"));
        assert!(set.contains("title"));
        assert_eq!(set.len(), 2);
    }
}
