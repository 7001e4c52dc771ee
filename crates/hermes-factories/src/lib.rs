//! Provider-agnostic AI backend selection.
//!
//! One factory maps a requested model name to a bound client. The prompt
//! and response contract is shared across backends, so callers never care
//! which client comes back.
//!
//! # Routing
//!
//! | Model name | Backend |
//! |---|---|
//! | `gpt-*`, `o1-*`, `o3-*` | OpenAI |
//! | containing `claude`/`titan`, prefixes `us.`/`anthropic.` | AWS Bedrock |
//! | `llama*`, `mistral*`, `codellama*`, `phi*`, `qwen*`, `gemma*` | Ollama |
//! | anything else | OpenAI, with a warning |
//!
//! Lookups are case-insensitive. Credentials are validated per backend
//! before a client is constructed: OpenAI requires an API key, Bedrock a
//! region, Ollama nothing.

use std::sync::Arc;

use tracing::warn;

use hermes::ai::AiProvider;
use hermes::config::env_vars::{env_string, AWS_DEFAULT_REGION, AWS_REGION, OPENAI_API_KEY};
use hermes::config::AiOptions;
use hermes::error::{Error, Result};
use hermes_bedrock::BedrockClient;
use hermes_ollama::OllamaClient;
use hermes_openai::OpenAiClient;

/// The backend families a model name can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackend {
    OpenAi,
    Bedrock,
    Ollama,
}

/// Pure routing decision for a model name.
///
/// Unknown names fall back to OpenAI; [`create_ai_provider`] warns when
/// that happens.
#[must_use]
pub fn backend_for(model: &str) -> AiBackend {
    let name = model.trim().to_ascii_lowercase();
    if name.starts_with("gpt-") || name.starts_with("o1-") || name.starts_with("o3-") {
        return AiBackend::OpenAi;
    }
    if name.contains("claude")
        || name.contains("titan")
        || name.starts_with("us.")
        || name.starts_with("anthropic.")
    {
        return AiBackend::Bedrock;
    }
    const LOCAL_PREFIXES: [&str; 6] = ["llama", "mistral", "codellama", "phi", "qwen", "gemma"];
    if LOCAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        return AiBackend::Ollama;
    }
    AiBackend::OpenAi
}

fn is_known(model: &str) -> bool {
    let name = model.trim().to_ascii_lowercase();
    backend_for(model) != AiBackend::OpenAi
        || name.starts_with("gpt-")
        || name.starts_with("o1-")
        || name.starts_with("o3-")
}

/// Create a client bound to `model`, validating backend credentials.
pub async fn create_ai_provider(model: &str, options: &AiOptions) -> Result<Arc<dyn AiProvider>> {
    if !is_known(model) {
        warn!(model, "unknown model name; defaulting to the OpenAI backend");
    }
    match backend_for(model) {
        AiBackend::OpenAi => {
            let api_key = match &options.openai_api_key {
                Some(secret) => secret.resolve()?,
                None => env_string(OPENAI_API_KEY).ok_or_else(|| {
                    Error::unauthorized(format!(
                        "model '{model}' routes to OpenAI but no API key is configured"
                    ))
                })?,
            };
            Ok(Arc::new(
                OpenAiClient::with_api_key(api_key).with_model(model),
            ))
        }
        AiBackend::Bedrock => {
            let region = options
                .bedrock_region
                .clone()
                .or_else(|| env_string(AWS_DEFAULT_REGION))
                .or_else(|| env_string(AWS_REGION))
                .ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "model '{model}' routes to Bedrock but no region is configured"
                    ))
                })?;
            Ok(Arc::new(
                BedrockClient::new(region).await?.with_model(model),
            ))
        }
        AiBackend::Ollama => Ok(Arc::new(
            OllamaClient::with_base_url(options.ollama_url.clone()).with_model(model),
        )),
    }
}

/// Create a client for the configured default model.
pub async fn create_default_provider(options: &AiOptions) -> Result<Arc<dyn AiProvider>> {
    create_ai_provider(&options.model, options).await
}
