//! Ollama summarize/embed client.
//!
//! Local inference without API credentials. Serves model names with the
//! `llama`, `mistral`, `codellama`, `phi`, `qwen`, and `gemma` prefixes.
//! Generation can be CPU-bound, so the runtime gets a generous timeout
//! compared to the cloud backends; callers bound it with the ambient
//! deadline.
//!
//! # Example
//!
//! ```no_run
//! use hermes_ollama::OllamaClient;
//!
//! let client = OllamaClient::new()
//!     .with_model("llama3.2")
//!     .with_embedding_model("nomic-embed-text");
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use ollama_rs::{
    generation::completion::request::GenerationRequest,
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    Ollama,
};

use hermes::ai::{parser, prompt, AiProvider, Summary, SummarizeOptions};
use hermes::config::env_vars::{env_string_or_default, OLLAMA_HOST};
use hermes::error::{Error, Result};
use hermes::retry::{with_retry, RetryPolicy};

/// Ollama-backed [`AiProvider`].
#[derive(Clone)]
pub struct OllamaClient {
    client: Arc<Ollama>,
    model: String,
    embedding_model: String,
    /// Truncate over-length inputs server-side instead of erroring.
    truncate: bool,
    retry_policy: RetryPolicy,
}

impl OllamaClient {
    /// Connect to the host named by `OLLAMA_HOST`, defaulting to
    /// `http://localhost:11434`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(env_string_or_default(OLLAMA_HOST, "http://localhost:11434"))
    }

    /// Connect to an explicit base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let ollama = Ollama::new(base_url.into(), 11434);
        Self {
            client: Arc::new(ollama),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            truncate: true,
            retry_policy: RetryPolicy::exponential(3),
        }
    }

    /// Set the generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model.
    ///
    /// Common choices: `nomic-embed-text` (768 dims), `mxbai-embed-large`
    /// (1024 dims), `all-minilm` (384 dims).
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Whether over-length inputs are truncated rather than rejected.
    #[must_use]
    pub fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for OllamaClient {
    async fn summarize(&self, content: &str, options: &SummarizeOptions) -> Result<Summary> {
        let started = std::time::Instant::now();
        let prompt = prompt::summarize_prompt(content, options);
        let model = if options.model.is_empty() {
            self.model.clone()
        } else {
            options.model.clone()
        };
        let client = Arc::clone(&self.client);

        let response = with_retry(&self.retry_policy, move || {
            let client = Arc::clone(&client);
            let model = model.clone();
            let prompt = prompt.clone();
            async move {
                client
                    .generate(GenerationRequest::new(model, prompt))
                    .await
                    .map_err(|e| Error::transient(format!("Ollama generation error: {e}")))
            }
        })
        .await?;

        let mut summary = parser::parse_summary_response(&response.response)?;
        if let (Some(prompt_eval_count), Some(eval_count)) =
            (response.prompt_eval_count, response.eval_count)
        {
            summary.tokens_used = (prompt_eval_count + eval_count) as u32;
        }
        summary.generation_time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        // Ollama's embedding API is natively batched and preserves input
        // order.
        let texts_vec = texts.to_vec();
        let model = self.embedding_model.clone();
        let truncate = self.truncate;
        let client = Arc::clone(&self.client);

        let response = with_retry(&self.retry_policy, move || {
            let client = Arc::clone(&client);
            let model = model.clone();
            let texts_vec = texts_vec.clone();
            async move {
                let input = EmbeddingsInput::Multiple(texts_vec);
                let request = GenerateEmbeddingsRequest::new(model, input).truncate(truncate);
                client
                    .generate_embeddings(request)
                    .await
                    .map_err(|e| Error::transient(format!("Ollama embeddings error: {e}")))
            }
        })
        .await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::parse(format!(
                "Ollama returned {} vectors for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }
        Ok(response.embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
