//! OpenAI summarize/embed client.
//!
//! Serves model names with the `gpt-`, `o1-`, and `o3-` prefixes. Summaries
//! use the shared labelled-section prompt from `hermes::ai::prompt`;
//! embeddings batch up to `chunk_size` texts per request and are reordered
//! by the response index before emission, so callers always receive vectors
//! in input order.
//!
//! # Example
//!
//! ```no_run
//! use hermes_openai::OpenAiClient;
//!
//! # fn example() -> hermes::Result<()> {
//! let client = OpenAiClient::try_new()?
//!     .with_model("gpt-4o-mini")
//!     .with_embedding_model("text-embedding-3-small");
//! # Ok(())
//! # }
//! ```

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequest, EmbeddingInput,
    },
    Client,
};
use async_trait::async_trait;

use hermes::ai::{parser, prompt, AiProvider, Summary, SummarizeOptions};
use hermes::config::env_vars::{env_string, OPENAI_API_KEY};
use hermes::error::{Error, Result};
use hermes::retry::{with_retry, RetryPolicy};

const SYSTEM_PROMPT: &str =
    "You are a documentation analyst. Answer only with the requested sections.";

/// OpenAI-backed [`AiProvider`].
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    /// Chat model used for summaries.
    model: String,
    /// Embedding model.
    embedding_model: String,
    /// Maximum texts per embedding request.
    chunk_size: usize,
    /// Optional reduced output dimensionality (text-embedding-3 models).
    dimensions: Option<u32>,
    retry_policy: RetryPolicy,
}

impl OpenAiClient {
    /// Build a client from `OPENAI_API_KEY`.
    pub fn try_new() -> Result<Self> {
        let api_key = env_string(OPENAI_API_KEY).ok_or_else(|| {
            Error::unauthorized(format!("{OPENAI_API_KEY} environment variable must be set"))
        })?;
        Ok(Self::with_api_key(api_key))
    }

    /// Build a client with an explicit API key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self {
            client: Client::with_config(config),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            chunk_size: 512,
            dimensions: None,
            retry_policy: RetryPolicy::exponential(3),
        }
    }

    /// Set the chat model used for summaries.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Maximum texts per embedding request. OpenAI accepts up to 2048.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Reduced output dimensionality (text-embedding-3 models only).
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn classify(err: &async_openai::error::OpenAIError) -> Error {
        match err {
            async_openai::error::OpenAIError::Reqwest(inner) if inner.is_timeout() => {
                Error::timeout(hermes::constants::CLOUD_LLM_TIMEOUT, "OpenAI request")
            }
            async_openai::error::OpenAIError::Reqwest(inner) => {
                Error::transient(format!("OpenAI transport error: {inner}"))
            }
            async_openai::error::OpenAIError::ApiError(api) => {
                let message = format!("OpenAI API error: {}", api.message);
                // Rate limits and server hiccups are worth retrying.
                let lowered = api.message.to_ascii_lowercase();
                if lowered.contains("rate limit") || lowered.contains("overloaded") {
                    Error::transient(message)
                } else {
                    Error::internal(message)
                }
            }
            other => Error::internal(format!("OpenAI error: {other}")),
        }
    }
}

/// Restore input order for embedding vectors using the response index.
///
/// The API may return batched vectors out of order; `data[i].index` names
/// the position within the submitted batch.
fn reorder_by_index(mut indexed: Vec<(u32, Vec<f32>)>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if indexed.len() != expected {
        return Err(Error::parse(format!(
            "embedding response carried {} vectors for {expected} inputs",
            indexed.len()
        )));
    }
    indexed.sort_by_key(|(index, _)| *index);
    for (position, (index, _)) in indexed.iter().enumerate() {
        if *index as usize != position {
            return Err(Error::parse(format!(
                "embedding response index {index} does not match position {position}"
            )));
        }
    }
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[async_trait]
impl AiProvider for OpenAiClient {
    async fn summarize(&self, content: &str, options: &SummarizeOptions) -> Result<Summary> {
        let started = std::time::Instant::now();
        let prompt = prompt::summarize_prompt(content, options);
        let model = if options.model.is_empty() {
            self.model.clone()
        } else {
            options.model.clone()
        };
        let request = CreateChatCompletionRequestArgs::default()
            .model(&model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| Error::internal(format!("failed to build request: {e}")))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt.as_str())
                    .build()
                    .map_err(|e| Error::internal(format!("failed to build request: {e}")))?
                    .into(),
            ])
            .build()
            .map_err(|e| Error::internal(format!("failed to build request: {e}")))?;

        let response = with_retry(&self.retry_policy, || async {
            self.client
                .chat()
                .create(request.clone())
                .await
                .map_err(|e| Self::classify(&e))
        })
        .await?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| Error::parse("OpenAI response carried no message content"))?;

        let mut summary = parser::parse_summary_response(&text)?;
        summary.tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or_default();
        summary.generation_time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.chunk_size) {
            let request = CreateEmbeddingRequest {
                model: self.embedding_model.clone(),
                input: EmbeddingInput::StringArray(batch.to_vec()),
                encoding_format: None,
                dimensions: self.dimensions,
                user: None,
            };
            let response = with_retry(&self.retry_policy, || async {
                self.client
                    .embeddings()
                    .create(request.clone())
                    .await
                    .map_err(|e| Self::classify(&e))
            })
            .await?;

            let indexed: Vec<(u32, Vec<f32>)> = response
                .data
                .into_iter()
                .map(|data| (data.index, data.embedding))
                .collect();
            all.extend(reorder_by_index(indexed, batch.len())?);
        }
        Ok(all)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = OpenAiClient::with_api_key("sk-test");
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.embedding_model, "text-embedding-3-small");
        assert_eq!(client.chunk_size, 512);
        assert!(client.dimensions.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let client = OpenAiClient::with_api_key("sk-test")
            .with_model("gpt-4o")
            .with_embedding_model("text-embedding-3-large")
            .with_chunk_size(64)
            .with_dimensions(512);
        assert_eq!(client.model, "gpt-4o");
        assert_eq!(client.embedding_model, "text-embedding-3-large");
        assert_eq!(client.chunk_size, 64);
        assert_eq!(client.dimensions, Some(512));
    }

    #[test]
    fn test_chunk_size_floor() {
        let client = OpenAiClient::with_api_key("sk-test").with_chunk_size(0);
        assert_eq!(client.chunk_size, 1);
    }

    #[test]
    fn test_reorder_restores_input_order() {
        let shuffled = vec![
            (2, vec![2.0]),
            (0, vec![0.0]),
            (1, vec![1.0]),
        ];
        let ordered = reorder_by_index(shuffled, 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_reorder_rejects_missing_vectors() {
        let short = vec![(0, vec![0.0])];
        assert!(reorder_by_index(short, 2).is_err());
    }

    #[test]
    fn test_reorder_rejects_gapped_indexes() {
        let gapped = vec![(0, vec![0.0]), (2, vec![2.0])];
        assert!(reorder_by_index(gapped, 2).is_err());
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY and network access"]
    async fn test_summarize_live() {
        let client = OpenAiClient::try_new().unwrap();
        let summary = client
            .summarize(
                "Hermes routes documents across backends.",
                &SummarizeOptions::default(),
            )
            .await
            .unwrap();
        assert!(!summary.executive_summary.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY and network access"]
    async fn test_embed_live() {
        let client = OpenAiClient::try_new().unwrap();
        let vectors = client
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(!vectors[0].is_empty());
    }
}
