//! AWS Bedrock summarize/embed client.
//!
//! Serves model names containing `claude` or `titan` and the `us.` /
//! `anthropic.` prefixes. Summaries go through the Converse API; embeddings
//! invoke Amazon Titan models with a JSON body.
//!
//! Authentication uses the standard AWS SDK chain (environment variables,
//! credentials file, instance profile); only the region must be supplied.
//!
//! # Example
//!
//! ```no_run
//! use hermes_bedrock::BedrockClient;
//!
//! # async fn example() -> hermes::Result<()> {
//! let client = BedrockClient::new("us-east-1")
//!     .await?
//!     .with_model("anthropic.claude-3-haiku-20240307-v1:0");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, Message};
use aws_sdk_bedrockruntime::Client;
use serde::{Deserialize, Serialize};

use hermes::ai::{parser, prompt, AiProvider, Summary, SummarizeOptions};
use hermes::error::{Error, Result};
use hermes::retry::{with_retry, RetryPolicy};

/// Bedrock model identifiers used by Hermes deployments.
pub mod models {
    /// Claude 3 Haiku, the default summarization model.
    pub const CLAUDE_3_HAIKU: &str = "anthropic.claude-3-haiku-20240307-v1:0";
    /// Claude 3 Sonnet for higher-quality summaries.
    pub const CLAUDE_3_SONNET: &str = "anthropic.claude-3-sonnet-20240229-v1:0";
    /// Amazon Titan Text Embeddings v2 (1024 dimensions).
    pub const TITAN_EMBED_TEXT_V2: &str = "amazon.titan-embed-text-v2:0";
    /// Amazon Titan Text Embeddings v1 (1536 dimensions).
    pub const TITAN_EMBED_TEXT_V1: &str = "amazon.titan-embed-text-v1";
}

/// Bedrock-backed [`AiProvider`].
#[derive(Clone)]
pub struct BedrockClient {
    client: Client,
    model_id: String,
    embedding_model_id: String,
    region: String,
    /// Output dimensions, Titan v2 only (256-1024).
    dimensions: Option<u32>,
    retry_policy: RetryPolicy,
}

impl BedrockClient {
    /// Build a client for `region` using the standard AWS credential
    /// chain.
    pub async fn new(region: impl Into<String>) -> Result<Self> {
        let region_str = region.into();
        if region_str.is_empty() {
            return Err(Error::invalid_argument("Bedrock region must not be empty"));
        }
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region_str.clone()))
            .load()
            .await;
        Ok(Self {
            client: Client::new(&config),
            model_id: models::CLAUDE_3_HAIKU.to_string(),
            embedding_model_id: models::TITAN_EMBED_TEXT_V2.to_string(),
            region: region_str,
            dimensions: None,
            retry_policy: RetryPolicy::exponential(3),
        })
    }

    /// The AWS region this client talks to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Set the generation model id.
    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the embedding model id.
    #[must_use]
    pub fn with_embedding_model(mut self, model_id: impl Into<String>) -> Self {
        self.embedding_model_id = model_id.into();
        self
    }

    /// Output dimensionality, Titan v2 only. Clamped to 256-1024.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions.clamp(256, 1024));
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn is_titan_v2(&self) -> bool {
        self.embedding_model_id.contains("titan-embed-text-v2")
    }

    fn build_embed_request(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct TitanV2Request<'a> {
            input_text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            dimensions: Option<u32>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct TitanV1Request<'a> {
            input_text: &'a str,
        }

        let body = if self.is_titan_v2() {
            serde_json::to_vec(&TitanV2Request {
                input_text: text,
                dimensions: self.dimensions,
            })
        } else {
            serde_json::to_vec(&TitanV1Request { input_text: text })
        };
        body.map_err(|e| Error::internal(format!("failed to encode embed request: {e}")))
    }

    fn parse_embed_response(&self, body: &[u8]) -> Result<Vec<f32>> {
        #[derive(Deserialize)]
        struct TitanResponse {
            embedding: Vec<f32>,
        }
        let parsed: TitanResponse = serde_json::from_slice(body)
            .map_err(|e| Error::parse(format!("malformed Titan embedding response: {e}")))?;
        Ok(parsed.embedding)
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let body = self.build_embed_request(text)?;
        let response = with_retry(&self.retry_policy, || {
            let body = body.clone();
            async move {
                self.client
                    .invoke_model()
                    .model_id(&self.embedding_model_id)
                    .body(Blob::new(body))
                    .content_type("application/json")
                    .accept("application/json")
                    .send()
                    .await
                    .map_err(|e| Error::transient(format!("Bedrock API error: {e}")))
            }
        })
        .await?;
        self.parse_embed_response(response.body().as_ref())
    }
}

#[async_trait]
impl AiProvider for BedrockClient {
    async fn summarize(&self, content: &str, options: &SummarizeOptions) -> Result<Summary> {
        let started = std::time::Instant::now();
        let prompt = prompt::summarize_prompt(content, options);
        let model_id = if options.model.is_empty() {
            self.model_id.clone()
        } else {
            options.model.clone()
        };

        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt))
            .build()
            .map_err(|e| Error::internal(format!("failed to build request: {e}")))?;

        let response = with_retry(&self.retry_policy, || {
            let message = message.clone();
            let model_id = model_id.clone();
            async move {
                self.client
                    .converse()
                    .model_id(model_id)
                    .messages(message)
                    .send()
                    .await
                    .map_err(|e| Error::transient(format!("Bedrock API error: {e}")))
            }
        })
        .await?;

        let tokens_used = response
            .usage()
            .map(|usage| usage.total_tokens() as u32)
            .unwrap_or_default();
        let text = match response.output {
            Some(aws_sdk_bedrockruntime::types::ConverseOutput::Message(message)) => message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text(text) => Some(text),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        };
        if text.is_empty() {
            return Err(Error::parse("Bedrock response carried no text content"));
        }

        let mut summary = parser::parse_summary_response(&text)?;
        summary.tokens_used = tokens_used;
        summary.generation_time_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Titan embeds one input per invocation; requests run sequentially
        // in input order, so no reordering is needed.
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_single(text).await?);
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model_id
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> BedrockClient {
        BedrockClient::new("us-east-1").await.unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let client = test_client().await;
        assert_eq!(client.model_id, models::CLAUDE_3_HAIKU);
        assert_eq!(client.embedding_model_id, models::TITAN_EMBED_TEXT_V2);
        assert_eq!(client.region(), "us-east-1");
    }

    #[tokio::test]
    async fn test_empty_region_rejected() {
        assert!(BedrockClient::new("").await.is_err());
    }

    #[tokio::test]
    async fn test_dimensions_clamped() {
        let client = test_client().await.with_dimensions(64);
        assert_eq!(client.dimensions, Some(256));
        let client = test_client().await.with_dimensions(4096);
        assert_eq!(client.dimensions, Some(1024));
    }

    #[tokio::test]
    async fn test_titan_v2_request_includes_dimensions() {
        let client = test_client().await.with_dimensions(512);
        let body = client.build_embed_request("hello").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["inputText"], "hello");
        assert_eq!(value["dimensions"], 512);
    }

    #[tokio::test]
    async fn test_titan_v1_request_omits_dimensions() {
        let client = test_client()
            .await
            .with_embedding_model(models::TITAN_EMBED_TEXT_V1)
            .with_dimensions(512);
        let body = client.build_embed_request("hello").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["inputText"], "hello");
        assert!(value.get("dimensions").is_none());
    }

    #[tokio::test]
    async fn test_parse_embed_response() {
        let client = test_client().await;
        let body = br#"{"embedding": [0.1, 0.2, 0.3], "inputTextTokenCount": 3}"#;
        let vector = client.parse_embed_response(body).unwrap();
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn test_parse_embed_response_rejects_garbage() {
        let client = test_client().await;
        assert!(client.parse_embed_response(b"not json").is_err());
    }

    #[tokio::test]
    #[ignore = "requires AWS credentials and network access"]
    async fn test_summarize_live() {
        let client = test_client().await;
        let summary = client
            .summarize(
                "Hermes routes documents across backends.",
                &SummarizeOptions::default(),
            )
            .await
            .unwrap();
        assert!(!summary.executive_summary.is_empty());
    }
}
