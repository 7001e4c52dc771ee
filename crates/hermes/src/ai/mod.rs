//! AI enrichment capability.
//!
//! One interface, [`AiProvider`], covers every backend: a cloud LLM, a
//! managed model service, or a local runtime. The prompt contract and the
//! response parser are shared so that switching backends never changes what
//! the pipeline stores.

pub mod parser;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_CONTENT_CHARS;
use crate::error::Result;

/// Sentinel appended when content is cut to fit the model's budget.
pub const TRUNCATION_SENTINEL: &str = "\n\n[content truncated]";

/// Options for a summarize call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeOptions {
    /// Model name, resolved by the factory.
    pub model: String,
    /// Character budget applied before prompting.
    pub max_content_chars: usize,
    /// Ask the backend to suggest a workflow status.
    pub suggest_status: bool,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            suggest_status: false,
        }
    }
}

/// Structured summary of a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub executive_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_status: Option<String>,
    /// Backend-reported confidence in [0, 1]; 0 when not reported.
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub tokens_used: u32,
    #[serde(default)]
    pub generation_time_ms: u64,
}

/// One embedded chunk with its byte offsets into the original text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub text: String,
    pub start_pos: usize,
    pub end_pos: usize,
    pub embedding: Vec<f32>,
}

/// Embeddings for a document: one whole-content vector plus per-chunk
/// vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEmbeddings {
    pub content_embedding: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<ChunkEmbedding>,
    pub dimensions: usize,
    pub model: String,
}

/// Chunking configuration for embedding long content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub max_chars: usize,
    /// Characters of overlap carried into the next chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 2000,
            overlap: 200,
        }
    }
}

/// Summarize/embed capability implemented by each AI backend crate.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generate a structured summary of `content`.
    async fn summarize(&self, content: &str, options: &SummarizeOptions) -> Result<Summary>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model name this provider is bound to.
    fn model(&self) -> &str;

    /// Embed a document: whole-content vector plus chunk vectors.
    ///
    /// The default chunks with [`chunk_text`], embeds content and chunks in
    /// one batch, and reassembles by position.
    async fn embed_document(
        &self,
        content: &str,
        chunking: Option<&ChunkingConfig>,
    ) -> Result<DocumentEmbeddings> {
        let spans = match chunking {
            Some(config) => chunk_text(content, config),
            None => Vec::new(),
        };
        let mut inputs = Vec::with_capacity(spans.len() + 1);
        inputs.push(content.to_string());
        inputs.extend(spans.iter().map(|s| s.text.clone()));

        let mut vectors = self.embed(&inputs).await?;
        let content_embedding = if vectors.is_empty() {
            Vec::new()
        } else {
            vectors.remove(0)
        };
        let dimensions = content_embedding.len();
        let chunks = spans
            .into_iter()
            .zip(vectors)
            .map(|(span, embedding)| ChunkEmbedding {
                text: span.text,
                start_pos: span.start,
                end_pos: span.end,
                embedding,
            })
            .collect();
        Ok(DocumentEmbeddings {
            content_embedding,
            chunks,
            dimensions,
            model: self.model().to_string(),
        })
    }
}

/// A chunk of text with its byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split text into character windows with overlap.
///
/// Offsets are byte positions into the original text and always land on
/// UTF-8 boundaries.
#[must_use]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<ChunkSpan> {
    if text.is_empty() || config.max_chars == 0 {
        return Vec::new();
    }
    let step = config.max_chars.saturating_sub(config.overlap).max(1);
    let char_positions: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let total_chars = char_positions.len();

    let mut chunks = Vec::new();
    let mut start_char = 0usize;
    while start_char < total_chars {
        let end_char = (start_char + config.max_chars).min(total_chars);
        let start_byte = char_positions[start_char];
        let end_byte = if end_char == total_chars {
            text.len()
        } else {
            char_positions[end_char]
        };
        chunks.push(ChunkSpan {
            text: text[start_byte..end_byte].to_string(),
            start: start_byte,
            end: end_byte,
        });
        if end_char == total_chars {
            break;
        }
        start_char += step;
    }
    chunks
}

/// Enforce the character budget, appending a visible sentinel when content
/// is cut. Cuts land on a character boundary.
#[must_use]
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let cut: String = content.chars().take(max_chars).collect();
    format!("{cut}{TRUNCATION_SENTINEL}")
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_content_untouched() {
        assert_eq!(truncate_content("short", 100), "short");
    }

    #[test]
    fn test_truncate_appends_sentinel() {
        let long = "x".repeat(50);
        let result = truncate_content(&long, 10);
        assert!(result.starts_with("xxxxxxxxxx"));
        assert!(result.ends_with(TRUNCATION_SENTINEL));
        assert_eq!(result.len(), 10 + TRUNCATION_SENTINEL.len());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let content = "héllo wörld".repeat(10);
        let result = truncate_content(&content, 7);
        assert!(result.ends_with(TRUNCATION_SENTINEL));
        // Must not panic on slicing and must contain whole characters.
        assert!(result.starts_with("héllo w"));
    }

    #[test]
    fn test_chunk_text_windows_and_offsets() {
        let text = "abcdefghij";
        let config = ChunkingConfig {
            max_chars: 4,
            overlap: 1,
        };
        let chunks = chunk_text(text, &config);
        assert_eq!(chunks[0].text, "abcd");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 4));
        assert_eq!(chunks[1].text, "defg");
        assert_eq!((chunks[1].start, chunks[1].end), (3, 7));
        // Final chunk reaches the end of the text.
        assert_eq!(chunks.last().unwrap().end, text.len());
    }

    #[test]
    fn test_chunk_text_covers_all_content() {
        let text = "0123456789".repeat(10);
        let config = ChunkingConfig {
            max_chars: 30,
            overlap: 5,
        };
        let chunks = chunk_text(&text, &config);
        assert_eq!(chunks.first().unwrap().start, 0);
        assert_eq!(chunks.last().unwrap().end, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "windows must overlap");
        }
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_chunk_text_single_chunk_when_short() {
        let chunks = chunk_text("tiny", &ChunkingConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
    }

    #[test]
    fn test_chunk_text_multibyte_offsets_are_boundaries() {
        let text = "áéíóú".repeat(20);
        let config = ChunkingConfig {
            max_chars: 7,
            overlap: 2,
        };
        for chunk in chunk_text(&text, &config) {
            // Slicing at reported offsets must not panic.
            let _ = &text[chunk.start..chunk.end];
        }
    }
}
