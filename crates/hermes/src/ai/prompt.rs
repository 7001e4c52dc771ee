//! Shared summarization prompt.
//!
//! Every backend receives the same instructions and must emit the same four
//! labelled sections, so [`crate::ai::parser`] works unchanged across
//! backends.

use super::{truncate_content, SummarizeOptions};

/// Build the summarization prompt for `content` under `options`.
///
/// The response contract fixes four sections: `EXECUTIVE SUMMARY`,
/// `KEY POINTS`, `TOPICS`, `TAGS`; a fifth `SUGGESTED STATUS` is requested
/// only when `options.suggest_status` is set.
#[must_use]
pub fn summarize_prompt(content: &str, options: &SummarizeOptions) -> String {
    let content = truncate_content(content, options.max_content_chars);
    let mut prompt = String::from(
        "Analyze the document below and respond with exactly these sections:\n\
         \n\
         EXECUTIVE SUMMARY\n\
         Two or three sentences capturing what the document is and why it matters.\n\
         \n\
         KEY POINTS\n\
         The most important points, one per line, each prefixed with '- '.\n\
         \n\
         TOPICS\n\
         Comma-separated subject areas covered by the document.\n\
         \n\
         TAGS\n\
         Comma-separated short labels suitable for faceted search.\n",
    );
    if options.suggest_status {
        prompt.push_str(
            "\nSUGGESTED STATUS\nA single workflow status label, e.g. Draft or Approved.\n",
        );
    }
    prompt.push_str("\n---\n\n");
    prompt.push_str(&content);
    prompt
}
