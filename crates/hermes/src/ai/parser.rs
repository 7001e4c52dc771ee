//! Parser for the labelled-section summary response.
//!
//! Tolerant of blank lines, casing, markdown heading markers, and trailing
//! colons on section headers; strict about one thing only: a response with
//! no executive summary is rejected.

use crate::error::{Error, Result};

use super::Summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ExecutiveSummary,
    KeyPoints,
    Topics,
    Tags,
    SuggestedStatus,
}

/// Recognize a section header line, ignoring case, `#`/`*` decoration, and a
/// trailing colon.
fn header_for(line: &str) -> Option<Section> {
    let cleaned = line
        .trim()
        .trim_start_matches(['#', '*', ' '])
        .trim_end_matches([':', '*', ' '])
        .to_ascii_uppercase();
    match cleaned.as_str() {
        "EXECUTIVE SUMMARY" => Some(Section::ExecutiveSummary),
        "KEY POINTS" => Some(Section::KeyPoints),
        "TOPICS" => Some(Section::Topics),
        "TAGS" => Some(Section::Tags),
        "SUGGESTED STATUS" => Some(Section::SuggestedStatus),
        _ => None,
    }
}

fn strip_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    for prefix in ["- ", "* ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Some(rest.trim());
        }
    }
    // A bare "-" bullet with no space still counts.
    for prefix in ["-", "*", "•"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }
    None
}

fn split_comma_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parse a backend's summary response into a [`Summary`].
///
/// Fails with a parse error when the response lacks an executive summary.
pub fn parse_summary_response(response: &str) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut current: Option<Section> = None;
    let mut executive_lines: Vec<String> = Vec::new();
    let mut topics_text = String::new();
    let mut tags_text = String::new();

    for line in response.lines() {
        if let Some(section) = header_for(line) {
            current = Some(section);
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match current {
            Some(Section::ExecutiveSummary) => executive_lines.push(trimmed.to_string()),
            Some(Section::KeyPoints) => {
                let point = strip_bullet(trimmed).unwrap_or(trimmed);
                summary.key_points.push(point.to_string());
            }
            Some(Section::Topics) => {
                if !topics_text.is_empty() {
                    topics_text.push(' ');
                }
                topics_text.push_str(trimmed);
            }
            Some(Section::Tags) => {
                if !tags_text.is_empty() {
                    tags_text.push(' ');
                }
                tags_text.push_str(trimmed);
            }
            Some(Section::SuggestedStatus) => {
                if summary.suggested_status.is_none() {
                    summary.suggested_status = Some(trimmed.to_string());
                }
            }
            None => {}
        }
    }

    summary.executive_summary = executive_lines.join(" ");
    if summary.executive_summary.is_empty() {
        return Err(Error::parse(
            "summary response lacks an EXECUTIVE SUMMARY section",
        ));
    }
    summary.topics = split_comma_list(&topics_text);
    summary.tags = split_comma_list(&tags_text);
    Ok(summary)
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
EXECUTIVE SUMMARY
This document defines the diff classification system.
It standardizes how changes are labelled.

KEY POINTS
- Classifies diffs into minor and major
- Ships a shared taxonomy
* Works across providers

TOPICS
observability, diffs, classification

TAGS
rfc, diff, platform
";

    #[test]
    fn test_parse_well_formed_response() {
        let summary = parse_summary_response(WELL_FORMED).unwrap();
        assert!(summary
            .executive_summary
            .starts_with("This document defines"));
        assert_eq!(summary.key_points.len(), 3);
        assert_eq!(summary.key_points[2], "Works across providers");
        assert_eq!(
            summary.topics,
            vec!["observability", "diffs", "classification"]
        );
        assert_eq!(summary.tags, vec!["rfc", "diff", "platform"]);
        assert!(summary.suggested_status.is_none());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let response = "executive summary\nThe gist.\n\nkey points\n- one\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.executive_summary, "The gist.");
        assert_eq!(summary.key_points, vec!["one"]);
    }

    #[test]
    fn test_parse_tolerates_markdown_headers_and_colons() {
        let response = "## Executive Summary:\nThe gist.\n\n## Tags:\na, b\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.executive_summary, "The gist.");
        assert_eq!(summary.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_unicode_bullets() {
        let response = "EXECUTIVE SUMMARY\nGist.\n\nKEY POINTS\n• first\n• second\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.key_points, vec!["first", "second"]);
    }

    #[test]
    fn test_parse_rejects_missing_executive_summary() {
        let response = "KEY POINTS\n- point\n\nTOPICS\na, b\n";
        let err = parse_summary_response(response).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("EXECUTIVE SUMMARY"));
    }

    #[test]
    fn test_parse_rejects_empty_response() {
        assert!(parse_summary_response("").is_err());
    }

    #[test]
    fn test_parse_suggested_status() {
        let response =
            "EXECUTIVE SUMMARY\nGist.\n\nSUGGESTED STATUS\nApproved\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.suggested_status.as_deref(), Some("Approved"));
    }

    #[test]
    fn test_parse_unlabelled_preamble_ignored() {
        let response =
            "Sure, here is the analysis you asked for.\n\nEXECUTIVE SUMMARY\nGist.\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.executive_summary, "Gist.");
    }

    #[test]
    fn test_parse_multiline_comma_lists() {
        let response = "EXECUTIVE SUMMARY\nGist.\n\nTOPICS\nalpha, beta,\ngamma\n";
        let summary = parse_summary_response(response).unwrap();
        assert_eq!(summary.topics, vec!["alpha", "beta", "gamma"]);
    }
}
