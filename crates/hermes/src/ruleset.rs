//! Declarative ruleset matching.
//!
//! Rulesets are data, not code: a named set of conditions over document
//! attributes plus an ordered list of pipeline step names. The matcher is
//! pure and allocation-light; it returns borrowed references in input
//! order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::DocumentMetadata;

/// A declarative dispatch rule: which pipeline runs for which documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    pub name: String,
    /// Attribute conditions; all must hold. Empty matches every document.
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
    /// Ordered pipeline step names, resolved at pipeline construction.
    #[serde(default)]
    pub pipeline: Vec<String>,
    /// Open per-ruleset configuration.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Ruleset {
    /// Whether every condition equals the document's attribute value
    /// (string equality, case-sensitive).
    #[must_use]
    pub fn matches(&self, metadata: &DocumentMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.attribute(key).as_deref() == Some(expected))
    }
}

/// Select every ruleset whose conditions are satisfied, preserving input
/// order.
#[must_use]
pub fn match_rulesets<'a>(
    metadata: &DocumentMetadata,
    rulesets: &'a [Ruleset],
) -> Vec<&'a Ruleset> {
    rulesets.iter().filter(|r| r.matches(metadata)).collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{new_uuid, ProviderId, ProviderType};

    fn ruleset(name: &str, conditions: &[(&str, &str)], pipeline: &[&str]) -> Ruleset {
        Ruleset {
            name: name.to_string(),
            conditions: conditions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            pipeline: pipeline.iter().map(|s| s.to_string()).collect(),
            config: BTreeMap::new(),
        }
    }

    fn doc_with_type(document_type: &str) -> DocumentMetadata {
        let mut meta = DocumentMetadata::new(
            new_uuid(),
            ProviderId::new(ProviderType::Local, "a.md").unwrap(),
            "A",
        );
        meta.extended.insert(
            "document_type".to_string(),
            serde_json::Value::String(document_type.to_string()),
        );
        meta
    }

    #[test]
    fn test_matches_returns_satisfied_rulesets_in_order() {
        let rulesets = vec![
            ruleset("rfcs-only", &[("document_type", "RFC")], &["search_index"]),
            ruleset("all-documents", &[], &["search_index"]),
            ruleset(
                "prds-only",
                &[("document_type", "PRD")],
                &["search_index", "llm_summary"],
            ),
        ];
        let doc = doc_with_type("PRD");
        let matched = match_rulesets(&doc, &rulesets);
        let names: Vec<&str> = matched.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["all-documents", "prds-only"]);
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        let rulesets = vec![ruleset("catch-all", &[], &["index"])];
        let doc = doc_with_type("anything");
        assert_eq!(match_rulesets(&doc, &rulesets).len(), 1);
    }

    #[test]
    fn test_conditions_are_case_sensitive() {
        let rulesets = vec![ruleset("rfcs", &[("document_type", "RFC")], &["index"])];
        assert!(match_rulesets(&doc_with_type("rfc"), &rulesets).is_empty());
        assert_eq!(match_rulesets(&doc_with_type("RFC"), &rulesets).len(), 1);
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let rulesets = vec![ruleset(
            "platform-rfcs",
            &[("document_type", "RFC"), ("owning_team", "Platform")],
            &["index"],
        )];
        let mut doc = doc_with_type("RFC");
        assert!(match_rulesets(&doc, &rulesets).is_empty());
        doc.owning_team = Some("Platform".to_string());
        assert_eq!(match_rulesets(&doc, &rulesets).len(), 1);
    }

    #[test]
    fn test_core_attribute_conditions() {
        let rulesets = vec![ruleset("local-only", &[("provider_type", "local")], &["index"])];
        let doc = doc_with_type("x");
        assert_eq!(match_rulesets(&doc, &rulesets).len(), 1);
    }

    #[test]
    fn test_tag_membership_condition() {
        let rulesets = vec![ruleset("tagged", &[("tag:rfc", "true")], &["index"])];
        let mut doc = doc_with_type("x");
        assert!(match_rulesets(&doc, &rulesets).is_empty());
        doc.tags.push("rfc".to_string());
        assert_eq!(match_rulesets(&doc, &rulesets).len(), 1);
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let rulesets = vec![ruleset("by-project", &[("project", "apollo")], &["index"])];
        assert!(match_rulesets(&doc_with_type("x"), &rulesets).is_empty());
    }
}
