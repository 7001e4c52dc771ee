//! Frontmatter codec for text documents.
//!
//! Documents carry a structured metadata prefix:
//!
//! ```text
//! ---
//! title: RFC-010
//! tags: [rfc, diff]
//! ---
//!
//! Body text...
//! ```
//!
//! The block is a line-oriented `key: value` prefix, not full YAML. Core
//! fields are recognized from a fixed enumeration; everything else is
//! preserved verbatim in [`ExtendedMetadata`]. Parsing never fails on a bad
//! field value: a core field that cannot be interpreted is demoted to
//! extended metadata instead.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::identity::{self, ProviderId, ProviderType};
use crate::model::{
    content_hash, DocumentMetadata, ExtendedMetadata, SyncStatus, UserIdentity,
};

/// Field names recognized as core metadata, after normalization
/// (lowercase, `-` folded to `_`).
pub const CORE_FIELDS: &[&str] = &[
    "uuid",
    "hermes_uuid",
    "provider_type",
    "provider_id",
    "title",
    "name",
    "mime_type",
    "created",
    "created_time",
    "updated",
    "modified",
    "modified_time",
    "owner",
    "author",
    "owning_team",
    "contributors",
    "parents",
    "project",
    "project_id",
    "tags",
    "sync_status",
    "workflow_status",
    "status",
    "content_hash",
];

/// Codec options. The default recognizes [`CORE_FIELDS`].
#[derive(Debug, Clone, Default)]
pub struct FrontmatterOptions {
    /// Override of the core field set (normalized names). `None` keeps the
    /// built-in enumeration.
    pub core_fields: Option<BTreeSet<String>>,
}

impl FrontmatterOptions {
    fn is_core(&self, normalized: &str) -> bool {
        match &self.core_fields {
            Some(set) => set.contains(normalized),
            None => CORE_FIELDS.contains(&normalized),
        }
    }
}

/// Result of parsing a document: the metadata projection plus the body text.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub metadata: DocumentMetadata,
    pub body: String,
}

/// Parse a document with the default options.
pub fn parse(input: &str, provider_id: &ProviderId) -> Result<ParsedDocument> {
    parse_with_options(input, provider_id, &FrontmatterOptions::default())
}

/// Parse a document of the form `---\n<block>\n---\n<body>`.
///
/// Defaults are filled for absent core fields: a fresh UUID is minted,
/// `sync_status` becomes `canonical`, `mime_type` becomes `text/markdown`,
/// and timestamps fall back to now. The content hash is always computed from
/// the body; a stored `content_hash` field is recognized but not trusted.
pub fn parse_with_options(
    input: &str,
    provider_id: &ProviderId,
    options: &FrontmatterOptions,
) -> Result<ParsedDocument> {
    // split_inclusive keeps the line terminators, so `consumed` tracks exact
    // byte offsets even for CRLF input.
    let mut segments = input.split_inclusive('\n');
    let mut consumed = match segments.next() {
        Some(first) if first.trim_end() == "---" => first.len(),
        _ => {
            return Err(Error::parse(format!(
                "missing frontmatter: document '{provider_id}' does not start with '---'"
            )))
        }
    };

    let mut block: Vec<&str> = Vec::new();
    let mut terminated = false;
    for segment in segments {
        consumed += segment.len();
        let line = segment.trim_end_matches('\n').trim_end_matches('\r');
        if line.trim_end() == "---" {
            terminated = true;
            break;
        }
        block.push(line);
    }
    if !terminated {
        return Err(Error::parse(format!(
            "unterminated frontmatter: document '{provider_id}' has no closing '---'"
        )));
    }

    let body = input[consumed..]
        .trim_start_matches(['\n', '\r'])
        .trim_end()
        .to_string();

    let mut builder = MetadataBuilder::new(provider_id.clone());
    for line in block {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((raw_key, raw_value)) = trimmed.split_once(':') else {
            // Lines without a separator are ignored rather than failing the parse.
            continue;
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        if key.is_empty() {
            continue;
        }
        let normalized = normalize_key(key);
        if options.is_core(&normalized) {
            builder.apply_core(&normalized, key, value);
        } else {
            builder.extended.insert(key.to_string(), coerce(value));
        }
    }

    let mut metadata = builder.finish();
    metadata.content_hash = content_hash(&body);
    Ok(ParsedDocument { metadata, body })
}

/// Serialize metadata and body back into frontmatter form.
///
/// The inverse of [`parse`]: round-trip stable for core fields and for
/// extended values that are scalars or arrays of scalars.
#[must_use]
pub fn serialize(metadata: &DocumentMetadata, body: &str) -> String {
    let mut out = String::from("---\n");
    push_field(&mut out, "uuid", &metadata.uuid.to_string());
    push_field(&mut out, "title", &metadata.name);
    push_field(&mut out, "provider_type", metadata.provider_type.as_str());
    push_field(&mut out, "provider_id", &metadata.provider_id.to_string());
    push_field(&mut out, "mime_type", &metadata.mime_type);
    push_field(&mut out, "created", &metadata.created_time.to_rfc3339());
    push_field(&mut out, "modified", &metadata.modified_time.to_rfc3339());
    if let Some(owner) = &metadata.owner {
        push_field(&mut out, "owner", &owner.email);
    }
    if let Some(team) = &metadata.owning_team {
        push_field(&mut out, "owning_team", team);
    }
    if !metadata.contributors.is_empty() {
        push_field(&mut out, "contributors", &render_list(&metadata.contributors));
    }
    if !metadata.parents.is_empty() {
        push_field(&mut out, "parents", &render_list(&metadata.parents));
    }
    if let Some(project) = &metadata.project {
        push_field(&mut out, "project", project);
    }
    if !metadata.tags.is_empty() {
        push_field(&mut out, "tags", &render_list(&metadata.tags));
    }
    push_field(&mut out, "sync_status", metadata.sync_status.as_str());
    if let Some(status) = &metadata.workflow_status {
        push_field(&mut out, "workflow_status", status);
    }
    for (key, value) in &metadata.extended {
        push_field(&mut out, key, &render_value(value));
    }
    out.push_str("---\n\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn render_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Render an extended value so that re-parsing coerces it back to the same
/// type: strings that would read as something else are quoted.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let reparsed = coerce(s);
            if reparsed == Value::String(s.clone()) {
                s.clone()
            } else {
                format!("\"{s}\"")
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => render_value(other),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
        other => other.to_string(),
    }
}

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase().replace('-', "_")
}

/// Coerce a raw frontmatter value: bool, integer, float, bracketed array,
/// otherwise string with surrounding quotes stripped.
fn coerce(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(f) {
            return Value::Number(num);
        }
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let items: Vec<Value> = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match coerce(s) {
                Value::Array(_) => Value::String(strip_quotes(s).to_string()),
                scalar => scalar,
            })
            .collect();
        return Value::Array(items);
    }
    Value::String(strip_quotes(trimmed).to_string())
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Parse a frontmatter timestamp in one of the accepted formats.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = strip_quotes(raw);
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn string_list(raw: &str) -> Vec<String> {
    match coerce(raw) {
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if s.contains(',') => {
            s.split(',').map(|p| p.trim().to_string()).collect()
        }
        Value::String(s) => vec![s],
        other => vec![other.to_string()],
    }
}

struct MetadataBuilder {
    provider_id: ProviderId,
    uuid: Option<Uuid>,
    name: Option<String>,
    title_seen: bool,
    mime_type: Option<String>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    owner: Option<UserIdentity>,
    owning_team: Option<String>,
    contributors: Vec<String>,
    parents: Vec<String>,
    project: Option<String>,
    tags: Vec<String>,
    sync_status: Option<SyncStatus>,
    workflow_status: Option<String>,
    provider_type_override: Option<ProviderType>,
    provider_id_override: Option<ProviderId>,
    extended: ExtendedMetadata,
}

impl MetadataBuilder {
    fn new(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            uuid: None,
            name: None,
            title_seen: false,
            mime_type: None,
            created: None,
            modified: None,
            owner: None,
            owning_team: None,
            contributors: Vec::new(),
            parents: Vec::new(),
            project: None,
            tags: Vec::new(),
            sync_status: None,
            workflow_status: None,
            provider_type_override: None,
            provider_id_override: None,
            extended: ExtendedMetadata::new(),
        }
    }

    /// Apply one recognized core field. An uninterpretable value demotes the
    /// field to extended metadata under its original key.
    fn apply_core(&mut self, normalized: &str, original_key: &str, value: &str) {
        match normalized {
            "uuid" | "hermes_uuid" => match identity::parse_uuid(strip_quotes(value)) {
                Ok(uuid) => self.uuid = Some(uuid),
                Err(_) => self.demote(original_key, value),
            },
            "provider_type" => match strip_quotes(value).parse::<ProviderType>() {
                Ok(pt) => self.provider_type_override = Some(pt),
                Err(_) => self.demote(original_key, value),
            },
            "provider_id" => match strip_quotes(value).parse::<ProviderId>() {
                Ok(pid) => self.provider_id_override = Some(pid),
                Err(_) => self.demote(original_key, value),
            },
            "title" => {
                self.name = Some(strip_quotes(value).to_string());
                self.title_seen = true;
            }
            "name" => {
                // `title` wins over `name` when both are present.
                if !self.title_seen {
                    self.name = Some(strip_quotes(value).to_string());
                }
            }
            "mime_type" => self.mime_type = Some(strip_quotes(value).to_string()),
            "created" | "created_time" => match parse_timestamp(value) {
                Some(ts) => self.created = Some(ts),
                None => self.demote(original_key, value),
            },
            "updated" | "modified" | "modified_time" => match parse_timestamp(value) {
                Some(ts) => self.modified = Some(ts),
                None => self.demote(original_key, value),
            },
            "owner" | "author" => {
                let raw = strip_quotes(value);
                self.owner = Some(UserIdentity::new(raw, raw));
            }
            "owning_team" => self.owning_team = Some(strip_quotes(value).to_string()),
            "contributors" => self.contributors = string_list(value),
            "parents" => self.parents = string_list(value),
            "project" | "project_id" => self.project = Some(strip_quotes(value).to_string()),
            "tags" => self.tags = string_list(value),
            "sync_status" => match SyncStatus::parse(strip_quotes(value)) {
                Some(status) => self.sync_status = Some(status),
                None => self.demote(original_key, value),
            },
            "workflow_status" | "status" => {
                self.workflow_status = Some(strip_quotes(value).to_string());
            }
            // Stored hashes are recognized but never trusted; the hash is
            // recomputed from the body.
            "content_hash" => {}
            _ => self.demote(original_key, value),
        }
    }

    fn demote(&mut self, key: &str, value: &str) {
        self.extended.insert(key.to_string(), coerce(value));
    }

    fn finish(self) -> DocumentMetadata {
        let now = Utc::now();
        let created = self.created.or(self.modified).unwrap_or(now);
        let modified = self.modified.or(self.created).unwrap_or(now);
        let provider_id = self.provider_id_override.unwrap_or(self.provider_id);
        let provider_type = self
            .provider_type_override
            .unwrap_or(provider_id.provider_type);
        let name = self.name.unwrap_or_else(|| {
            provider_id
                .id
                .rsplit('/')
                .next()
                .unwrap_or(provider_id.id.as_str())
                .to_string()
        });
        DocumentMetadata {
            uuid: self.uuid.unwrap_or_else(identity::new_uuid),
            provider_type,
            provider_id,
            name,
            mime_type: self
                .mime_type
                .unwrap_or_else(|| "text/markdown".to_string()),
            created_time: created,
            modified_time: modified,
            owner: self.owner,
            owning_team: self.owning_team,
            contributors: self.contributors,
            parents: self.parents,
            project: self.project,
            tags: self.tags,
            sync_status: self.sync_status.unwrap_or_default(),
            workflow_status: self.workflow_status,
            content_hash: String::new(),
            extended: self.extended,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::new_uuid;
    use serde_json::json;

    fn local_id(path: &str) -> ProviderId {
        ProviderId::new(ProviderType::Local, path).unwrap()
    }

    #[test]
    fn test_parse_minimal_document() {
        let input = "---\ntitle: Simple Document\n---\n\nContent here.\n";
        let parsed = parse(input, &local_id("docs/simple.md")).unwrap();
        assert_eq!(parsed.metadata.name, "Simple Document");
        assert_eq!(parsed.metadata.provider_type, ProviderType::Local);
        assert_eq!(
            parsed.metadata.provider_id.to_string(),
            "local:docs/simple.md"
        );
        assert_eq!(parsed.metadata.sync_status, SyncStatus::Canonical);
        assert_eq!(parsed.metadata.mime_type, "text/markdown");
        assert!(!parsed.metadata.uuid.is_nil());
        assert_eq!(parsed.body, "Content here.");
        assert_eq!(
            parsed.metadata.content_hash,
            content_hash("Content here.")
        );
    }

    #[test]
    fn test_parse_full_rfc_document() {
        let input = "---\n\
            uuid: 550e8400-e29b-41d4-a716-446655440000\n\
            title: RFC-010: Diff Classification System\n\
            tags: [rfc, classification, diff, observability]\n\
            project: agf-iac-remediation-poc\n\
            owning_team: Platform Team\n\
            workflow_status: Draft\n\
            sidebar_position: 10\n\
            document_type: rfc\n\
            ---\n\
            \n\
            The body.\n";
        let parsed = parse(input, &local_id("docs/rfc-010.md")).unwrap();
        let meta = &parsed.metadata;
        assert_eq!(
            meta.uuid.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(meta.name, "RFC-010: Diff Classification System");
        assert_eq!(
            meta.tags,
            vec!["rfc", "classification", "diff", "observability"]
        );
        assert_eq!(meta.project.as_deref(), Some("agf-iac-remediation-poc"));
        assert_eq!(meta.owning_team.as_deref(), Some("Platform Team"));
        assert_eq!(meta.workflow_status.as_deref(), Some("Draft"));
        assert_eq!(meta.extended["sidebar_position"], json!(10));
        assert_eq!(meta.extended["document_type"], json!("rfc"));
    }

    #[test]
    fn test_missing_frontmatter_fails() {
        let err = parse("No frontmatter at all", &local_id("a.md")).unwrap_err();
        assert!(err.to_string().contains("missing frontmatter"));
    }

    #[test]
    fn test_unterminated_frontmatter_fails() {
        let err = parse("---\ntitle: Oops\n\nBody", &local_id("a.md")).unwrap_err();
        assert!(err.to_string().contains("unterminated frontmatter"));
    }

    #[test]
    fn test_key_normalization_case_and_dashes() {
        let input = "---\nHermes-UUID: 550e8400-e29b-41d4-a716-446655440000\nOwning-Team: Infra\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(
            parsed.metadata.uuid.to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(parsed.metadata.owning_team.as_deref(), Some("Infra"));
    }

    #[test]
    fn test_unknown_fields_preserved_verbatim() {
        let input = "---\ntitle: T\nSidebar-Position: 3\ncustom_flag: true\nratio: 0.5\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        let ext = &parsed.metadata.extended;
        assert_eq!(ext["Sidebar-Position"], json!(3));
        assert_eq!(ext["custom_flag"], json!(true));
        assert_eq!(ext["ratio"], json!(0.5));
    }

    #[test]
    fn test_unparsable_core_field_demoted() {
        let input = "---\ntitle: T\nuuid: not-a-uuid\ncreated: yesterday\nsync_status: wat\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        let meta = &parsed.metadata;
        assert!(!meta.uuid.is_nil());
        assert_eq!(meta.extended["uuid"], json!("not-a-uuid"));
        assert_eq!(meta.extended["created"], json!("yesterday"));
        assert_eq!(meta.extended["sync_status"], json!("wat"));
        assert_eq!(meta.sync_status, SyncStatus::Canonical);
    }

    #[test]
    fn test_timestamp_formats() {
        for (raw, expect) in [
            ("2024-03-04T10:20:30Z", "2024-03-04 10:20:30 UTC"),
            ("2024-03-04T10:20:30.123456789Z", "2024-03-04 10:20:30.123456789 UTC"),
            ("2024-03-04", "2024-03-04 00:00:00 UTC"),
            ("2024-03-04 10:20:30", "2024-03-04 10:20:30 UTC"),
            ("2024-03-04T10:20:30", "2024-03-04 10:20:30 UTC"),
        ] {
            let input = format!("---\ntitle: T\ncreated: {raw}\n---\nBody");
            let parsed = parse(&input, &local_id("a.md")).unwrap();
            assert_eq!(
                parsed.metadata.created_time.to_string(),
                expect,
                "format {raw}"
            );
        }
    }

    #[test]
    fn test_created_falls_back_to_modified() {
        let input = "---\ntitle: T\nmodified: 2024-05-01\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.created_time, parsed.metadata.modified_time);
    }

    #[test]
    fn test_quotes_stripped_from_values() {
        let input = "---\ntitle: \"Quoted Title\"\nproject: 'single'\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "Quoted Title");
        assert_eq!(parsed.metadata.project.as_deref(), Some("single"));
    }

    #[test]
    fn test_title_wins_over_name() {
        let input = "---\nname: fallback\ntitle: Primary\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "Primary");

        let reversed = "---\ntitle: Primary\nname: fallback\n---\nBody";
        let parsed = parse(reversed, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "Primary");
    }

    #[test]
    fn test_name_defaults_to_file_stem() {
        let input = "---\ntags: [a]\n---\nBody";
        let parsed = parse(input, &local_id("docs/notes.md")).unwrap();
        assert_eq!(parsed.metadata.name, "notes.md");
    }

    #[test]
    fn test_array_elements_trimmed() {
        let input = "---\ntitle: T\ntags: [ one ,two,  three ]\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.tags, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_owner_becomes_identity() {
        let input = "---\ntitle: T\nowner: alice@example.com\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        let owner = parsed.metadata.owner.unwrap();
        assert_eq!(owner.email, "alice@example.com");
    }

    #[test]
    fn test_value_with_colon_preserved() {
        let input = "---\ntitle: RFC-010: Diff Classification System\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "RFC-010: Diff Classification System");
    }

    #[test]
    fn test_round_trip_core_and_extended() {
        let mut meta = DocumentMetadata::new(new_uuid(), local_id("docs/a.md"), "Round Trip");
        meta.tags = vec!["x".to_string(), "y".to_string()];
        meta.project = Some("apollo".to_string());
        meta.owning_team = Some("Platform Team".to_string());
        meta.workflow_status = Some("Draft".to_string());
        meta.contributors = vec!["alice@example.com".to_string()];
        meta.owner = Some(UserIdentity::new("bob@example.com", "bob@example.com"));
        meta.extended
            .insert("document_type".to_string(), json!("rfc"));
        meta.extended
            .insert("sidebar_position".to_string(), json!(10));
        meta.extended.insert("flag".to_string(), json!(false));
        meta.extended
            .insert("aliases".to_string(), json!(["a", "b"]));

        let body = "The body text.\nSecond line.";
        let rendered = serialize(&meta, body);
        let parsed = parse(&rendered, &local_id("docs/a.md")).unwrap();
        let back = &parsed.metadata;

        assert_eq!(back.uuid, meta.uuid);
        assert_eq!(back.name, meta.name);
        assert_eq!(back.tags, meta.tags);
        assert_eq!(back.project, meta.project);
        assert_eq!(back.owning_team, meta.owning_team);
        assert_eq!(back.workflow_status, meta.workflow_status);
        assert_eq!(back.contributors, meta.contributors);
        assert_eq!(back.owner.as_ref().unwrap().email, "bob@example.com");
        assert_eq!(back.sync_status, meta.sync_status);
        assert_eq!(back.extended, meta.extended);
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn test_round_trip_quotes_ambiguous_strings() {
        // A string that looks like a number must come back as a string.
        let mut meta = DocumentMetadata::new(new_uuid(), local_id("a.md"), "T");
        meta.extended.insert("build".to_string(), json!("10"));
        let rendered = serialize(&meta, "Body");
        let parsed = parse(&rendered, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.extended["build"], json!("10"));
    }

    #[test]
    fn test_uuid_stability_over_save_load_cycles() {
        let input = "---\ntitle: T\n---\nBody";
        let first = parse(input, &local_id("a.md")).unwrap();
        let minted = first.metadata.uuid;

        let mut current = first;
        for _ in 0..3 {
            let rendered = serialize(&current.metadata, &current.body);
            current = parse(&rendered, &local_id("a.md")).unwrap();
            assert_eq!(current.metadata.uuid, minted);
        }
    }

    #[test]
    fn test_core_fields_override() {
        let mut set = BTreeSet::new();
        set.insert("title".to_string());
        let options = FrontmatterOptions {
            core_fields: Some(set),
        };
        // With a narrowed core set, `tags` lands in extended metadata.
        let input = "---\ntitle: T\ntags: [a, b]\n---\nBody";
        let parsed = parse_with_options(input, &local_id("a.md"), &options).unwrap();
        assert!(parsed.metadata.tags.is_empty());
        assert_eq!(parsed.metadata.extended["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        let input = "---\n\n# generator: hermes\ntitle: T\n\n---\nBody";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "T");
        assert!(parsed.metadata.extended.is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = "---\r\ntitle: T\r\ntags: [a, b]\r\n---\r\nBody line.\r\nSecond.";
        let parsed = parse(input, &local_id("a.md")).unwrap();
        assert_eq!(parsed.metadata.name, "T");
        assert_eq!(parsed.metadata.tags, vec!["a", "b"]);
        assert_eq!(parsed.body, "Body line.\r\nSecond.");
    }

    #[test]
    fn test_empty_body() {
        let parsed = parse("---\ntitle: T\n---\n", &local_id("a.md")).unwrap();
        assert_eq!(parsed.body, "");
        assert_eq!(parsed.metadata.content_hash, content_hash(""));
    }
}
