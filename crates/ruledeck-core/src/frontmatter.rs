//! Frontmatter decoding for `.mdc` rule files
//!
//! A rule file is an optional `---`-delimited YAML block followed by
//! Markdown. Decoding never fails: malformed or unterminated frontmatter is
//! logged and degrades to empty metadata so one bad file cannot break a scan.

use eyre::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Fields whose explicit `null` means "absent".
const NULLABLE_FIELDS: &[&str] = &["title", "description", "globs", "context"];

/// Frontmatter values as decoded, before type validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    fields: BTreeMap<String, Value>,
}

impl RawMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Result of splitting a rule file into metadata and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRuleFile {
    pub metadata: RawMetadata,
    /// Everything after the closing delimiter, trimmed.
    pub content: String,
}

/// Validated frontmatter of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_apply: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl RuleMetadata {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Check field types and convert from raw decoded values.
    ///
    /// `globs` must be a sequence of strings, `alwaysApply` a boolean, and
    /// `title`, `description` and `context` strings. Unknown keys are ignored.
    pub fn from_raw(raw: &RawMetadata) -> Result<Self> {
        let globs = match raw.get("globs") {
            None => None,
            Some(Value::Sequence(items)) => {
                let mut globs = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => globs.push(s.clone()),
                        other => bail!("`globs` entries must be strings, found {other:?}"),
                    }
                }
                Some(globs)
            }
            Some(other) => bail!("`globs` must be a sequence, found {other:?}"),
        };

        let always_apply = match raw.get("alwaysApply") {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => bail!("`alwaysApply` must be a boolean, found {other:?}"),
        };

        Ok(Self {
            title: string_field(raw, "title")?,
            description: string_field(raw, "description")?,
            globs,
            always_apply,
            context: string_field(raw, "context")?,
        })
    }

    /// Re-encode the recognized fields as a frontmatter block, delimiters
    /// included. Empty metadata encodes to an empty string.
    pub fn to_frontmatter(&self) -> Result<String> {
        if self.is_empty() {
            return Ok(String::new());
        }
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("---\n{yaml}---\n"))
    }
}

fn string_field(raw: &RawMetadata, key: &str) -> Result<Option<String>> {
    match raw.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("`{key}` must be a string, found {other:?}"),
    }
}

/// Split `text` into frontmatter and body.
pub fn decode(text: &str) -> ParsedRuleFile {
    let lines: Vec<&str> = text.lines().collect();

    let opens = lines
        .first()
        .is_some_and(|first| first.trim().starts_with("---"));
    if !opens {
        return body_only(text);
    }

    let Some(close) = lines
        .iter()
        .skip(1)
        .position(|line| line.trim() == "---")
        .map(|i| i + 1)
    else {
        warn!("frontmatter is not closed, treating whole file as content");
        return body_only(text);
    };

    let block = preprocess(&lines[1..close]);
    let content = lines[close + 1..].join("\n").trim().to_string();

    ParsedRuleFile {
        metadata: decode_block(&block),
        content,
    }
}

fn body_only(text: &str) -> ParsedRuleFile {
    ParsedRuleFile {
        metadata: RawMetadata::default(),
        content: text.trim().to_string(),
    }
}

/// Rewrite lines YAML would misread.
///
/// A bare `key:` becomes `key: null` unless the next line continues it as a
/// block, and `globs: *.ext` becomes a one-element quoted list since an
/// unquoted leading `*` is an alias token.
fn preprocess(lines: &[&str]) -> String {
    let mut out = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();

        if trimmed.ends_with(':') && !line.contains(' ') && !line.contains('\t') {
            let continues = lines
                .get(i + 1)
                .is_some_and(|next| next.starts_with([' ', '\t']) || next.starts_with("- "));
            if !continues {
                out.push(format!("{trimmed} null"));
                continue;
            }
        }

        if let Some(value) = line.strip_prefix("globs:") {
            let value = value.trim();
            if value.starts_with('*') {
                let quoted = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""));
                out.push(format!("globs: [{quoted}]"));
                continue;
            }
        }

        out.push((*line).to_string());
    }

    out.join("\n")
}

fn decode_block(block: &str) -> RawMetadata {
    if block.trim().is_empty() {
        return RawMetadata::default();
    }

    let value: Value = match serde_yaml::from_str(block) {
        Ok(value) => value,
        Err(e) => {
            warn!("malformed frontmatter: {e}");
            return RawMetadata::default();
        }
    };

    let mapping = match value {
        Value::Mapping(mapping) => mapping,
        Value::Null => return RawMetadata::default(),
        other => {
            warn!("frontmatter is not a mapping: {other:?}");
            return RawMetadata::default();
        }
    };

    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Value::String(key) = key else {
            debug!("skipping non-string frontmatter key {key:?}");
            continue;
        };
        if value.is_null() && NULLABLE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let value = match (key.as_str(), value) {
            ("globs", seq @ Value::Sequence(_)) => seq,
            ("globs", scalar) => Value::Sequence(vec![scalar]),
            (_, value) => value,
        };
        fields.insert(key, value);
    }

    RawMetadata { fields }
}
