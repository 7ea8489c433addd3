//! Canonical rule records

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::frontmatter::{self, ParsedRuleFile, RuleMetadata};
use crate::rule_id::{RuleOwner, derive_generic_rule_id, derive_rule_id, file_stem};

/// Lines shown by [`get_rule_preview`] when the caller has no preference.
pub const DEFAULT_PREVIEW_LINES: usize = 3;

/// Characters of context kept on each side of a snippet match.
const SNIPPET_CONTEXT: usize = 40;

/// A rule as discovered in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
    pub metadata: RuleMetadata,
    /// Sorted; only ever set from the metadata store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Rule {
    pub fn owner(&self) -> RuleOwner {
        match (&self.team, &self.user) {
            (Some(team), _) => RuleOwner::Team(team.clone()),
            (None, Some(user)) => RuleOwner::User(user.clone()),
            (None, None) => RuleOwner::Generic,
        }
    }

    /// Source suffix used when projecting this rule.
    pub fn source(&self) -> String {
        self.owner().source()
    }

    /// Source file name without extension.
    pub fn base_name(&self) -> String {
        file_stem(&self.file_path)
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }

    /// Milliseconds since the epoch of `last_updated`, 0 when unknown.
    pub fn last_updated_millis(&self) -> i64 {
        self.last_updated
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Read and build a single rule file. Problems are logged and yield `None`.
pub fn load_rule(path: &Path, owner: &RuleOwner, registry_root: Option<&Path>) -> Option<Rule> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            return None;
        }
    };
    build_rule(path, frontmatter::decode(&text), owner, registry_root)
}

/// Turn a decoded file into a [`Rule`].
///
/// Returns `None` when the body is empty or the frontmatter has wrong types.
/// `registry_root` is only consulted for generic rules.
pub fn build_rule(
    path: &Path,
    parsed: ParsedRuleFile,
    owner: &RuleOwner,
    registry_root: Option<&Path>,
) -> Option<Rule> {
    if parsed.content.is_empty() {
        debug!("Skipping {}: empty content", path.display());
        return None;
    }

    let metadata = match RuleMetadata::from_raw(&parsed.metadata) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Skipping {}: invalid frontmatter: {e}", path.display());
            return None;
        }
    };

    let id = match owner {
        RuleOwner::Generic => derive_generic_rule_id(path, registry_root),
        owned => derive_rule_id(path, owned.team(), owned.user()),
    };

    Some(Rule {
        id,
        title: resolve_title(&metadata, &parsed.content, path),
        description: metadata.description.clone(),
        content: parsed.content,
        metadata,
        tags: None,
        file_path: path.to_path_buf(),
        last_updated: modified_timestamp(path),
        team: owner.team().map(str::to_string),
        user: owner.user().map(str::to_string),
    })
}

/// Frontmatter title, else a leading `# ` heading, else the file stem.
pub fn resolve_title(metadata: &RuleMetadata, content: &str, path: &Path) -> String {
    if let Some(title) = &metadata.title {
        return title.clone();
    }
    if let Some(heading) = content.lines().next().and_then(|l| l.strip_prefix("# ")) {
        return heading.trim().to_string();
    }
    file_stem(path)
}

fn modified_timestamp(path: &Path) -> Option<String> {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => {
            let time: DateTime<Utc> = time.into();
            Some(time.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Err(e) => {
            warn!("Could not stat {}: {e}", path.display());
            None
        }
    }
}

/// First `max_lines` lines of `content`, trimmed.
pub fn get_rule_preview(content: &str, max_lines: usize) -> String {
    content
        .lines()
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Up to `max` excerpts around case-insensitive occurrences of `term`.
///
/// Case folding is Unicode lowercasing, the same as search filtering uses.
/// Overlapping occurrences share one excerpt. Newlines inside an excerpt are
/// flattened to spaces and truncated edges are marked with `...`.
pub fn get_content_snippets(content: &str, term: &str, max: usize) -> Vec<String> {
    let term = term.trim();
    if term.is_empty() || max == 0 {
        return Vec::new();
    }

    let needle = term.to_lowercase();
    let (haystack, origin) = lowercase_with_offsets(content);

    let mut snippets = Vec::new();
    let mut cursor = 0;
    while snippets.len() < max {
        let Some(found) = haystack[cursor..].find(&needle).map(|i| i + cursor) else {
            break;
        };
        let match_start = origin[found];
        let last = origin[found + needle.len() - 1];
        let match_end = last + content[last..].chars().next().map_or(0, char::len_utf8);

        let mut start = match_start.saturating_sub(SNIPPET_CONTEXT);
        while !content.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (match_end + SNIPPET_CONTEXT).min(content.len());
        while !content.is_char_boundary(end) {
            end += 1;
        }

        let mut snippet = content[start..end].replace(['\n', '\r'], " ").trim().to_string();
        if start > 0 {
            snippet.insert_str(0, "...");
        }
        if end < content.len() {
            snippet.push_str("...");
        }
        snippets.push(snippet);
        cursor = origin.partition_point(|&o| o < end);
    }

    snippets
}

/// Lowercase `text`, recording for every byte of the result the byte offset
/// of the source character it came from.
fn lowercase_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut lowered = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len());
    for (offset, ch) in text.char_indices() {
        for lower in ch.to_lowercase() {
            lowered.push(lower);
            origin.extend(std::iter::repeat_n(offset, lower.len_utf8()));
        }
    }
    (lowered, origin)
}
