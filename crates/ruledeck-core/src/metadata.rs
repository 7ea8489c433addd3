//! Side store for per-rule tags and title/description overrides
//!
//! The store is a single `rules-metadata.jsonc` file at the registry root.
//! It is written one entry per line with keys sorted so that changes diff
//! cleanly under version control. Loading tolerates `//` comment lines and
//! trailing commas.
//!
//! Entries are decoded one at a time. An entry that does not have the
//! expected shape is skipped with a warning and written back verbatim on the
//! next save, so one bad hand edit never hides or deletes the others.
//!
//! There is no file locking: concurrent writers from separate processes can
//! lose updates.

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the store inside the registry directory.
pub const META_FILENAME: &str = "rules-metadata.jsonc";

/// Header written at the top of every saved store.
pub const META_FILE_WARNING: &str = "// Managed by ruledeck: tags and title/description overrides keyed by rule id.\n// Hand edits are kept on save, including entries ruledeck cannot read. Comments other than this header are not.";

/// Stored overrides for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMetaEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleMetaEntry {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.title.is_none() && self.description.is_none()
    }

    pub fn with_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }
}

/// Rule id to entry, ordered by id.
pub type MetadataMap = BTreeMap<String, RuleMetaEntry>;

/// Parse JSON that may contain full-line `//` comments and trailing commas.
///
/// Fails only when the text as a whole is not a JSON object. Entries with
/// the wrong shape are skipped; see [`MetadataStore::load`].
pub fn parse_jsonc(text: &str) -> Result<MetadataMap> {
    Ok(decode_entries(parse_jsonc_object(text)?).entries)
}

fn parse_jsonc_object(text: &str) -> Result<BTreeMap<String, Value>> {
    let without_comments: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned = strip_trailing_commas(&without_comments);
    serde_json::from_str(&cleaned).wrap_err("metadata store is not valid JSON")
}

/// Decoded entries plus the raw values of entries that failed to decode.
#[derive(Debug, Default)]
struct StoreContents {
    entries: MetadataMap,
    unreadable: BTreeMap<String, Value>,
}

impl StoreContents {
    /// Take the entry for `rule_id`, replacing any unreadable value under
    /// the same id.
    fn take(&mut self, rule_id: &str) -> Option<RuleMetaEntry> {
        self.unreadable.remove(rule_id);
        self.entries.remove(rule_id)
    }
}

fn decode_entries(raw: BTreeMap<String, Value>) -> StoreContents {
    let mut contents = StoreContents::default();
    for (id, value) in raw {
        match serde_json::from_value::<RuleMetaEntry>(value.clone()) {
            Ok(entry) => {
                contents.entries.insert(id, entry);
            }
            Err(e) => {
                warn!("Skipping metadata entry {id:?}: {e}");
                contents.unreadable.insert(id, value);
            }
        }
    }
    contents
}

/// Drop commas whose next non-whitespace character closes an object or
/// array. Commas inside string literals are left alone.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Serialize a map in the diff-friendly store format.
pub fn render(map: &MetadataMap) -> Result<String> {
    render_contents(&StoreContents {
        entries: map.clone(),
        unreadable: BTreeMap::new(),
    })
}

fn render_contents(contents: &StoreContents) -> Result<String> {
    let mut lines = BTreeMap::new();
    for (id, entry) in &contents.entries {
        lines.insert(id, serde_json::to_string(entry)?);
    }
    for (id, value) in &contents.unreadable {
        lines.entry(id).or_insert(serde_json::to_string(value)?);
    }

    let mut out = String::new();
    out.push_str(META_FILE_WARNING);
    out.push_str("\n{\n");
    for (id, value) in lines {
        let key = serde_json::to_string(id)?;
        out.push_str(&format!("  {key}: {value},\n"));
    }
    out.push_str("}\n");
    Ok(out)
}

fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Handle to the store file of one registry.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store located at `<registry_root>/rules-metadata.jsonc`.
    pub fn for_registry(registry_root: &Path) -> Self {
        Self::new(registry_root.join(META_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current readable entries. Missing or unreadable files load as empty
    /// and malformed entries are left out.
    pub fn load(&self) -> MetadataMap {
        self.read().entries
    }

    fn read(&self) -> StoreContents {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No metadata store at {}: {e}", self.path.display());
                return StoreContents::default();
            }
        };
        match parse_jsonc_object(&text) {
            Ok(raw) => decode_entries(raw),
            Err(e) => {
                warn!("Ignoring malformed metadata store {}: {e:#}", self.path.display());
                StoreContents::default()
            }
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<RuleMetaEntry> {
        self.load().remove(rule_id)
    }

    /// Merge `partial` into the entry for `rule_id` and persist.
    ///
    /// Fields set in `partial` replace stored ones, except tags, which are
    /// unioned with the stored tags, deduplicated and sorted.
    pub fn save(&self, rule_id: &str, partial: RuleMetaEntry) -> Result<()> {
        let mut contents = self.read();
        let existing = contents.take(rule_id).unwrap_or_default();

        let tags = match (existing.tags, partial.tags) {
            (None, None) => None,
            (a, b) => Some(normalize_tags(
                a.into_iter().flatten().chain(b.into_iter().flatten()),
            )),
        };

        let merged = RuleMetaEntry {
            tags,
            title: partial.title.or(existing.title),
            description: partial.description.or(existing.description),
        };
        contents.entries.insert(rule_id.to_string(), merged);
        self.write_all(&contents)
    }

    /// Add `tag` (trimmed). Blank tags are ignored.
    pub fn add_tag(&self, rule_id: &str, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Ok(());
        }
        self.save(rule_id, RuleMetaEntry::with_tags([tag]))
    }

    /// Remove `tag`. Returns whether it was present.
    ///
    /// An entry left with no tags and no overrides is dropped entirely, so
    /// adding then removing a tag restores the previous state.
    pub fn remove_tag(&self, rule_id: &str, tag: &str) -> Result<bool> {
        let tag = tag.trim();
        let mut contents = self.read();
        let Some(entry) = contents.entries.get_mut(rule_id) else {
            return Ok(false);
        };
        let Some(tags) = entry.tags.as_mut() else {
            return Ok(false);
        };
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() == before {
            return Ok(false);
        }
        if tags.is_empty() {
            entry.tags = None;
        }
        if entry.is_empty() {
            contents.entries.remove(rule_id);
        }
        self.write_all(&contents)?;
        Ok(true)
    }

    /// Override the displayed title. An empty string clears the override.
    pub fn set_title(&self, rule_id: &str, title: &str) -> Result<()> {
        self.edit(rule_id, |entry| entry.title = non_empty(title))
    }

    /// Override the displayed description. An empty string clears the
    /// override.
    pub fn set_description(&self, rule_id: &str, description: &str) -> Result<()> {
        self.edit(rule_id, |entry| entry.description = non_empty(description))
    }

    fn edit(&self, rule_id: &str, f: impl FnOnce(&mut RuleMetaEntry)) -> Result<()> {
        let mut contents = self.read();
        let mut entry = contents.take(rule_id).unwrap_or_default();
        f(&mut entry);
        if !entry.is_empty() {
            contents.entries.insert(rule_id.to_string(), entry);
        }
        self.write_all(&contents)
    }

    /// Remove entries for rules that no longer exist, readable or not.
    ///
    /// The file is only rewritten when something was removed. Returns the
    /// removed ids.
    pub fn cleanup_orphaned_metadata(&self, existing_ids: &HashSet<String>) -> Result<Vec<String>> {
        let mut contents = self.read();
        let orphans: Vec<String> = contents
            .entries
            .keys()
            .chain(contents.unreadable.keys())
            .filter(|id| !existing_ids.contains(*id))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if orphans.is_empty() {
            return Ok(orphans);
        }
        for id in &orphans {
            contents.take(id);
        }
        self.write_all(&contents)?;
        info!("Removed {} orphaned metadata entries", orphans.len());
        Ok(orphans)
    }

    /// Create an empty store if none exists.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write_all(&StoreContents::default())
    }

    /// Every tag used by any entry, sorted and unique.
    pub fn all_tags(&self) -> Vec<String> {
        normalize_tags(self.load().into_values().flat_map(|e| e.tags.unwrap_or_default()))
    }

    fn write_all(&self, contents: &StoreContents) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, render_contents(contents)?)
            .wrap_err_with(|| format!("Failed to write {}", self.path.display()))
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
