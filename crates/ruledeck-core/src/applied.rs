//! Applied-rule naming and matching
//!
//! A rule is "applied" when a copy of it sits in the applied directory. No
//! index is kept: whether a rule is applied is always answered by matching
//! its base file name against the directory listing, so renaming or deleting
//! projections by hand never leaves stale state behind.
//!
//! A projection of `style.mdc` owned by team `Web` is named `style.web.mdc`,
//! then `style.web_1.mdc`, `style.web_2.mdc` and so on while names collide.
//! All of these, plus a plain `style.mdc` or `style_3.mdc`, count as
//! variants of base name `style`.
//!
//! Matching is by name only, so a base name that is a dotted prefix of
//! another collides with it: the projection `style.old.web.mdc` of a rule
//! file `style.old.mdc` also counts as a variant of `style`, and removing
//! `style` removes it too. Rule files whose names differ only after a dot
//! should be avoided in one registry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::frontmatter::RuleMetadata;
use crate::sources::MDC_EXTENSION;

/// How the editor should activate an applied rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyStrategy {
    #[default]
    Always,
    #[serde(rename = "Auto Attached")]
    AutoAttached,
    Manual,
}

impl std::fmt::Display for ApplyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Always => "Always",
            Self::AutoAttached => "Auto Attached",
            Self::Manual => "Manual",
        })
    }
}

/// Settings recorded alongside an applied rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleApplicationConfig {
    pub apply_strategy: ApplyStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globs: Option<Vec<String>>,
}

impl RuleApplicationConfig {
    /// Strategy implied by a rule's own frontmatter: `alwaysApply` wins, then
    /// globs attach it automatically, otherwise it is manual.
    pub fn from_metadata(metadata: &RuleMetadata) -> Self {
        let globs = metadata.globs.clone().filter(|g| !g.is_empty());
        let apply_strategy = if metadata.always_apply == Some(true) {
            ApplyStrategy::Always
        } else if globs.is_some() {
            ApplyStrategy::AutoAttached
        } else {
            ApplyStrategy::Manual
        };
        Self {
            apply_strategy,
            globs,
        }
    }
}

/// One projection in the applied directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    /// Stem of the projected file name.
    pub id: String,
    /// Source file, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,
    pub applied_path: PathBuf,
    /// RFC 3339.
    pub applied_at: String,
    pub config: RuleApplicationConfig,
}

fn is_mdc(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == MDC_EXTENSION)
}

/// Whether the stem `stem` is a projection of base name `base`.
///
/// Matches `base`, `base.<anything>` and `base_<digits>`. A dotted rule name
/// such as `style.old` therefore also matches base `style`.
pub fn is_applied_variant(base: &str, stem: &str) -> bool {
    if stem == base {
        return true;
    }
    let Some(rest) = stem.strip_prefix(base) else {
        return false;
    };
    if rest.starts_with('.') && rest.len() > 1 {
        return true;
    }
    rest.strip_prefix('_')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// The `.mdc` entries of `listing` that are variants of `base`, in listing
/// order.
pub fn resolve_applied_variants<P: AsRef<Path>>(base: &str, listing: &[P]) -> Vec<PathBuf> {
    listing
        .iter()
        .map(AsRef::as_ref)
        .filter(|path| is_mdc(path))
        .filter(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| is_applied_variant(base, stem))
        })
        .map(Path::to_path_buf)
        .collect()
}

/// First free projection file name for `base`.
///
/// Tries `<base>[.<source>].<ext>`, then appends `_1`, `_2`, ... to the stem
/// until `taken` reports the name as free.
pub fn unique_applied_name(base: &str, source: &str, taken: impl Fn(&str) -> bool) -> String {
    let stem = if source.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{source}")
    };

    let candidate = format!("{stem}.{MDC_EXTENSION}");
    if !taken(&candidate) {
        return candidate;
    }

    (1u64..)
        .map(|n| format!("{stem}_{n}.{MDC_EXTENSION}"))
        .find(|name| !taken(name))
        .unwrap_or_else(|| format!("{stem}_{}.{MDC_EXTENSION}", u64::MAX))
}
