use std::fmt::{Display, Formatter};
use std::path::{Component, Path};

use crate::sources::MDC_EXTENSION;

/// Who a rule belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleOwner {
    /// Lives under `teams/<name>/`.
    Team(String),
    /// Lives under `users/<email>/`.
    User(String),
    /// Loose file anywhere else in the registry.
    Generic,
}

impl RuleOwner {
    pub fn team(&self) -> Option<&str> {
        match self {
            Self::Team(name) => Some(name),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Self::User(email) => Some(email),
            _ => None,
        }
    }

    /// Normalized source suffix (empty for generic rules).
    pub fn source(&self) -> String {
        get_rule_source(self.team(), self.user())
    }
}

impl Display for RuleOwner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Team(name) => write!(f, "team {name}"),
            Self::User(email) => write!(f, "user {email}"),
            Self::Generic => f.write_str("generic"),
        }
    }
}

/// Normalize an owner into an ID suffix.
///
/// Teams are lower-cased with all whitespace removed; users contribute the
/// local part of their email with dots removed.
pub fn get_rule_source(team: Option<&str>, user: Option<&str>) -> String {
    if let Some(team) = team {
        return team
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
    }
    if let Some(user) = user {
        let local = user.split('@').next().unwrap_or_default();
        return local.replace('.', "");
    }
    String::new()
}

/// File name without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<stem>.<source>` for owned rules, `<stem>` otherwise.
pub fn derive_rule_id(path: &Path, team: Option<&str>, user: Option<&str>) -> String {
    let stem = file_stem(path);
    let source = get_rule_source(team, user);
    if source.is_empty() {
        stem
    } else {
        format!("{stem}.{source}")
    }
}

/// ID for an ownerless rule: its path relative to the registry root with the
/// extension stripped and separators replaced by `.`.
///
/// Falls back to the bare stem when there is no root or the path lies outside
/// it.
pub fn derive_generic_rule_id(path: &Path, registry_root: Option<&Path>) -> String {
    let Some(relative) = registry_root.and_then(|root| path.strip_prefix(root).ok()) else {
        return file_stem(path);
    };

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if let Some(last) = segments.last_mut() {
        let suffix = format!(".{MDC_EXTENSION}");
        if let Some(stripped) = last.strip_suffix(&suffix) {
            *last = stripped.to_string();
        }
    }

    let id = segments
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".");

    if id.is_empty() { file_stem(path) } else { id }
}
