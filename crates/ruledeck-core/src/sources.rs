//! Registry layout and file enumeration

use eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::metadata::MetadataStore;

/// Extension of rule files.
pub const MDC_EXTENSION: &str = "mdc";

const TEAMS_DIR: &str = "teams";
const USERS_DIR: &str = "users";

/// Well-known paths inside a registry directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLayout {
    root: PathBuf,
}

impl RegistryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn teams_dir(&self) -> PathBuf {
        self.root.join(TEAMS_DIR)
    }

    pub fn users_dir(&self) -> PathBuf {
        self.root.join(USERS_DIR)
    }

    pub fn team_dir(&self, team: &str) -> PathBuf {
        self.teams_dir().join(team)
    }

    pub fn user_dir(&self, email: &str) -> PathBuf {
        self.users_dir().join(email)
    }

    pub fn metadata_store(&self) -> MetadataStore {
        MetadataStore::for_registry(&self.root)
    }
}

/// Owner directories present in a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStructure {
    pub teams: Vec<String>,
    pub users: Vec<String>,
}

/// List the immediate subdirectories of `teams/` and `users/`, sorted.
///
/// Missing directories produce empty lists.
pub fn scan_registry_structure(registry_root: &Path) -> RegistryStructure {
    let layout = RegistryLayout::new(registry_root);
    RegistryStructure {
        teams: subdirectory_names(&layout.teams_dir()),
        users: subdirectory_names(&layout.users_dir()),
    }
}

fn subdirectory_names(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Every `.mdc` file below `dir`, sorted.
///
/// Hidden entries are included and ignore files are not honoured, since
/// registry rules are all meant to be visible. A missing directory yields an
/// empty list.
#[cfg(feature = "walk")]
pub fn find_mdc_files(dir: &Path) -> Vec<PathBuf> {
    use ignore::WalkBuilder;

    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == MDC_EXTENSION))
        .collect();
    files.sort();
    files
}

/// Create `teams/`, `users/` and an empty metadata store under
/// `registry_root` where missing.
pub fn create_registry_structure(registry_root: &Path) -> Result<()> {
    let layout = RegistryLayout::new(registry_root);
    for dir in [layout.teams_dir(), layout.users_dir()] {
        std::fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("Failed to create {}", dir.display()))?;
    }
    layout.metadata_store().ensure_exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::META_FILENAME;

    #[test]
    fn structure_of_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let structure = scan_registry_structure(&dir.path().join("nope"));
        assert_eq!(structure, RegistryStructure::default());
    }

    #[test]
    fn structure_lists_sorted_directories_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("teams/Zeta")).unwrap();
        std::fs::create_dir_all(root.join("teams/Alpha Team")).unwrap();
        std::fs::write(root.join("teams/stray.mdc"), "x").unwrap();
        std::fs::create_dir_all(root.join("users/bob@example.com")).unwrap();

        let structure = scan_registry_structure(root);
        assert_eq!(structure.teams, vec!["Alpha Team", "Zeta"]);
        assert_eq!(structure.users, vec!["bob@example.com"]);
    }

    #[cfg(feature = "walk")]
    #[test]
    fn finds_nested_and_hidden_mdc_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("a/b/.hidden")).unwrap();
        std::fs::write(root.join("top.mdc"), "x").unwrap();
        std::fs::write(root.join("a/b/deep.mdc"), "x").unwrap();
        std::fs::write(root.join("a/b/.hidden/secret.mdc"), "x").unwrap();
        std::fs::write(root.join("a/notes.md"), "x").unwrap();
        std::fs::write(root.join(".gitignore"), "*.mdc\n").unwrap();

        let files = find_mdc_files(root);
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/b/.hidden/secret.mdc"),
                PathBuf::from("a/b/deep.mdc"),
                PathBuf::from("top.mdc"),
            ]
        );
    }

    #[cfg(feature = "walk")]
    #[test]
    fn missing_dir_has_no_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_mdc_files(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn create_structure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("registry");
        create_registry_structure(&root).unwrap();
        create_registry_structure(&root).unwrap();
        assert!(root.join("teams").is_dir());
        assert!(root.join("users").is_dir());
        assert!(root.join(META_FILENAME).is_file());
    }
}
