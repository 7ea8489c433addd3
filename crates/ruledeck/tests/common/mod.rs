//! Common test utilities.

#![allow(dead_code)]

use indoc::indoc;
use ruledeck::Workspace;
use ruledeck::config::Config;
use ruledeck::git::StaticIdentity;
use ruledeck::service::RuleService;
use ruledeck::teams::ConfigTeamDirectory;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ALICE: &str = "alice.smith@company.com";

pub const EARLY_RETURNS: &str = indoc! {"
    ---
    description: Keep functions flat
    globs: *.rs
    alwaysApply: false
    ---
    # Early returns
    Prefer early returns over nested conditionals.
    Guard clauses make the happy path obvious.
"};

pub const WEB_STYLE: &str = indoc! {"
    ---
    title: Web style guide
    alwaysApply: true
    ---
    Use semantic HTML and keep CSS modules small.
"};

pub const PERSONAL: &str = indoc! {"
    # Personal shortcuts
    Always explain diffs before applying them.
"};

pub const SECRETS: &str = indoc! {"
    ---
    description: Never commit secrets
    ---
    Store credentials in the vault, never in the repository.
"};

/// Write `text` to `root/rel`, creating parent directories.
pub fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("file has a parent"))
        .expect("Failed to create fixture dir");
    std::fs::write(&path, text).expect("Failed to write fixture");
    path
}

/// A temp workspace with a populated registry:
///
/// - `early.assetfoundations` (team Asset Foundations)
/// - `style.web` (team Web)
/// - `personal.alicesmith` (user alice.smith@company.com)
/// - `shared.security.secrets` (generic)
///
/// plus an empty rule file that discovery skips.
pub fn create_temp_workspace() -> (tempfile::TempDir, Workspace) {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let ws = Workspace::with_config(temp.path(), Config::default());
    let registry = ws.registry_dir();

    write(&registry, "teams/Asset Foundations/early.mdc", EARLY_RETURNS);
    write(&registry, "teams/Web/style.mdc", WEB_STYLE);
    write(&registry, &format!("users/{ALICE}/personal.mdc"), PERSONAL);
    write(&registry, "shared/security/secrets.mdc", SECRETS);
    write(&registry, "teams/Web/empty.mdc", "---\ntitle: Nothing\n---\n");

    (temp, ws)
}

/// A service over `ws` with a fixed user and Alice in both teams.
pub fn service_for(ws: &Workspace, email: Option<&str>) -> RuleService {
    let teams = ConfigTeamDirectory::new(BTreeMap::from([
        ("Asset Foundations".to_string(), vec![ALICE.to_string()]),
        ("Web".to_string(), vec![ALICE.to_string()]),
    ]));
    RuleService::new(
        ws,
        Arc::new(StaticIdentity(email.map(String::from))),
        Arc::new(teams),
    )
    .expect("Failed to create service")
}

/// File names in the applied directory, sorted.
pub fn applied_files(ws: &Workspace) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(ws.applied_dir()) {
        Ok(entries) => entries
            .map(|e| {
                e.expect("readable entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
