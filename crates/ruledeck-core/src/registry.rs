//! Full-registry discovery
//!
//! [`Registry::discover`] rebuilds every rule from disk in one pass: team
//! directories, then user directories, then whatever `.mdc` files remain
//! anywhere else under the registry root. Metadata store overrides are merged
//! last, and store entries for rules that no longer exist are dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::metadata::MetadataMap;
use crate::rule::{Rule, load_rule};
use crate::rule_id::RuleOwner;
use crate::sources::{RegistryLayout, find_mdc_files, scan_registry_structure};

/// Snapshot of a registry after one discovery pass.
///
/// `team_rules` and `user_rules` are subsets of `all_rules`; generic rules
/// only appear in `all_rules`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDiscoveryResult {
    pub all_rules: Vec<Rule>,
    pub team_rules: Vec<Rule>,
    pub user_rules: Vec<Rule>,
    pub teams: Vec<String>,
    pub users: Vec<String>,
}

impl RuleDiscoveryResult {
    /// Look up a rule by id.
    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.all_rules.iter().find(|rule| rule.id == id)
    }

    pub fn ids(&self) -> HashSet<String> {
        self.all_rules.iter().map(|rule| rule.id.clone()).collect()
    }

    pub fn rules_for_team(&self, team: &str) -> Vec<Rule> {
        self.team_rules
            .iter()
            .filter(|rule| rule.team.as_deref() == Some(team))
            .cloned()
            .collect()
    }

    pub fn rules_for_user(&self, email: &str) -> Vec<Rule> {
        self.user_rules
            .iter()
            .filter(|rule| rule.user.as_deref() == Some(email))
            .cloned()
            .collect()
    }
}

/// A registry directory on disk.
#[derive(Debug, Clone)]
pub struct Registry {
    layout: RegistryLayout,
}

impl Registry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: RegistryLayout::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    /// Rebuild every rule and reconcile the metadata store.
    ///
    /// Per-file problems are logged and the file is skipped; this never fails.
    pub fn discover(&self) -> RuleDiscoveryResult {
        let root = self.layout.root();
        let structure = scan_registry_structure(root);
        debug!(
            "Registry structure: {} teams, {} users",
            structure.teams.len(),
            structure.users.len()
        );

        let mut processed: HashSet<PathBuf> = HashSet::new();
        let mut all_rules = Vec::new();

        let mut team_rules = Vec::new();
        for team in &structure.teams {
            let owner = RuleOwner::Team(team.clone());
            let rules = self.load_dir(&self.layout.team_dir(team), &owner, &mut processed);
            info!("Discovered {} rules for team {team}", rules.len());
            team_rules.extend(rules);
        }
        all_rules.extend(team_rules.iter().cloned());

        let mut user_rules = Vec::new();
        for user in &structure.users {
            let owner = RuleOwner::User(user.clone());
            let rules = self.load_dir(&self.layout.user_dir(user), &owner, &mut processed);
            info!("Discovered {} rules for user {user}", rules.len());
            user_rules.extend(rules);
        }
        all_rules.extend(user_rules.iter().cloned());

        let generic: Vec<Rule> = find_mdc_files(root)
            .into_iter()
            .filter(|path| !processed.contains(path))
            .filter_map(|path| load_rule(&path, &RuleOwner::Generic, Some(root)))
            .collect();
        debug!("Discovered {} generic rules", generic.len());
        all_rules.extend(generic);

        let store = self.layout.metadata_store();
        let meta = store.load();
        for rules in [&mut all_rules, &mut team_rules, &mut user_rules] {
            apply_overrides(rules, &meta);
        }

        let ids: HashSet<String> = all_rules.iter().map(|rule| rule.id.clone()).collect();
        if ids.len() != all_rules.len() {
            warn!("Duplicate rule ids in registry {}", root.display());
        }
        if let Err(e) = store.cleanup_orphaned_metadata(&ids) {
            warn!("Metadata cleanup failed: {e:#}");
        }

        info!("Rule discovery complete: {} rules", all_rules.len());

        RuleDiscoveryResult {
            all_rules,
            team_rules,
            user_rules,
            teams: structure.teams,
            users: structure.users,
        }
    }

    fn load_dir(
        &self,
        dir: &Path,
        owner: &RuleOwner,
        processed: &mut HashSet<PathBuf>,
    ) -> Vec<Rule> {
        let mut rules = Vec::new();
        for path in find_mdc_files(dir) {
            if let Some(rule) = load_rule(&path, owner, Some(self.layout.root())) {
                rules.push(rule);
            }
            processed.insert(path);
        }
        rules
    }
}

fn apply_overrides(rules: &mut [Rule], meta: &MetadataMap) {
    for rule in rules {
        let Some(entry) = meta.get(&rule.id) else {
            continue;
        };
        if let Some(tags) = entry.tags.as_ref().filter(|tags| !tags.is_empty()) {
            let mut tags = tags.clone();
            tags.sort();
            tags.dedup();
            rule.tags = Some(tags);
        }
        if let Some(title) = &entry.title {
            rule.title = title.clone();
        }
        if let Some(description) = &entry.description {
            rule.description = Some(description.clone());
        }
    }
}
