//! Cached rule discovery
//!
//! The discovery result is rebuilt wholesale and then swapped into the cache,
//! so readers always see a complete snapshot. Rebuilds are serialised: a
//! caller that finds a rebuild in progress waits for it and reuses its result.

use eyre::{Result, WrapErr, bail};
use ruledeck_core::{MetadataStore, Registry, Rule, RuleDiscoveryResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Maximum edit distance for "did you mean" suggestions.
const SUGGESTION_DISTANCE: usize = 3;

/// Shared slot holding the latest discovery snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache {
    slot: Arc<RwLock<Option<Arc<RuleDiscoveryResult>>>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<RuleDiscoveryResult>> {
        self.slot.read().await.clone()
    }

    pub async fn set(&self, result: Arc<RuleDiscoveryResult>) {
        *self.slot.write().await = Some(result);
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

/// Discovers rules for one workspace and caches the result.
pub struct DiscoveryService {
    workspace_root: PathBuf,
    registry: Registry,
    cache: DiscoveryCache,
    rebuild: Mutex<()>,
}

impl DiscoveryService {
    pub fn new(workspace_root: PathBuf, registry_root: PathBuf, cache: DiscoveryCache) -> Self {
        Self {
            workspace_root,
            registry: Registry::new(registry_root),
            cache,
            rebuild: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    pub fn metadata_store(&self) -> MetadataStore {
        self.registry.layout().metadata_store()
    }

    /// The cached snapshot, rebuilding it when absent or when
    /// `force_refresh` is set.
    pub async fn discover_all_rules(&self, force_refresh: bool) -> Result<Arc<RuleDiscoveryResult>> {
        if !force_refresh && let Some(cached) = self.cache.get().await {
            return Ok(cached);
        }

        let _guard = self.rebuild.lock().await;

        // A rebuild that finished while we waited is as fresh as ours.
        if !force_refresh && let Some(cached) = self.cache.get().await {
            return Ok(cached);
        }

        if !self.workspace_root.is_dir() {
            bail!(
                "No workspace folder found at {}",
                self.workspace_root.display()
            );
        }

        let start = Instant::now();
        let registry = self.registry.clone();
        let result = tokio::task::spawn_blocking(move || registry.discover())
            .await
            .wrap_err("Rule discovery task failed")?;
        let result = Arc::new(result);
        self.cache.set(Arc::clone(&result)).await;

        info!(
            "Discovery completed in {:?} ({} rules)",
            start.elapsed(),
            result.all_rules.len()
        );
        Ok(result)
    }

    /// Drop the cached snapshot so the next read rebuilds.
    pub async fn invalidate(&self) {
        debug!("Invalidating discovery cache");
        self.cache.invalidate().await;
    }

    pub async fn get_rule_by_id(&self, id: &str) -> Result<Option<Rule>> {
        let result = self.discover_all_rules(false).await?;
        Ok(result.get(id).cloned())
    }

    /// Like [`Self::get_rule_by_id`], but a missing rule is an error that
    /// names the closest known ids.
    pub async fn require_rule(&self, id: &str) -> Result<Rule> {
        let result = self.discover_all_rules(false).await?;
        if let Some(rule) = result.get(id) {
            return Ok(rule.clone());
        }

        let suggestions = rule_suggestions(&result, id);
        if suggestions.is_empty() {
            bail!("Rule not found: {id}");
        }
        bail!(
            "Rule not found: {id}. Did you mean: {}?",
            suggestions.join(", ")
        )
    }

    pub async fn team_rules(&self, team: &str) -> Result<Vec<Rule>> {
        Ok(self.discover_all_rules(false).await?.rules_for_team(team))
    }

    pub async fn user_rules(&self, email: &str) -> Result<Vec<Rule>> {
        Ok(self.discover_all_rules(false).await?.rules_for_user(email))
    }

    /// Sorted unique tags of all discovered rules.
    pub async fn available_tags(&self) -> Result<Vec<String>> {
        let result = self.discover_all_rules(false).await?;
        let mut tags: Vec<String> = result
            .all_rules
            .iter()
            .flat_map(|rule| rule.tags().iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

/// Known ids within a small edit distance of `id`, closest first.
fn rule_suggestions(result: &RuleDiscoveryResult, id: &str) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = result
        .all_rules
        .iter()
        .map(|rule| (strsim::levenshtein(id, &rule.id), rule.id.as_str()))
        .filter(|(distance, _)| *distance <= SUGGESTION_DISTANCE)
        .collect();
    scored.sort();
    scored.into_iter().take(3).map(|(_, id)| id.to_string()).collect()
}
