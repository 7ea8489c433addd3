//! Projecting rules into the applied directory
//!
//! Applied state is never stored. Every query lists the applied directory and
//! matches file names against the rule's base name, see
//! [`ruledeck_core::applied`].

use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Result, WrapErr, eyre};
use ruledeck_core::{
    AppliedRule, Rule, RuleApplicationConfig, file_stem, frontmatter, resolve_applied_variants,
    unique_applied_name,
};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::discovery::DiscoveryService;

/// Attempts at claiming a fresh file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

/// Result of toggling a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggled {
    Applied(AppliedRule),
    Removed,
}

/// Applies and removes rules for one workspace.
pub struct ApplyManager {
    discovery: Arc<DiscoveryService>,
    applied_dir: PathBuf,
}

impl ApplyManager {
    pub fn new(discovery: Arc<DiscoveryService>, applied_dir: PathBuf) -> Self {
        Self {
            discovery,
            applied_dir,
        }
    }

    pub fn applied_dir(&self) -> &Path {
        &self.applied_dir
    }

    /// Files currently in the applied directory, sorted. Empty when the
    /// directory does not exist.
    pub async fn applied_listing(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.applied_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {e}", self.applied_dir.display());
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => files.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    warn!("Error listing {}: {e}", self.applied_dir.display());
                    break;
                }
            }
        }
        files.sort();
        files
    }

    /// Whether any projection of `rule` exists in `listing`.
    pub fn is_applied_in(rule: &Rule, listing: &[PathBuf]) -> bool {
        !resolve_applied_variants(&rule.base_name(), listing).is_empty()
    }

    /// Whether the rule with `rule_id` has a projection. Unknown rules and a
    /// missing applied directory both count as not applied.
    pub async fn is_rule_applied(&self, rule_id: &str) -> bool {
        let rule = match self.discovery.get_rule_by_id(rule_id).await {
            Ok(Some(rule)) => rule,
            Ok(None) => return false,
            Err(e) => {
                warn!("Cannot resolve {rule_id}: {e:#}");
                return false;
            }
        };
        Self::is_applied_in(&rule, &self.applied_listing().await)
    }

    /// Copy `rule_path` into the applied directory under a fresh name.
    ///
    /// `source` is the normalized owner suffix. Existing files are never
    /// overwritten.
    pub async fn apply_rule(
        &self,
        rule_path: &Path,
        config: RuleApplicationConfig,
        source: Option<&str>,
    ) -> Result<AppliedRule> {
        self.try_apply(rule_path, config, source.unwrap_or_default())
            .await
            .inspect_err(|e| error!("Failed to apply {}: {e:#}", rule_path.display()))
    }

    async fn try_apply(
        &self,
        rule_path: &Path,
        config: RuleApplicationConfig,
        source: &str,
    ) -> Result<AppliedRule> {
        tokio::fs::create_dir_all(&self.applied_dir)
            .await
            .wrap_err_with(|| format!("Failed to create {}", self.applied_dir.display()))?;

        let content = tokio::fs::read(rule_path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", rule_path.display()))?;

        let base = file_stem(rule_path);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let taken: HashSet<String> = self
                .applied_listing()
                .await
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            let name = unique_applied_name(&base, source, |n| taken.contains(n));
            let applied_path = self.applied_dir.join(&name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&applied_path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{name} appeared while applying, picking another name");
                    continue;
                }
                Err(e) => {
                    return Err(e)
                        .wrap_err_with(|| format!("Failed to create {}", applied_path.display()));
                }
            };
            file.write_all(&content)
                .await
                .wrap_err_with(|| format!("Failed to write {}", applied_path.display()))?;
            file.flush().await?;

            info!("Applied rule: {} -> {name}", rule_path.display());
            return Ok(AppliedRule {
                id: file_stem(&applied_path),
                original_path: Some(rule_path.to_path_buf()),
                applied_path,
                applied_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                config,
            });
        }

        Err(eyre!(
            "Could not find a free file name for {} in {}",
            base,
            self.applied_dir.display()
        ))
    }

    /// Apply a discovered rule. Without an explicit config the strategy
    /// follows the rule's frontmatter.
    pub async fn apply_rule_by_id(
        &self,
        rule_id: &str,
        config: Option<RuleApplicationConfig>,
    ) -> Result<AppliedRule> {
        let rule = self.discovery.require_rule(rule_id).await?;
        let config = config.unwrap_or_else(|| RuleApplicationConfig::from_metadata(&rule.metadata));
        let source = rule.source();
        self.apply_rule(&rule.file_path, config, Some(&source)).await
    }

    /// Delete every projection of the rule. Returns whether anything was
    /// deleted.
    pub async fn remove_applied_rule(&self, rule_id: &str) -> Result<bool> {
        let Some(rule) = self.discovery.get_rule_by_id(rule_id).await? else {
            warn!("Cannot remove unknown rule {rule_id}");
            return Ok(false);
        };

        let variants = resolve_applied_variants(&rule.base_name(), &self.applied_listing().await);
        for path in &variants {
            tokio::fs::remove_file(path)
                .await
                .wrap_err_with(|| format!("Failed to remove {}", path.display()))
                .inspect_err(|e| error!("{e:#}"))?;
            info!("Removed applied rule file: {}", path.display());
        }
        Ok(!variants.is_empty())
    }

    /// Apply when unapplied, remove otherwise.
    pub async fn toggle_rule(
        &self,
        rule_id: &str,
        config: Option<RuleApplicationConfig>,
    ) -> Result<Toggled> {
        let rule = self.discovery.require_rule(rule_id).await?;
        if Self::is_applied_in(&rule, &self.applied_listing().await) {
            self.remove_applied_rule(rule_id).await?;
            Ok(Toggled::Removed)
        } else {
            Ok(Toggled::Applied(self.apply_rule_by_id(rule_id, config).await?))
        }
    }

    /// Every `.mdc` projection in the applied directory, sorted by name.
    ///
    /// The apply time is the file's creation time where the platform records
    /// one, else its modification time. The config is inferred from the
    /// projected file's frontmatter. Files that cannot be read are skipped
    /// with a warning.
    pub async fn applied_rules(&self) -> Result<Vec<AppliedRule>> {
        let mut applied = Vec::new();
        for path in self.applied_listing().await {
            if path.extension().is_none_or(|ext| ext != "mdc") {
                continue;
            }
            match Self::read_applied_rule(path.clone()).await {
                Ok(rule) => applied.push(rule),
                Err(e) => warn!("Skipping applied rule {}: {e:#}", path.display()),
            }
        }
        Ok(applied)
    }

    async fn read_applied_rule(path: PathBuf) -> Result<AppliedRule> {
        let meta = tokio::fs::metadata(&path)
            .await
            .wrap_err_with(|| format!("Failed to stat {}", path.display()))?;
        let time = meta.created().or_else(|_| meta.modified())?;
        let applied_at: DateTime<Utc> = time.into();

        let text = tokio::fs::read_to_string(&path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let parsed = frontmatter::decode(&text);
        let config = ruledeck_core::RuleMetadata::from_raw(&parsed.metadata)
            .map(|m| RuleApplicationConfig::from_metadata(&m))
            .unwrap_or_default();

        Ok(AppliedRule {
            id: file_stem(&path),
            original_path: None,
            applied_path: path,
            applied_at: applied_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            config,
        })
    }
}
