//! Git collaborators: user identity and registry sync
//!
//! Both are best effort. A missing git binary or a repository without a
//! configured email never stops rule discovery.

use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Whether `email` looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Run a git command in `dir` and capture stdout.
pub async fn git_capture(dir: &Path, args: &[&str]) -> Result<String> {
    let out = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .wrap_err("failed to run git")?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    String::from_utf8(out.stdout)
        .wrap_err_with(|| format!("git {} output is not valid UTF-8", args.join(" ")))
}

/// Source of the current user's email.
#[async_trait]
pub trait UserIdentity: Send + Sync {
    async fn user_email(&self) -> Option<String>;
}

/// Looks up `user.email` from global then repository git config, then falls
/// back to a configured address.
#[derive(Debug, Clone)]
pub struct GitIdentity {
    workspace_root: PathBuf,
    fallback: Option<String>,
}

impl GitIdentity {
    pub fn new(workspace_root: impl Into<PathBuf>, fallback: Option<String>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            fallback,
        }
    }

    async fn email_from_git(&self, args: &[&str]) -> Option<String> {
        match git_capture(&self.workspace_root, args).await {
            Ok(out) => {
                let email = out.trim().to_string();
                if is_valid_email(&email) {
                    Some(email)
                } else {
                    debug!("Ignoring git email {email:?}");
                    None
                }
            }
            Err(e) => {
                debug!("{e:#}");
                None
            }
        }
    }
}

#[async_trait]
impl UserIdentity for GitIdentity {
    async fn user_email(&self) -> Option<String> {
        if let Some(email) = self.email_from_git(&["config", "--global", "user.email"]).await {
            info!("Found user email in global git config: {email}");
            return Some(email);
        }
        if let Some(email) = self.email_from_git(&["config", "user.email"]).await {
            info!("Found user email in repository git config: {email}");
            return Some(email);
        }
        match self.fallback.as_deref().map(str::trim) {
            Some(email) if is_valid_email(email) => Some(email.to_string()),
            Some(email) => {
                warn!("Configured user_email {email:?} is not a valid address");
                None
            }
            None => {
                info!("No user email found in git config or ruledeck config");
                None
            }
        }
    }
}

/// A fixed identity, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

#[async_trait]
impl UserIdentity for StaticIdentity {
    async fn user_email(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Fast-forward the repository containing `registry_root`.
///
/// Returns `Ok(false)` when the registry is not inside a git work tree.
pub async fn pull_registry(registry_root: &Path) -> Result<bool> {
    if git_capture(registry_root, &["rev-parse", "--is-inside-work-tree"])
        .await
        .is_err()
    {
        debug!("{} is not in a git work tree", registry_root.display());
        return Ok(false);
    }
    let out = git_capture(registry_root, &["pull", "--ff-only"]).await?;
    info!("git pull: {}", out.trim());
    Ok(true)
}
