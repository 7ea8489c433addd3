//! Configuration schema for ruledeck
//!
//! Config lives at `.config/ruledeck/config.yaml` relative to the workspace
//! root. Every field is optional.
//!
//! ```yaml
//! registry_directory: .cursor-rules-registry
//! applied_directory: .cursor/rules/registry
//! user_email: someone@example.com
//! git_pull: false
//! teams:
//!   Asset Foundations:
//!     - someone@example.com
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_REGISTRY_DIRECTORY: &str = ".cursor-rules-registry";
pub const DEFAULT_APPLIED_DIRECTORY: &str = ".cursor/rules/registry";

/// Root configuration for ruledeck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry directory, relative to the workspace root.
    pub registry_directory: String,

    /// Where applied rules are copied, relative to the workspace root.
    pub applied_directory: String,

    /// Email used when git has none configured.
    pub user_email: Option<String>,

    /// Pull the registry with git before discovery.
    pub git_pull: bool,

    /// Team name to member emails.
    pub teams: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_directory: DEFAULT_REGISTRY_DIRECTORY.to_string(),
            applied_directory: DEFAULT_APPLIED_DIRECTORY.to_string(),
            user_email: None,
            git_pull: false,
            teams: BTreeMap::new(),
        }
    }
}
