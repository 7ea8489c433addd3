//! ruledeck library - Discover, filter and apply shared editor rules
//!
//! This library exposes the service layer behind the `ruledeck` binary for
//! testing and embedding.

pub mod apply;
pub mod config;
pub mod discovery;
pub mod git;
pub mod output;
pub mod serve;
pub mod service;
pub mod teams;

use config::Config;
use eyre::{Result, WrapErr, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Config file location relative to the workspace root.
pub const CONFIG_PATH: &str = ".config/ruledeck/config.yaml";

/// A workspace root together with its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Open the workspace at `root`, reading config from `config_path` or the
    /// default location. A missing config file means defaults.
    pub fn open(root: impl Into<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!("No workspace folder found at {}", root.display());
        }
        let root = root
            .canonicalize()
            .wrap_err_with(|| format!("Failed to resolve {}", root.display()))?;

        let config = match config_path {
            Some(path) => load_config(path)?,
            None => load_config_or_default(&root.join(CONFIG_PATH)),
        };
        Ok(Self { root, config })
    }

    pub fn with_config(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.root.join(&self.config.registry_directory)
    }

    pub fn applied_dir(&self) -> PathBuf {
        self.root.join(&self.config.applied_directory)
    }
}

/// Walk up from `start` to the nearest directory holding a registry, a
/// ruledeck config or a `.git` directory. Falls back to `start` itself.
pub fn find_workspace_root(start: &Path) -> PathBuf {
    let markers = [
        config::DEFAULT_REGISTRY_DIRECTORY,
        ".config/ruledeck",
        ".git",
    ];
    let mut current = start.to_path_buf();
    loop {
        if markers.iter().any(|m| current.join(m).exists()) {
            debug!("Workspace root: {}", current.display());
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!(
            "Config file not found at {}\n\n\
             Create a config file, for example:\n\n\
             registry_directory: .cursor-rules-registry\n\
             applied_directory: .cursor/rules/registry",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Load config if it exists, otherwise return the defaults.
///
/// A config file that exists but does not parse is reported and ignored.
pub fn load_config_or_default(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }

    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{e:#}, using defaults");
            Config::default()
        }
    }
}
