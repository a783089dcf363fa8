//! Configuration file support for qpc.
//!
//! qpc reads two configuration files:
//! - Global: `<config dir>/config.toml` - user-wide defaults
//! - Project: `<root>/.qpc/config.toml` - project-specific overrides
//!
//! Project config takes precedence over global config, and command line
//! flags take precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// qpc configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation settings
    pub generate: GenerateConfig,

    /// Extra user aliases per canonical platform name
    pub platforms: BTreeMap<String, Vec<String>>,
}

/// Generation-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Platforms generated when none are given on the command line
    pub platforms: Vec<String>,

    /// Base file, relative to the root directory
    pub base_file: Option<PathBuf>,

    /// Master file name
    pub master_file: Option<String>,

    /// Hash store directory, relative to the root directory
    pub hash_dir: Option<PathBuf>,

    /// Worker threads for project scripts
    pub jobs: Option<usize>,

    /// Enabled generators (empty = all)
    pub generators: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let generate = other.generate;
        if !generate.platforms.is_empty() {
            self.generate.platforms = generate.platforms;
        }
        if generate.base_file.is_some() {
            self.generate.base_file = generate.base_file;
        }
        if generate.master_file.is_some() {
            self.generate.master_file = generate.master_file;
        }
        if generate.hash_dir.is_some() {
            self.generate.hash_dir = generate.hash_dir;
        }
        if generate.jobs.is_some() {
            self.generate.jobs = generate.jobs;
        }
        if !generate.generators.is_empty() {
            self.generate.generators = generate.generators;
        }

        // Alias lists are replaced per platform, not appended
        self.platforms.extend(other.platforms);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.qpc/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }
    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "qpc", "qpc").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Get the project config path (.qpc/config.toml).
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(".qpc").join("config.toml")
}
