//! Configuration management

mod schema;

pub use schema::{Config, GeneralConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::rules::{PreserveRule, Rule};

impl Config {
    /// File name of the tool configuration inside a project
    pub const FILE_NAME: &'static str = "synckeep.toml";

    /// Load configuration from a file or the default location.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(Self::default_path)
            .context("Could not determine config path")?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))
    }

    /// `synckeep.toml` in the current directory
    pub fn default_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|dir| dir.join(Self::FILE_NAME))
    }

    /// Embedded rules followed by converted `[[preserve]]` entries
    pub fn into_rules(self) -> Vec<Rule> {
        let mut rules = self.rules;
        rules.extend(self.preserve.into_iter().map(PreserveRule::into_rule));
        rules
    }
}
