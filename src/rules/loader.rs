//! Rule loading - merges rule sets from every configured source
//!
//! Sources are read in priority order and their rules concatenated:
//!
//! 1. user-global rule file (`<config dir>/synckeep/rules.yaml`)
//! 2. project-local rule file (`<project>/.synckeep/rules.yaml`)
//! 3. the tool configuration's `[[rule]]` / `[[preserve]]` blocks
//! 4. the file named by an environment variable (`SYNCKEEP_RULES`)
//!
//! A missing source is skipped, an unreadable or malformed one contributes
//! nothing; neither stops the others from loading.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::{PreserveRule, Rule};
use crate::config::Config;
use crate::error::{Error, Result};

/// Default environment variable naming an extra rule file
pub const RULES_ENV_VAR: &str = "SYNCKEEP_RULES";

/// Shape of a standalone rule file (YAML, JSON or TOML)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RuleFile {
    #[serde(default, alias = "rule")]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub preserve: Vec<PreserveRule>,
}

impl RuleFile {
    /// Parse a rule file, picking the format from the file extension
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => serde_json::from_str(content).map_err(|e| Error::parse("JSON", e)),
            Some("toml") => toml::from_str(content).map_err(|e| Error::parse("TOML", e)),
            _ => serde_yaml::from_str(content).map_err(|e| Error::parse("YAML", e)),
        }
    }

    /// All rules in file order: `rules` first, then converted `preserve` entries
    pub fn into_rules(self) -> Vec<Rule> {
        let mut rules = self.rules;
        rules.extend(self.preserve.into_iter().map(PreserveRule::into_rule));
        rules
    }
}

/// Where to look for rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSources {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    /// Tool configuration file (TOML)
    pub config: Option<PathBuf>,
    /// Environment variable holding one more rule file path
    pub env_var: Option<String>,
}

impl RuleSources {
    /// Standard locations for a project directory
    pub fn discover(project_dir: &Path) -> Self {
        Self {
            global: global_rules_path(),
            project: Some(project_dir.join(".synckeep").join("rules.yaml")),
            config: Some(project_dir.join(Config::FILE_NAME)),
            env_var: Some(RULES_ENV_VAR.to_string()),
        }
    }

    /// Use `path` as the tool configuration
    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    /// Read the extra rule file path from `name` instead of the default
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = Some(name.into());
        self
    }
}

fn global_rules_path() -> Option<PathBuf> {
    let base = dirs::config_dir().or_else(|| dirs::home_dir().map(|d| d.join(".config")))?;
    Some(base.join("synckeep").join("rules.yaml"))
}

/// Loads rules once and serves the cached set until [`reset`](Self::reset)
#[derive(Debug, Default)]
pub struct RuleLoader {
    sources: RuleSources,
    cache: Mutex<Option<Arc<[Rule]>>>,
}

impl RuleLoader {
    pub fn new(sources: RuleSources) -> Self {
        Self {
            sources,
            cache: Mutex::new(None),
        }
    }

    pub fn sources(&self) -> &RuleSources {
        &self.sources
    }

    /// Enabled rules from all sources.
    ///
    /// The first call reads the sources while holding the cache lock, so
    /// concurrent first calls wait for one load instead of racing.
    pub fn load(&self) -> Arc<[Rule]> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rules) = cache.as_ref() {
            return Arc::clone(rules);
        }
        let rules: Arc<[Rule]> = self.read_all().into();
        *cache = Some(Arc::clone(&rules));
        rules
    }

    /// Drop the cached rules; the next [`load`](Self::load) reads again
    pub fn reset(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
        debug!("Rule cache cleared");
    }

    fn read_all(&self) -> Vec<Rule> {
        let mut rules = Vec::new();

        if let Some(path) = &self.sources.global {
            rules.extend(read_rule_file("global", path));
        }
        if let Some(path) = &self.sources.project {
            rules.extend(read_rule_file("project", path));
        }
        if let Some(path) = &self.sources.config {
            rules.extend(read_config(path));
        }
        if let Some(name) = &self.sources.env_var
            && let Ok(value) = std::env::var(name)
            && !value.trim().is_empty()
        {
            let path = crate::expand_path(Path::new(value.trim()));
            rules.extend(read_rule_file(name, &path));
        }

        let total = rules.len();
        rules.retain(|rule| {
            if !rule.enabled {
                debug!("Dropping disabled rule: {}", rule.name);
            }
            rule.enabled
        });

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                warn!("Rule name '{}' is defined more than once", rule.name);
            }
        }

        info!("Loaded {} rule(s) ({} disabled)", rules.len(), total - rules.len());
        rules
    }
}

fn read_rule_file(label: &str, path: &Path) -> Vec<Rule> {
    if !path.exists() {
        debug!("No {} rule file at {}", label, path.display());
        return Vec::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|source| Error::ReadSource {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|content| RuleFile::parse(path, &content));

    match parsed {
        Ok(file) => {
            let rules = file.into_rules();
            debug!("{} rule(s) from {} ({})", rules.len(), path.display(), label);
            rules
        }
        Err(e) => {
            warn!("Skipping {} rule source {}: {}", label, path.display(), e);
            Vec::new()
        }
    }
}

fn read_config(path: &Path) -> Vec<Rule> {
    if !path.exists() {
        debug!("No tool configuration at {}", path.display());
        return Vec::new();
    }
    match Config::load(Some(path)) {
        Ok(config) => config.into_rules(),
        Err(e) => {
            warn!("Skipping rules in {}: {:#}", path.display(), e);
            Vec::new()
        }
    }
}
