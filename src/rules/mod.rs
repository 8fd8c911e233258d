//! Rule engine - conditions and actions for structured file transformations

mod action;
mod change;
mod condition;
mod context;
mod engine;
mod loader;
mod preserve;

pub use action::{Action, VersionGuard, VersionSource};
pub use change::{Change, render_summary};
pub use condition::Condition;
pub use context::TransformContext;
pub use engine::{RuleEngine, Transformation};
pub use loader::{RULES_ENV_VAR, RuleFile, RuleLoader, RuleSources};
pub use preserve::{PreserveField, PreserveRegex, PreserveRule};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// A rule that selects files and rewrites them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Human-readable name, unique within a loaded set
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the rule is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Glob patterns selecting the files this rule applies to
    #[serde(default)]
    pub target_files: Vec<String>,

    /// Conditions to match (all must match; none means always)
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Actions applied in order, each seeing the previous one's output
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Skip the remaining rules for a file once this one applied
    #[serde(default)]
    pub stop_processing: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Create a new enabled rule without conditions
    pub fn new(name: impl Into<String>, target_files: Vec<String>, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            target_files,
            conditions: Vec::new(),
            actions,
            stop_processing: false,
        }
    }

    /// Add a condition
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

// Compiled regexes shared by conditions and actions, cached per thread.
// Capped at 1000 entries; cleared entirely when the cap is exceeded.
const CACHE_MAX_ENTRIES: usize = 1000;

std::thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

fn cached_regex(pattern: &str) -> Result<Regex> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() >= CACHE_MAX_ENTRIES && !cache.contains_key(pattern) {
            cache.clear();
        }
        if let Some(r) = cache.get(pattern) {
            return Ok(r.clone());
        }
        let r = Regex::new(pattern).map_err(|source| Error::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        cache.insert(pattern.to_string(), r.clone());
        Ok(r)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_yaml() {
        let yaml = r#"
name: bump-chart
description: Keep the chart version in step with releases
target_files: ["Chart.yaml"]
conditions:
  - type: key_exists
    key: version
actions:
  - type: replace_value
    key: appVersion
    value: "{tag_without_v}"
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.name, "bump-chart");
        assert!(rule.enabled);
        assert!(!rule.stop_processing);
        assert_eq!(rule.target_files, vec!["Chart.yaml"]);
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.actions[0].kind(), "replace_value");
    }

    #[test]
    fn test_cached_regex_reports_invalid_pattern() {
        assert!(matches!(
            cached_regex("(unclosed"),
            Err(Error::InvalidRegex { .. })
        ));
        assert!(cached_regex(r"\d+").unwrap().is_match("42"));
    }
}
