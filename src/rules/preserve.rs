//! Preservation entries: the compact "keep these fields" rule shape
//!
//! ```yaml
//! preserve:
//!   - files: ["config.yaml"]
//!     fields:
//!       - key: remote_artifact
//!         pattern: "{prefix}-{version}.{ext}"
//!         strategy: replace_if_newer
//!       - key: image.tag
//!         value: "{tag_without_v}"
//!     regex:
//!       - pattern: 'version = "(?P<version>[\d.]+)"'
//!         replacement: 'version = "{tag_without_v}"'
//!         strategy: replace_if_newer
//! ```
//!
//! Each entry becomes one ordinary [`Rule`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Action, Rule, VersionGuard, VersionSource};
use crate::version::VersionStrategy;

/// First numeric version anywhere in the value
const DEFAULT_FIELD_PATTERN: &str = r"(?P<version>\d+(?:\.\d+){0,2})";

/// A preservation entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreserveRule {
    /// Optional rule name; defaults to `preserve:<first glob>`
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Glob patterns selecting files
    #[serde(alias = "file", deserialize_with = "one_or_many")]
    pub files: Vec<String>,

    #[serde(default)]
    pub fields: Vec<PreserveField>,

    #[serde(default)]
    pub regex: Vec<PreserveRegex>,
}

/// A field kept in step with the release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreserveField {
    #[serde(alias = "path", alias = "field")]
    pub key: String,

    /// Version pattern inside the current value
    #[serde(default)]
    pub pattern: Option<String>,

    /// Fixed replacement value; takes precedence over `pattern`
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(default)]
    pub strategy: VersionStrategy,
}

/// A raw-text substitution gated by a version strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreserveRegex {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub strategy: VersionStrategy,
}

fn default_enabled() -> bool {
    true
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl PreserveRule {
    /// Convert into a rule. Fields and substitutions with strategy `never`
    /// produce no action.
    pub fn into_rule(self) -> Rule {
        let name = self.name.unwrap_or_else(|| {
            format!(
                "preserve:{}",
                self.files.first().map(String::as_str).unwrap_or("*")
            )
        });

        let mut actions = Vec::new();
        for field in self.fields {
            if field.strategy == VersionStrategy::Never {
                continue;
            }
            let action = match field.value {
                Some(value) => Action::ReplaceValue {
                    key: field.key,
                    value,
                },
                None => Action::UpdateVersionInValue {
                    key: field.key,
                    pattern: field
                        .pattern
                        .unwrap_or_else(|| DEFAULT_FIELD_PATTERN.to_string()),
                    version_source: VersionSource::TagWithoutV,
                    strategy: Some(field.strategy),
                },
            };
            actions.push(action);
        }

        for sub in self.regex {
            let guard = match sub.strategy {
                VersionStrategy::Never => continue,
                VersionStrategy::Always => None,
                strategy => Some(VersionGuard {
                    group: "version".to_string(),
                    strategy,
                    against: VersionSource::TagWithoutV,
                }),
            };
            actions.push(Action::RegexReplace {
                pattern: sub.pattern,
                replacement: sub.replacement,
                guard,
            });
        }

        Rule {
            name,
            description: None,
            enabled: self.enabled,
            target_files: self.files,
            conditions: Vec::new(),
            actions,
            stop_processing: false,
        }
    }
}
