//! Rule actions - document mutations that each yield at most one change

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{Change, TransformContext, cached_regex};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::template::{self, Variables};
use crate::version::VersionStrategy;

/// Where the replacement version for a version-bearing value comes from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// The full tag, e.g. `v1.4.5`
    Tag,
    /// The tag without its leading `v`, e.g. `1.4.5`
    #[default]
    TagWithoutV,
    /// A fixed template such as `"major({tag}).0.0"`
    Literal(String),
}

impl VersionSource {
    fn resolve(&self, ctx: &TransformContext, vars: &Variables) -> String {
        match self {
            VersionSource::Tag => ctx.tag().to_string(),
            VersionSource::TagWithoutV => ctx.tag_without_v().to_string(),
            VersionSource::Literal(value) => template::expand(value, vars),
        }
    }
}

/// Per-match guard for `regex_replace`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGuard {
    /// Capture group holding the current version
    #[serde(default = "default_version_group")]
    pub group: String,
    pub strategy: VersionStrategy,
    /// Candidate version to compare against
    #[serde(default)]
    pub against: VersionSource,
}

fn default_version_group() -> String {
    "version".to_string()
}

/// Action to perform on a matched document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Swap the version embedded in a string value, keeping its prefix and
    /// suffix. `pattern` is a regex with a named `version` group, or a
    /// placeholder pattern like `{prefix}-{version}.{ext}`.
    #[serde(alias = "update-version-in-value")]
    UpdateVersionInValue {
        #[serde(alias = "path")]
        key: String,
        pattern: String,
        #[serde(default)]
        version_source: VersionSource,
        /// Only replace when the strategy allows it
        #[serde(default)]
        strategy: Option<VersionStrategy>,
    },

    /// Overwrite the value at `key`
    #[serde(alias = "replace-value")]
    ReplaceValue {
        #[serde(alias = "path")]
        key: String,
        value: Value,
    },

    /// Write the value only if `key` has none
    #[serde(alias = "set-value-if-absent")]
    SetValueIfAbsent {
        #[serde(alias = "path")]
        key: String,
        value: Value,
    },

    /// Append to the list at `key`, unless the element is already there
    #[serde(alias = "append-to-array")]
    AppendToArray {
        #[serde(alias = "path")]
        key: String,
        value: Value,
    },

    /// Substitute over the raw text; named groups are template variables
    #[serde(alias = "regex-replace")]
    RegexReplace {
        pattern: String,
        replacement: String,
        #[serde(default)]
        guard: Option<VersionGuard>,
    },

    /// Any kind this version doesn't know; does nothing
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Short kind name used in change records
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpdateVersionInValue { .. } => "update_version_in_value",
            Action::ReplaceValue { .. } => "replace_value",
            Action::SetValueIfAbsent { .. } => "set_value_if_absent",
            Action::AppendToArray { .. } => "append_to_array",
            Action::RegexReplace { .. } => "regex_replace",
            Action::Unknown => "unknown",
        }
    }

    /// Apply to `content`, returning the new content and its change record,
    /// or `None` when nothing changed. Never fails.
    pub fn apply(&self, rule: &str, content: &str, ctx: &TransformContext) -> Option<(String, Change)> {
        let vars = ctx.variables();

        let edited = match self {
            Action::UpdateVersionInValue {
                key,
                pattern,
                version_source,
                strategy,
            } => {
                let re = match compile_version_pattern(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        warn!("[{}] update_version_in_value: {}", rule, e);
                        return None;
                    }
                };
                let candidate = version_source.resolve(ctx, &vars);
                edit_tree(content, key, |old| {
                    let current = old?.as_str()?;
                    let caps = re.captures(current)?;
                    let found = caps.name("version")?;
                    if let Some(strategy) = strategy
                        && !strategy.allows(found.as_str(), &candidate)
                    {
                        debug!(
                            "[{}] {}: keeping {} ({:?} vs {})",
                            rule,
                            key,
                            found.as_str(),
                            strategy,
                            candidate
                        );
                        return None;
                    }
                    let updated = format!(
                        "{}{}{}",
                        &current[..found.start()],
                        candidate,
                        &current[found.end()..]
                    );
                    Some(Value::String(updated))
                })
                .map(|edit| edit.describe(key, |new| format!("Update version in {} to {}", key, new)))
            }

            Action::ReplaceValue { key, value } => {
                let value = expand_value(value, &vars);
                edit_tree(content, key, |_| Some(value))
                    .map(|edit| edit.describe(key, |new| format!("Set {} to {}", key, new)))
            }

            Action::SetValueIfAbsent { key, value } => {
                let value = expand_value(value, &vars);
                edit_tree(content, key, |old| match old {
                    None | Some(Value::Null) => Some(value),
                    Some(_) => None,
                })
                .map(|edit| edit.describe(key, |new| format!("Initialize {} to {}", key, new)))
            }

            Action::AppendToArray { key, value } => {
                let value = expand_value(value, &vars);
                let element = display_value(&value);
                edit_tree(content, key, |old| {
                    let mut items = old
                        .and_then(|v| v.as_array())
                        .cloned()
                        .unwrap_or_default();
                    if items.contains(&value) {
                        return None;
                    }
                    items.push(value);
                    Some(Value::Array(items))
                })
                .map(|edit| edit.describe(key, |_| format!("Append {} to {}", element, key)))
            }

            Action::RegexReplace {
                pattern,
                replacement,
                guard,
            } => regex_replace(rule, content, pattern, replacement, guard.as_ref(), ctx, &vars),

            Action::Unknown => {
                warn!("[{}] Unknown action kind, skipping", rule);
                None
            }
        };

        edited.map(|e| {
            let change = Change {
                rule: rule.to_string(),
                action: self.kind(),
                key: e.key,
                old_value: e.old_value,
                new_value: e.new_value,
                description: e.description,
            };
            (e.content, change)
        })
    }
}

/// Intermediate result of a successful edit
struct Edit {
    content: String,
    key: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    description: String,
}

/// Tree edit before it has a key and description attached
struct TreeEdit {
    content: String,
    old: Option<Value>,
    new: Value,
}

impl TreeEdit {
    fn describe<F>(self, key: &str, describe: F) -> Edit
    where
        F: FnOnce(&str) -> String,
    {
        let new_value = display_value(&self.new);
        Edit {
            description: describe(&new_value),
            content: self.content,
            key: Some(key.to_string()),
            old_value: self.old.as_ref().map(display_value),
            new_value: Some(new_value),
        }
    }
}

/// Parse, compute a replacement for the value at `key`, and render back.
///
/// `compute` sees the current value and returns the new one, or `None` to
/// leave the document alone. Writing the same value is not a change.
fn edit_tree<F>(content: &str, key: &str, compute: F) -> Option<TreeEdit>
where
    F: FnOnce(Option<&Value>) -> Option<Value>,
{
    let mut doc = match Document::parse(content) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Leaving unparseable document alone: {}", e);
            return None;
        }
    };

    let old = doc.get(key).cloned();
    let new = compute(old.as_ref())?;
    if old.as_ref() == Some(&new) {
        return None;
    }

    if let Err(e) = doc.set(key, new.clone()) {
        warn!("Cannot write {}: {}", key, e);
        return None;
    }
    match doc.render() {
        Ok(content) => Some(TreeEdit { content, old, new }),
        Err(e) => {
            warn!("Cannot render {} document: {}", doc.format(), e);
            None
        }
    }
}

fn regex_replace(
    rule: &str,
    content: &str,
    pattern: &str,
    replacement: &str,
    guard: Option<&VersionGuard>,
    ctx: &TransformContext,
    vars: &Variables,
) -> Option<Edit> {
    let re = match cached_regex(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!("[{}] regex_replace: {}", rule, e);
            return None;
        }
    };
    let candidate = guard.map(|g| g.against.resolve(ctx, vars));

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    let mut old_parts = Vec::new();
    let mut new_parts = Vec::new();

    for caps in re.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };

        if let (Some(guard), Some(candidate)) = (guard, &candidate) {
            let Some(current) = caps.name(&guard.group) else {
                debug!("[{}] guard group '{}' did not capture", rule, guard.group);
                continue;
            };
            if !guard.strategy.allows(current.as_str(), candidate) {
                continue;
            }
        }

        let mut match_vars = vars.clone();
        for name in re.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                match_vars.insert(name.to_string(), m.as_str().to_string());
            }
        }
        let replaced = template::expand(replacement, &match_vars);
        if replaced == whole.as_str() {
            continue;
        }

        out.push_str(&content[last..whole.start()]);
        out.push_str(&replaced);
        last = whole.end();
        old_parts.push(whole.as_str().to_string());
        new_parts.push(replaced);
    }

    if old_parts.is_empty() {
        return None;
    }
    out.push_str(&content[last..]);

    Some(Edit {
        content: out,
        key: None,
        description: format!(
            "Replaced {} match(es) of /{}/",
            old_parts.len(),
            pattern
        ),
        old_value: Some(old_parts.join(", ")),
        new_value: Some(new_parts.join(", ")),
    })
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid placeholder regex"));

/// Numeric version matched by `{version}` in placeholder patterns
const VERSION_CAPTURE: &str = r"(?P<version>\d+(?:\.\d+){0,2})";

/// Compile a version pattern and make sure it names its `version` group.
///
/// A pattern that already works as a regex with a `version` group is used
/// as is; otherwise one containing `{version}` is read as a placeholder
/// pattern.
fn compile_version_pattern(pattern: &str) -> Result<Regex> {
    let as_regex = cached_regex(pattern);
    if let Ok(re) = &as_regex
        && has_version_group(re)
    {
        return Ok(re.clone());
    }

    if PLACEHOLDER_RE
        .captures_iter(pattern)
        .any(|caps| caps.get(1).is_some_and(|m| m.as_str() == "version"))
    {
        let source = placeholder_regex(pattern);
        return Regex::new(&source).map_err(|source| Error::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        });
    }

    as_regex?;
    Err(Error::MissingVersionGroup(pattern.to_string()))
}

fn has_version_group(re: &Regex) -> bool {
    re.capture_names().flatten().any(|n| n == "version")
}

/// Turn `{prefix}-{version}.{ext}` into an anchored regex
fn placeholder_regex(pattern: &str) -> String {
    let mut source = String::from("^");
    let mut seen: Vec<&str> = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(pattern) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        source.push_str(&regex::escape(&pattern[last..whole.start()]));
        let name = name.as_str();
        if seen.contains(&name) {
            source.push_str(if name == "version" { r"\d+(?:\.\d+){0,2}" } else { ".+?" });
        } else if name == "version" {
            source.push_str(VERSION_CAPTURE);
        } else {
            source.push_str(&format!("(?P<{}>.+?)", name));
        }
        seen.push(name);
        last = whole.end();
    }
    source.push_str(&regex::escape(&pattern[last..]));
    source.push('$');
    source
}

/// Expand templates in every string inside `value`
fn expand_value(value: &Value, vars: &Variables) -> Value {
    match value {
        Value::String(s) => Value::String(template::expand(s, vars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| expand_value(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand_value(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
