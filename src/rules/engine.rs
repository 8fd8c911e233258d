//! Rule engine - selects, evaluates and applies rules to one file at a time

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::{Change, Rule, RuleLoader, TransformContext};
use crate::pattern;

/// Outcome of running the engine over one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transformation {
    /// Whether `content` differs from the input
    pub changed: bool,
    pub content: String,
    /// Rules that produced at least one change, in application order
    pub applied_rules: Vec<String>,
    pub changes: Vec<Change>,
}

/// Engine for evaluating rules against files
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Arc<[Rule]>,
}

impl RuleEngine {
    /// Create a new rule engine with the given rules
    pub fn new(rules: impl Into<Arc<[Rule]>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Create an engine over the loader's (cached) rule set
    pub fn from_loader(loader: &RuleLoader) -> Self {
        Self { rules: loader.load() }
    }

    /// Get all rules
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Enabled rules whose target patterns match `path`, in load order
    pub fn matching_rules<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |rule| {
            if !rule.enabled {
                trace!("Skipping disabled rule: {}", rule.name);
                return false;
            }
            pattern::matches(path, &rule.target_files)
        })
    }

    /// Run every applicable rule over `content`.
    ///
    /// Never performs I/O on `path`; it is only used for pattern matching.
    pub fn process(&self, path: &Path, content: &str, ctx: &TransformContext) -> Transformation {
        let mut current = content.to_string();
        let mut applied_rules = Vec::new();
        let mut changes = Vec::new();

        for rule in self.matching_rules(path) {
            if !rule.conditions.iter().all(|c| c.evaluate(&current, ctx)) {
                debug!("Rule '{}' conditions not met for {}", rule.name, path.display());
                continue;
            }

            let before = changes.len();
            for action in &rule.actions {
                if let Some((next, change)) = action.apply(&rule.name, &current, ctx) {
                    debug!("{}: {}", path.display(), change);
                    current = next;
                    changes.push(change);
                }
            }

            if changes.len() > before {
                let prefix = if ctx.is_dry_run() { "[dry-run] " } else { "" };
                info!(
                    "{}Rule '{}' changed {} ({} change(s))",
                    prefix,
                    rule.name,
                    path.display(),
                    changes.len() - before
                );
                applied_rules.push(rule.name.clone());
                if rule.stop_processing {
                    debug!("Rule '{}' stops further processing", rule.name);
                    break;
                }
            }
        }

        Transformation {
            changed: current != content,
            content: current,
            applied_rules,
            changes,
        }
    }

    /// Same as [`process`](Self::process) with the context marked as a dry
    /// run. Callers must not write the result anywhere.
    pub fn preview(&self, path: &Path, content: &str, ctx: &TransformContext) -> Transformation {
        let ctx = ctx.clone().with_dry_run(true);
        self.process(path, content, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Action, Condition, VersionSource};
    use crate::version::VersionStrategy;
    use serde_json::json;

    fn artifact_rule(strategy: Option<VersionStrategy>) -> Rule {
        Rule::new(
            "artifact",
            vec!["*.yaml".into()],
            vec![Action::UpdateVersionInValue {
                key: "remote_artifact".into(),
                pattern: "{prefix}-{version}.{ext}".into(),
                version_source: VersionSource::TagWithoutV,
                strategy,
            }],
        )
    }

    fn key_exists(key: &str) -> Condition {
        Condition::KeyExists {
            key: key.into(),
            file_type: None,
        }
    }

    #[test]
    fn test_updates_artifact_version() {
        let engine = RuleEngine::new(vec![artifact_rule(None)]);
        let ctx = TransformContext::new("v1.4.5");

        let result = engine.process(
            Path::new("config.yaml"),
            "remote_artifact: app-1.0.0.zip\n",
            &ctx,
        );
        assert!(result.changed);
        assert_eq!(result.content, "remote_artifact: app-1.4.5.zip\n");
        assert_eq!(result.applied_rules, vec!["artifact"]);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].rule, "artifact");
        assert_eq!(result.changes[0].old_value.as_deref(), Some("app-1.0.0.zip"));
        assert_eq!(result.changes[0].new_value.as_deref(), Some("app-1.4.5.zip"));
    }

    #[test]
    fn test_newer_local_version_is_kept() {
        let engine = RuleEngine::new(vec![artifact_rule(Some(VersionStrategy::ReplaceIfNewer))]);
        let ctx = TransformContext::new("v1.4.5");
        let input = "remote_artifact: app-2.0.0.zip\n";

        let result = engine.process(Path::new("config.yaml"), input, &ctx);
        assert!(!result.changed);
        assert_eq!(result.content, input);
        assert!(result.changes.is_empty());
        assert!(result.applied_rules.is_empty());
    }

    #[test]
    fn test_pattern_selection() {
        let engine = RuleEngine::new(vec![artifact_rule(None)]);
        let ctx = TransformContext::new("v1.4.5");
        let json = r#"{"remote_artifact": "app-1.0.0.zip"}"#;

        assert!(!engine.process(Path::new("config.json"), json, &ctx).changed);
        assert!(engine.process(Path::new("deploy/config.yaml"), json, &ctx).changed);
    }

    #[test]
    fn test_replace_value_in_compact_json() {
        let rule = Rule::new(
            "version",
            vec!["package.json".into()],
            vec![Action::ReplaceValue {
                key: "version".into(),
                value: json!("{tag_without_v}"),
            }],
        );
        let engine = RuleEngine::new(vec![rule]);
        let result = engine.process(
            Path::new("package.json"),
            r#"{"version":"1.0.0"}"#,
            &TransformContext::new("v2.1.0"),
        );
        assert_eq!(result.content, r#"{"version":"2.1.0"}"#);
    }

    #[test]
    fn test_any_failing_condition_blocks_rule() {
        let rule = Rule::new(
            "guarded",
            vec!["*.yaml".into()],
            vec![Action::ReplaceValue {
                key: "version".into(),
                value: json!("9.9.9"),
            }],
        )
        .when(key_exists("version"))
        .when(key_exists("missing"));
        let engine = RuleEngine::new(vec![rule]);
        let input = "version: 1.0.0\n";

        let result = engine.process(Path::new("a.yaml"), input, &TransformContext::new("v1"));
        assert!(!result.changed);
        assert_eq!(result.content, input);
    }

    #[test]
    fn test_idempotent_second_pass() {
        let rules = vec![
            artifact_rule(None),
            Rule::new(
                "tags",
                vec!["*.yaml".into()],
                vec![
                    Action::AppendToArray {
                        key: "history".into(),
                        value: json!("{tag}"),
                    },
                    Action::SetValueIfAbsent {
                        key: "owner".into(),
                        value: json!("platform"),
                    },
                ],
            ),
        ];
        let engine = RuleEngine::new(rules);
        let ctx = TransformContext::new("v1.4.5");
        let path = Path::new("config.yaml");

        let first = engine.process(path, "remote_artifact: app-1.0.0.zip\n", &ctx);
        assert!(first.changed);
        assert_eq!(first.applied_rules, vec!["artifact", "tags"]);
        assert_eq!(first.changes.len(), 3);

        let second = engine.process(path, &first.content, &ctx);
        assert!(!second.changed);
        assert!(second.changes.is_empty());
    }

    #[test]
    fn test_later_actions_see_earlier_output() {
        let rule = Rule::new(
            "chain",
            vec!["*.yaml".into()],
            vec![
                Action::SetValueIfAbsent {
                    key: "image".into(),
                    value: json!("app:0.1.0"),
                },
                Action::UpdateVersionInValue {
                    key: "image".into(),
                    pattern: ":(?P<version>[0-9.]+)$".into(),
                    version_source: VersionSource::TagWithoutV,
                    strategy: Some(VersionStrategy::ReplaceIfNewer),
                },
            ],
        );
        let engine = RuleEngine::new(vec![rule]);
        let result = engine.process(Path::new("a.yaml"), "name: x\n", &TransformContext::new("v1.0.0"));
        assert_eq!(result.content, "name: x\nimage: app:1.0.0\n");
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn test_untouched_keys_survive() {
        let rule = Rule::new(
            "version",
            vec!["*.yaml".into()],
            vec![Action::ReplaceValue {
                key: "version".into(),
                value: json!("2.0.0"),
            }],
        );
        let engine = RuleEngine::new(vec![rule]);
        let input = "name: demo\nversion: 1.0.0\nports:\n- 80\n- 443\nnested:\n  keep: true\n";
        let result = engine.process(Path::new("a.yaml"), input, &TransformContext::new("v2"));

        let before: serde_yaml::Value = serde_yaml::from_str(input).unwrap();
        let after: serde_yaml::Value = serde_yaml::from_str(&result.content).unwrap();
        for key in ["name", "ports", "nested"] {
            assert_eq!(before[key], after[key]);
        }
        assert_eq!(after["version"], serde_yaml::Value::from("2.0.0"));
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let mut rule = artifact_rule(None);
        rule.enabled = false;
        let engine = RuleEngine::new(vec![rule]);
        let result = engine.process(
            Path::new("config.yaml"),
            "remote_artifact: app-1.0.0.zip\n",
            &TransformContext::new("v2.0.0"),
        );
        assert!(!result.changed);
    }

    #[test]
    fn test_stop_processing() {
        let mut first = Rule::new(
            "first",
            vec!["*.yaml".into()],
            vec![Action::ReplaceValue {
                key: "a".into(),
                value: json!(1),
            }],
        );
        first.stop_processing = true;
        let second = Rule::new(
            "second",
            vec!["*.yaml".into()],
            vec![Action::ReplaceValue {
                key: "b".into(),
                value: json!(2),
            }],
        );
        let engine = RuleEngine::new(vec![first, second]);
        let result = engine.process(Path::new("x.yaml"), "a: 0\n", &TransformContext::new("v1"));
        assert_eq!(result.applied_rules, vec!["first"]);
        assert_eq!(result.content, "a: 1\n");
    }

    #[test]
    fn test_preview_matches_process() {
        let engine = RuleEngine::new(vec![artifact_rule(None)]);
        let ctx = TransformContext::new("v1.4.5");
        let input = "remote_artifact: app-1.0.0.zip\n";
        let path = Path::new("config.yaml");
        assert_eq!(engine.preview(path, input, &ctx), engine.process(path, input, &ctx));
    }
}
