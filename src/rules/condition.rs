//! Rule conditions - boolean predicates over a file's document

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{TransformContext, cached_regex};
use crate::document::{Document, Format};

/// A condition that must hold for a rule to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// The document has a value at `key`
    #[serde(alias = "key-exists")]
    KeyExists {
        #[serde(alias = "path")]
        key: String,
        /// Parse strictly as this format instead of guessing
        #[serde(default)]
        file_type: Option<Format>,
    },

    /// The string at `key` matches `pattern`
    #[serde(alias = "value-matches")]
    ValueMatches {
        #[serde(alias = "path")]
        key: String,
        pattern: String,
    },

    /// The file being processed exists, or `path` exists under the
    /// context's base directory
    #[serde(alias = "file-exists")]
    FileExists {
        #[serde(default)]
        path: Option<String>,
    },

    /// Any kind this version doesn't know; never holds
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// Evaluate against raw `content`. Never fails; anything that can't be
    /// checked counts as false.
    pub fn evaluate(&self, content: &str, ctx: &TransformContext) -> bool {
        match self {
            Condition::KeyExists { key, file_type } => {
                let parsed = match file_type {
                    Some(format) => Document::parse_as(content, *format),
                    None => Document::parse(content),
                };
                match parsed {
                    Ok(doc) => doc.get(key).is_some(),
                    Err(e) => {
                        debug!("key_exists '{}': {}", key, e);
                        false
                    }
                }
            }

            Condition::ValueMatches { key, pattern } => {
                let Ok(doc) = Document::parse(content) else {
                    return false;
                };
                let Some(value) = doc.get(key).and_then(|v| v.as_str()) else {
                    return false;
                };
                match cached_regex(pattern) {
                    Ok(re) => re.is_match(value),
                    Err(e) => {
                        warn!("value_matches '{}': {}", key, e);
                        false
                    }
                }
            }

            Condition::FileExists { path } => match path {
                None => true,
                Some(rel) => ctx
                    .base_dir()
                    .map(|dir| dir.join(rel).exists())
                    .unwrap_or(false),
            },

            Condition::Unknown => {
                warn!("Unknown condition kind evaluates to false");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TransformContext {
        TransformContext::new("v1.0.0")
    }

    fn key_exists(key: &str) -> Condition {
        Condition::KeyExists {
            key: key.to_string(),
            file_type: None,
        }
    }

    #[test]
    fn test_key_exists() {
        let yaml = "services:\n  api:\n    image: app:1.0\n";
        assert!(key_exists("services.api").evaluate(yaml, &ctx()));
        assert!(!key_exists("services.web").evaluate(yaml, &ctx()));
    }

    #[test]
    fn test_key_exists_with_forced_format() {
        let cond = Condition::KeyExists {
            key: "name".into(),
            file_type: Some(Format::Json),
        };
        assert!(cond.evaluate(r#"{"name": "demo"}"#, &ctx()));
        assert!(!cond.evaluate("name: demo\n", &ctx()));
    }

    #[test]
    fn test_key_exists_on_garbage_is_false() {
        assert!(!key_exists("a").evaluate("a: [unclosed\n  - : :", &ctx()));
    }

    #[test]
    fn test_value_matches() {
        let cond = Condition::ValueMatches {
            key: "image".into(),
            pattern: r"^ghcr\.io/".into(),
        };
        assert!(cond.evaluate("image: ghcr.io/acme/app:1.0\n", &ctx()));
        assert!(!cond.evaluate("image: docker.io/acme/app:1.0\n", &ctx()));
        // Non-string values never match
        assert!(!cond.evaluate("image: 42\n", &ctx()));
        assert!(!cond.evaluate("other: x\n", &ctx()));
    }

    #[test]
    fn test_value_matches_invalid_regex_is_false() {
        let cond = Condition::ValueMatches {
            key: "image".into(),
            pattern: "(".into(),
        };
        assert!(!cond.evaluate("image: x\n", &ctx()));
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Chart.yaml"), "name: x\n").unwrap();

        let present = Condition::FileExists {
            path: Some("Chart.yaml".into()),
        };
        let missing = Condition::FileExists {
            path: Some("values.yaml".into()),
        };
        let with_base = ctx().with_base_dir(dir.path());

        assert!(present.evaluate("", &with_base));
        assert!(!missing.evaluate("", &with_base));
        assert!(!present.evaluate("", &ctx()));
        assert!(Condition::FileExists { path: None }.evaluate("", &ctx()));
    }

    #[test]
    fn test_unknown_kind_deserializes_and_is_false() {
        let cond: Condition = serde_yaml::from_str("type: moon_phase\nphase: full\n").unwrap();
        assert_eq!(cond, Condition::Unknown);
        assert!(!cond.evaluate("a: 1\n", &ctx()));
    }

    #[test]
    fn test_kebab_case_kinds() {
        let cond: Condition = serde_yaml::from_str("type: key-exists\npath: a.b\n").unwrap();
        assert_eq!(cond, key_exists("a.b"));
    }
}
