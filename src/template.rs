//! Template expansion for rule-supplied values and replacements
//!
//! Two placeholder syntaxes are accepted, `{name}` and `{{name}}`. Unknown
//! placeholders are left as written. After substitution, a small set of pure
//! functions can be called inline:
//!
//! | Function             | Result                                   |
//! |----------------------|------------------------------------------|
//! | `strip_prefix(s, p)` | `s` without the leading `p`              |
//! | `strip_suffix(s, p)` | `s` without the trailing `p`             |
//! | `major(v)`           | major component of version `v`           |
//! | `minor(v)`           | minor component of version `v`           |
//! | `patch(v)`           | patch component of version `v`           |
//! | `lower(s)`           | lowercased `s`                           |
//! | `slug(s)`            | `s` reduced to `[a-z0-9._-]`             |
//!
//! Calls to any other name, or calls whose arguments don't fit, stay literal.
//! Substituted values and call results are opaque to call parsing, so text
//! coming from a variable is never itself evaluated.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::version::Version;

/// Named template variables, in insertion order
pub type Variables = IndexMap<String, String>;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("invalid placeholder regex")
});

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-z_][a-z0-9_]*)\(([^()]*)\)").expect("invalid call regex")
});

/// Stand-in for a substituted value while calls are evaluated
static SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("invalid slot regex"));

/// Upper bound on nested call evaluation passes
const MAX_CALL_PASSES: usize = 8;

/// Expand placeholders and inline functions in `template`
pub fn expand(template: &str, vars: &Variables) -> String {
    let mut slots = Vec::new();
    let marked = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            match vars.get(placeholder_name(caps)) {
                Some(value) => slot(&mut slots, value.clone()),
                None => caps[0].to_string(),
            }
        })
        .into_owned();
    let evaluated = evaluate_calls(&marked, &mut slots);
    fill_slots(&evaluated, &slots)
}

/// Replace `{name}` / `{{name}}` with their values, leaving unknown names alone
pub fn substitute(template: &str, vars: &Variables) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            vars.get(placeholder_name(caps))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn placeholder_name<'a>(caps: &Captures<'a>) -> &'a str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or("")
}

fn slot(slots: &mut Vec<String>, value: String) -> String {
    slots.push(value);
    format!("\u{E000}{}\u{E001}", slots.len() - 1)
}

fn fill_slots(input: &str, slots: &[String]) -> String {
    SLOT_RE
        .replace_all(input, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| slots.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn evaluate_calls(input: &str, slots: &mut Vec<String>) -> String {
    let mut current = input.to_string();
    // Innermost calls first; each pass peels one nesting level.
    for _ in 0..MAX_CALL_PASSES {
        let next = CALL_RE
            .replace_all(&current, |caps: &Captures| {
                let args: Vec<String> = split_args(&caps[2])
                    .iter()
                    .map(|arg| fill_slots(arg, slots))
                    .collect();
                match call(&caps[1], &args) {
                    Some(result) => slot(slots, result),
                    None => caps[0].to_string(),
                }
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn split_args(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',')
        .map(|arg| {
            let arg = arg.trim();
            arg.strip_prefix('"')
                .and_then(|a| a.strip_suffix('"'))
                .or_else(|| arg.strip_prefix('\'').and_then(|a| a.strip_suffix('\'')))
                .unwrap_or(arg)
                .to_string()
        })
        .collect()
}

fn call(name: &str, args: &[String]) -> Option<String> {
    match (name, args) {
        ("strip_prefix", [value, prefix]) => {
            Some(value.strip_prefix(prefix.as_str()).unwrap_or(value).to_string())
        }
        ("strip_suffix", [value, suffix]) => {
            Some(value.strip_suffix(suffix.as_str()).unwrap_or(value).to_string())
        }
        ("major", [v]) => Version::parse(v).map(|v| v.major.to_string()),
        ("minor", [v]) => Version::parse(v).map(|v| v.minor.to_string()),
        ("patch", [v]) => Version::parse(v).map(|v| v.patch.to_string()),
        ("lower", [value]) => Some(value.to_lowercase()),
        ("slug", [value]) => Some(slug(value)),
        _ => None,
    }
}

/// Lowercase and squash anything outside `[a-z0-9._-]` into single dashes
pub fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Variables {
        let mut v = Variables::new();
        v.insert("tag".into(), "v1.4.5".into());
        v.insert("tag_without_v".into(), "1.4.5".into());
        v.insert("version".into(), "1.4.5".into());
        v
    }

    #[test]
    fn test_both_placeholder_syntaxes() {
        assert_eq!(expand("{tag_without_v}", &vars()), "1.4.5");
        assert_eq!(expand("image:{{ version }}", &vars()), "image:1.4.5");
        assert_eq!(expand("{{tag}}-{tag}", &vars()), "v1.4.5-v1.4.5");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        assert_eq!(expand("{missing}/{tag}", &vars()), "{missing}/v1.4.5");
        // Regex quantifiers are not placeholders
        assert_eq!(expand(r"\d{2}", &vars()), r"\d{2}");
    }

    #[test]
    fn test_functions() {
        assert_eq!(expand("strip_prefix({tag}, v)", &vars()), "1.4.5");
        assert_eq!(expand("major({tag}).minor({tag})", &vars()), "1.4");
        assert_eq!(expand("major({tag}).x", &vars()), "1.x");
        assert_eq!(expand("patch(\"2.0\")", &vars()), "0");
        assert_eq!(expand("lower(RC-Build)", &vars()), "rc-build");
        assert_eq!(expand("slug(Feature/My Branch!)", &vars()), "feature-my-branch");
    }

    #[test]
    fn test_nested_functions() {
        let mut v = vars();
        v.insert("release".into(), "release-v3.2.1".into());
        assert_eq!(
            expand("minor(strip_prefix({release}, release-))", &v),
            "2"
        );
    }

    #[test]
    fn test_unknown_function_fails_open() {
        assert_eq!(expand("frobnicate({tag})", &vars()), "frobnicate(v1.4.5)");
        assert_eq!(expand("major(latest)", &vars()), "major(latest)");
    }

    #[test]
    fn test_variable_text_is_not_evaluated() {
        let mut v = vars();
        v.insert("name".into(), "lower(ABC)".into());
        v.insert("pair".into(), "A, B".into());
        assert_eq!(expand("{name}", &v), "lower(ABC)");
        assert_eq!(expand("lower({name})", &v), "lower(abc)");
        assert_eq!(expand("lower({pair})", &v), "a, b");
    }
}
