//! Audit records produced by actions

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// One field mutation made by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Rule that owns the action
    pub rule: String,
    /// Action kind, e.g. `replace_value`
    pub action: &'static str,
    /// Dotted key path; `None` for raw-text actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub description: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.rule)?;
        if let Some(key) = &self.key {
            write!(f, "{}: ", key)?;
        }
        match (&self.old_value, &self.new_value) {
            (Some(old), Some(new)) => write!(f, "{} -> {}", old, new),
            (None, Some(new)) => write!(f, "(unset) -> {}", new),
            _ => f.write_str(&self.description),
        }
    }
}

/// Render changes for a pull-request description.
///
/// Files without changes are left out; returns an empty string when nothing
/// changed at all.
pub fn render_summary<'a, I, P>(files: I) -> String
where
    I: IntoIterator<Item = (P, &'a [Change])>,
    P: AsRef<Path>,
{
    let mut out = String::new();
    for (path, changes) in files {
        if changes.is_empty() {
            continue;
        }
        out.push_str(&format!("- `{}`\n", path.as_ref().display()));
        for change in changes {
            out.push_str(&format!("  - {}\n", change.description));
        }
    }
    out
}
