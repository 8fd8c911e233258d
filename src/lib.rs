//! Synckeep - rule-driven transformations for synced repository files
//!
//! When a directory sync is about to overwrite a target file, the file's
//! current content is offered to a [`RuleEngine`]. Rules pick files by glob,
//! check conditions against the parsed YAML/JSON document, and apply
//! version-aware actions, returning the new content and a list of
//! [`Change`] records for the pull-request description.
//!
//! ```
//! use std::path::Path;
//! use synckeep::{Action, Rule, RuleEngine, TransformContext, VersionStrategy};
//!
//! let rule = Rule::new(
//!     "artifact",
//!     vec!["*.yaml".into()],
//!     vec![Action::UpdateVersionInValue {
//!         key: "remote_artifact".into(),
//!         pattern: "{prefix}-{version}.{ext}".into(),
//!         version_source: Default::default(),
//!         strategy: Some(VersionStrategy::ReplaceIfNewer),
//!     }],
//! );
//! let engine = RuleEngine::new(vec![rule]);
//! let ctx = TransformContext::new("v1.4.5");
//!
//! let result = engine.process(Path::new("config.yaml"), "remote_artifact: app-1.0.0.zip\n", &ctx);
//! assert_eq!(result.content, "remote_artifact: app-1.4.5.zip\n");
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod pattern;
pub mod rules;
pub mod template;
pub mod version;

pub use config::Config;
pub use document::{Document, Format};
pub use error::{Error, Result};
pub use rules::{
    Action, Change, Condition, Rule, RuleEngine, RuleLoader, RuleSources, TransformContext,
    Transformation,
};
pub use version::VersionStrategy;

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("invalid env regex")
});

/// Expand a leading `~` and `$VAR` / `${VAR}` references in a path.
/// Unset variables are left as written.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    let home_expanded = match (&*raw, dirs::home_dir()) {
        ("~", Some(home)) => home.to_string_lossy().into_owned(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]).to_string_lossy().into_owned(),
        (p, _) => p.to_string(),
    };

    let expanded = ENV_RE.replace_all(&home_expanded, |caps: &Captures| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.as_ref())
}
