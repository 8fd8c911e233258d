//! Per-file transformation context

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::template::Variables;

/// Ambient values for one invocation of the engine on one file
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    tag: String,
    extra: IndexMap<String, String>,
    dry_run: bool,
    base_dir: Option<PathBuf>,
}

impl TransformContext {
    /// Create a context for the given release tag (e.g. `v1.4.5`)
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Add a caller-supplied template variable
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Directory that relative `file_exists` paths are resolved against
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The tag with a single leading `v`/`V` removed
    pub fn tag_without_v(&self) -> &str {
        self.tag
            .strip_prefix('v')
            .or_else(|| self.tag.strip_prefix('V'))
            .unwrap_or(&self.tag)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Template variables: built-ins first, then caller extras (which win)
    pub fn variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("tag".into(), self.tag.clone());
        vars.insert("tag_without_v".into(), self.tag_without_v().to_string());
        vars.insert("version".into(), self.tag_without_v().to_string());
        vars.insert(
            "date".into(),
            chrono::Local::now().format("%Y-%m-%d").to_string(),
        );
        for (name, value) in &self.extra {
            vars.insert(name.clone(), value.clone());
        }
        vars
    }
}
