//! Glob matching of relative file paths against rule patterns

use glob::{MatchOptions, Pattern};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};

// Per-thread cache of compiled globs.
// Capped at 1000 entries; cleared entirely when the cap is exceeded.
const CACHE_MAX_ENTRIES: usize = 1000;

std::thread_local! {
    static GLOB_CACHE: RefCell<HashMap<String, Pattern>> = RefCell::new(HashMap::new());
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// True if any pattern matches `path`.
///
/// Patterns containing `/` are matched against the whole relative path,
/// others against the base name only.
pub fn matches(path: &Path, patterns: &[String]) -> bool {
    let full = path.to_string_lossy().replace('\\', "/");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| full.clone());

    patterns.iter().any(|pattern| {
        let subject = if pattern.contains('/') { &full } else { &name };
        match matches_one(subject, pattern) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Ignoring pattern: {}", e);
                false
            }
        }
    })
}

fn matches_one(subject: &str, pattern: &str) -> Result<bool> {
    GLOB_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if cache.len() >= CACHE_MAX_ENTRIES && !cache.contains_key(pattern) {
            cache.clear();
        }
        let compiled = match cache.get(pattern) {
            Some(p) => p.clone(),
            None => {
                let p = Pattern::new(pattern).map_err(|source| Error::InvalidGlob {
                    pattern: pattern.to_string(),
                    source,
                })?;
                cache.insert(pattern.to_string(), p.clone());
                p
            }
        };
        Ok(compiled.matches_with(subject, MATCH_OPTIONS))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extension_glob() {
        let p = pats(&["*.yaml"]);
        assert!(matches(Path::new("config.yaml"), &p));
        assert!(matches(Path::new("deploy/config.yaml"), &p));
        assert!(!matches(Path::new("config.json"), &p));
    }

    #[test]
    fn test_any_pattern_matches() {
        let p = pats(&["*.json", "docker-compose.y*ml", "values-?.yaml"]);
        assert!(matches(Path::new("docker-compose.yml"), &p));
        assert!(matches(Path::new("docker-compose.yaml"), &p));
        assert!(matches(Path::new("package.json"), &p));
        assert!(matches(Path::new("values-1.yaml"), &p));
        assert!(!matches(Path::new("values-12.yaml"), &p));
        assert!(!matches(Path::new("Dockerfile"), &p));
        assert!(!matches(Path::new("Dockerfile"), &[]));
    }

    #[test]
    fn test_directory_patterns_use_full_path() {
        let p = pats(&[".github/**/*.yml"]);
        assert!(matches(Path::new(".github/workflows/ci.yml"), &p));
        assert!(!matches(Path::new("ci.yml"), &p));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let p = pats(&["[unclosed"]);
        assert!(!matches(Path::new("[unclosed"), &p));
    }
}
