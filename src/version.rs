//! Version comparison for version-gated overwrites

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A `major[.minor[.patch]]` version; missing components are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// Parse a version string, accepting a single leading `v`/`V`.
    ///
    /// Returns `None` for anything that is not one to three dot-separated
    /// runs of digits (`1.2.3-rc1`, `latest`, `1..2` are all rejected).
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let bare = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let mut parts = [0u64; 3];
        let mut count = 0;
        for piece in bare.split('.') {
            if count == 3 || piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            parts[count] = piece.parse().ok()?;
            count += 1;
        }

        Some(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compare two version strings.
///
/// `None` means at least one side is not comparable; callers treat that as
/// "do not update".
pub fn compare(a: &str, b: &str) -> Option<Ordering> {
    Some(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// Policy deciding whether a version-bearing value may be overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStrategy {
    /// Always overwrite
    #[default]
    Always,
    /// Never overwrite
    Never,
    /// Overwrite only if the candidate is strictly newer
    #[serde(alias = "greater_than")]
    ReplaceIfNewer,
    /// Overwrite if the candidate is newer or the same version
    #[serde(alias = "greater_or_equal")]
    ReplaceIfNewerOrEqual,
}

impl VersionStrategy {
    /// Whether `candidate` may replace `current` under this strategy
    pub fn allows(self, current: &str, candidate: &str) -> bool {
        match self {
            VersionStrategy::Always => true,
            VersionStrategy::Never => false,
            VersionStrategy::ReplaceIfNewer => {
                matches!(compare(candidate, current), Some(Ordering::Greater))
            }
            VersionStrategy::ReplaceIfNewerOrEqual => matches!(
                compare(candidate, current),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}
