//! Version and constraint model shared by every ecosystem
//!
//! Each ecosystem declares one [`VersionScheme`]. Versions are always parsed
//! and compared through that scheme, never as plain strings:
//! - Semantic: dotted numeric versions (`1.2.0 < 1.10.0`)
//! - Calendar: date-based versions (`2024.01.15`)
//! - GitRef: commit SHAs, unorderable and treated as newer than anything else
//! - ChannelDate: toolchain channels (`stable`, `nightly-2023-12-25`)
//! - Ordinal: a single build counter

mod calendar;
mod channel;
mod constraint;
mod semantic;

pub use calendar::CalendarVersion;
pub use channel::{Channel, ChannelVersion};
pub use constraint::{Comparator, Constraint, Operator, RequirementsUpdateStrategy};
pub use semantic::SemanticVersion;

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,40}$").unwrap());
static FULL_SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// The versioning grammar an ecosystem uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionScheme {
    /// Dotted numeric versions with optional pre-release tags
    Semantic,
    /// Year/month based versions
    Calendar,
    /// Git commit references only
    GitRef,
    /// Toolchain channel with optional date
    ChannelDate,
    /// A single integer
    Ordinal,
}

impl VersionScheme {
    /// Human-readable scheme name
    pub fn name(&self) -> &'static str {
        match self {
            VersionScheme::Semantic => "semantic",
            VersionScheme::Calendar => "calendar",
            VersionScheme::GitRef => "git-ref",
            VersionScheme::ChannelDate => "channel-date",
            VersionScheme::Ordinal => "ordinal",
        }
    }

    /// Parse `input` under this scheme.
    ///
    /// Every scheme accepts commit SHAs as a fallback, because git-sourced
    /// dependencies exist in nearly every ecosystem.
    pub fn parse(&self, input: &str) -> Result<Version, ConfigError> {
        let trimmed = input.trim();
        if let Some(sha) = GitRef::parse(trimmed).filter(GitRef::has_hex_letter) {
            return Ok(Version::GitRef(sha));
        }
        let parsed = match self {
            VersionScheme::Semantic => SemanticVersion::parse(trimmed).map(Version::Semantic),
            VersionScheme::Calendar => CalendarVersion::parse(trimmed).map(Version::Calendar),
            VersionScheme::GitRef => None,
            VersionScheme::ChannelDate => ChannelVersion::parse(trimmed)
                .map(Version::ChannelDate)
                // Numbered toolchains (`1.72.0`) live alongside channels.
                .or_else(|| SemanticVersion::parse(trimmed).map(Version::Semantic)),
            VersionScheme::Ordinal => trimmed.parse::<u64>().ok().map(Version::Ordinal),
        };

        parsed
            .or_else(|| GitRef::parse(trimmed).map(Version::GitRef))
            .ok_or_else(|| ConfigError::invalid_version(self.name(), input))
    }

    /// True when `input` is inside this scheme's grammar
    pub fn is_correct(&self, input: &str) -> bool {
        self.parse(input).is_ok()
    }
}

impl fmt::Display for VersionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A git commit SHA (abbreviated or full); equality and order are by text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GitRef(String);

impl GitRef {
    /// Parse 7 to 40 hex characters
    pub fn parse(input: &str) -> Option<Self> {
        SHA_RE
            .is_match(input)
            .then(|| GitRef(input.to_ascii_lowercase()))
    }

    /// The lowercase SHA text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn has_hex_letter(&self) -> bool {
        self.0.bytes().any(|b| b.is_ascii_alphabetic())
    }

    /// True for a full 40 character SHA
    pub fn is_full(&self) -> bool {
        FULL_SHA_RE.is_match(&self.0)
    }

    /// Abbreviated SHAs match any SHA they prefix
    pub fn matches(&self, other: &GitRef) -> bool {
        self.0.starts_with(&other.0) || other.0.starts_with(&self.0)
    }
}

/// A version value of one of the supported schemes
#[derive(Debug, Clone)]
pub enum Version {
    /// Dotted numeric version
    Semantic(SemanticVersion),
    /// Calendar version
    Calendar(CalendarVersion),
    /// Git commit
    GitRef(GitRef),
    /// Toolchain channel
    ChannelDate(ChannelVersion),
    /// Integer counter
    Ordinal(u64),
}

impl Version {
    /// True for pre-release semantic versions
    pub fn is_prerelease(&self) -> bool {
        matches!(self, Version::Semantic(v) if v.is_prerelease())
    }

    /// True for git commit versions
    pub fn is_git_ref(&self) -> bool {
        matches!(self, Version::GitRef(_))
    }

    /// Equal, or both SHAs with one abbreviating the other
    pub fn same_revision(&self, other: &Version) -> bool {
        match (self, other) {
            (Version::GitRef(a), Version::GitRef(b)) => a.matches(b),
            _ => self == other,
        }
    }

    /// Render with the given number of release segments where the scheme
    /// has segments; other schemes render in full
    pub fn with_precision(&self, precision: usize) -> String {
        match self {
            Version::Semantic(v) => v.with_precision(precision),
            other => other.to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Version::Ordinal(_) => 0,
            Version::ChannelDate(_) => 1,
            Version::Calendar(_) => 2,
            Version::Semantic(_) => 3,
            Version::GitRef(_) => 4,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Semantic(a), Version::Semantic(b)) => a.cmp(b),
            (Version::Calendar(a), Version::Calendar(b)) => a.cmp(b),
            (Version::ChannelDate(a), Version::ChannelDate(b)) => a.cmp(b),
            (Version::Ordinal(a), Version::Ordinal(b)) => a.cmp(b),
            // SHAs have no real order among themselves; text keeps it total.
            (Version::GitRef(a), Version::GitRef(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semantic(v) => write!(f, "{}", v),
            Version::Calendar(v) => write!(f, "{}", v),
            Version::GitRef(v) => write!(f, "{}", v.0),
            Version::ChannelDate(v) => write!(f, "{}", v),
            Version::Ordinal(v) => write!(f, "{}", v),
        }
    }
}
