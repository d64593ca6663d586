//! Dotted numeric versions with optional pre-release and build metadata
//!
//! Accepts any number of numeric segments (`1`, `1.2`, `1.2.3.4`), an optional
//! leading `v`, a pre-release tag introduced by `-`, `.` or directly after the
//! last digit (`1.0.0-rc.1`, `1.0.0.beta1`, `1.0rc1`) and `+build` metadata.

use regex::Regex;
use semver::{BuildMetadata, Prerelease};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static SEMANTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<v>[vV])?(?P<nums>\d+(?:\.\d+)*)(?:[-.]?(?P<pre>[A-Za-z][0-9A-Za-z.-]*|-[0-9][0-9A-Za-z.-]*))?(?:\+(?P<build>[0-9A-Za-z.-]+))?$",
    )
    .unwrap()
});

/// A parsed dotted numeric version
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    segments: Vec<u64>,
    pre: Prerelease,
    build: BuildMetadata,
    prefixed: bool,
}

impl SemanticVersion {
    /// Parse a version string, returning None when it is outside the grammar
    pub fn parse(input: &str) -> Option<Self> {
        let caps = SEMANTIC_RE.captures(input.trim())?;

        let segments = caps["nums"]
            .split('.')
            .map(|s| s.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = match caps.name("pre") {
            Some(m) => {
                let raw = m.as_str().trim_start_matches('-');
                Prerelease::new(raw).ok()?
            }
            None => Prerelease::EMPTY,
        };

        let build = match caps.name("build") {
            Some(m) => BuildMetadata::new(m.as_str()).ok()?,
            None => BuildMetadata::EMPTY,
        };

        Some(Self {
            segments,
            pre,
            build,
            prefixed: caps.name("v").is_some(),
        })
    }

    /// Numeric release segments
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// True when a pre-release tag is present
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// True when written with a leading `v`
    pub fn is_prefixed(&self) -> bool {
        self.prefixed
    }

    /// Segment at `index`, with missing trailing segments read as zero
    pub fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }

    /// Render only the first `precision` release segments, without any `v`.
    ///
    /// Pre-release versions are always rendered in full, since dropping the
    /// tag would name a different release.
    pub fn with_precision(&self, precision: usize) -> String {
        if self.is_prerelease() || precision >= self.segments.len() {
            return self.render(self.segments.len(), false);
        }
        self.render(precision.max(1), false)
    }

    fn render(&self, precision: usize, with_prefix: bool) -> String {
        let mut out = String::new();
        if with_prefix && self.prefixed {
            out.push('v');
        }
        let nums = self.segments[..precision.min(self.segments.len())]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".");
        out.push_str(&nums);
        if precision >= self.segments.len() {
            if !self.pre.is_empty() {
                out.push('-');
                out.push_str(self.pre.as_str());
            }
            if !self.build.is_empty() {
                out.push('+');
                out.push_str(self.build.as_str());
            }
        }
        out
    }

    /// Next version after bumping the segment at `index` and zeroing the rest
    pub fn bump_segment(&self, index: usize) -> SemanticVersion {
        let len = self.segments.len().max(index + 1);
        let segments = (0..len)
            .map(|i| match i.cmp(&index) {
                Ordering::Less => self.segment(i),
                Ordering::Equal => self.segment(i).saturating_add(1),
                Ordering::Greater => 0,
            })
            .collect();
        SemanticVersion {
            segments,
            pre: Prerelease::EMPTY,
            build: BuildMetadata::EMPTY,
            prefixed: self.prefixed,
        }
    }

    fn cmp_release(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Build metadata never participates in precedence.
        self.cmp_release(other).then_with(|| {
            match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            }
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(self.segments.len(), true))
    }
}
