//! Version constraints: parsing, satisfaction and style-preserving rewrites
//!
//! The grammar covers the common denominator of package-manager constraint
//! languages:
//! - alternatives separated by `||`
//! - comparators separated by `,` or whitespace
//! - operators `=`, `==`, `!=`, `>`, `>=`, `<`, `<=`, `^`, `~`, `~>`, `~=`
//! - wildcards (`1.2.*`, `1.x`, `*`)
//!
//! Rewrites only ever touch the version text of a comparator, so operators,
//! spacing and separators survive an update byte for byte.

use super::{Version, VersionScheme};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// How requirement strings are changed when a dependency is updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementsUpdateStrategy {
    /// Always move constraints to the new version
    #[default]
    BumpVersions,
    /// Move constraints only when they exclude the new version
    BumpVersionsIfNecessary,
    /// Keep the old lower bound and widen the range to admit the new version
    WidenRanges,
    /// Never touch manifests; only lockfiles change
    LockfileOnly,
}

/// Comparison operator of a single comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`, `==` or a bare version in exact-default ecosystems
    Exact,
    /// `!=`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
    /// `^`: compatible up to the first non-zero segment
    Caret,
    /// `~`: compatible within the minor version
    Tilde,
    /// `~>`: compatible up to the second-to-last written segment
    Pessimistic,
    /// `~=`: PEP 440 compatible release
    Compatible,
    /// `1.2.*`, `1.x`, `==1.2.*`
    Wildcard,
    /// `*`
    Any,
}

impl Operator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" | "==" => Some(Operator::Exact),
            "!=" => Some(Operator::NotEqual),
            ">" => Some(Operator::Greater),
            ">=" => Some(Operator::GreaterEq),
            "<" => Some(Operator::Less),
            "<=" => Some(Operator::LessEq),
            "^" => Some(Operator::Caret),
            "~" => Some(Operator::Tilde),
            "~>" => Some(Operator::Pessimistic),
            "~=" => Some(Operator::Compatible),
            _ => None,
        }
    }

    /// Symbol used when a new alternative has to be written out
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Exact | Operator::Wildcard | Operator::Any => "",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
            Operator::Caret => "^",
            Operator::Tilde => "~",
            Operator::Pessimistic => "~> ",
            Operator::Compatible => "~=",
        }
    }

    fn is_upper_bound(&self) -> bool {
        matches!(self, Operator::Less | Operator::LessEq)
    }
}

/// One `operator version` pair inside a constraint
#[derive(Debug, Clone)]
pub struct Comparator {
    op: Operator,
    version: Option<Version>,
    version_text: String,
    span: Range<usize>,
}

impl Comparator {
    /// The comparison operator
    pub fn op(&self) -> Operator {
        self.op
    }

    /// The parsed version, absent for wildcards
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// The version text exactly as written
    pub fn version_text(&self) -> &str {
        &self.version_text
    }

    fn precision(&self) -> usize {
        match &self.version {
            Some(Version::Semantic(v)) => v.segments().len(),
            _ => self.wildcard_prefix().len(),
        }
    }

    fn is_prefixed(&self) -> bool {
        self.version_text.starts_with(['v', 'V'])
    }

    fn wildcard_prefix(&self) -> Vec<&str> {
        self.version_text
            .trim_start_matches(['v', 'V'])
            .split('.')
            .take_while(|s| !is_wildcard_token(s))
            .collect()
    }

    fn wildcard_token(&self) -> &str {
        self.version_text
            .split('.')
            .find(|s| is_wildcard_token(s))
            .unwrap_or("*")
    }

    /// Does `candidate` satisfy this comparator?
    pub fn matches(&self, candidate: &Version) -> bool {
        let Some(bound) = &self.version else {
            return match self.op {
                Operator::Any => true,
                Operator::NotEqual => !self.matches_wildcard(candidate),
                _ => self.matches_wildcard(candidate),
            };
        };

        match self.op {
            Operator::Exact => candidate.same_revision(bound),
            Operator::NotEqual => !candidate.same_revision(bound),
            Operator::Greater => candidate > bound,
            Operator::GreaterEq => candidate >= bound,
            Operator::Less => candidate < bound,
            Operator::LessEq => candidate <= bound,
            Operator::Caret | Operator::Tilde | Operator::Pessimistic | Operator::Compatible => {
                match self.exclusive_upper(bound) {
                    Some(upper) => candidate >= bound && *candidate < upper,
                    // Schemes without segments only get the lower bound.
                    None => candidate >= bound,
                }
            }
            Operator::Wildcard | Operator::Any => true,
        }
    }

    fn matches_wildcard(&self, candidate: &Version) -> bool {
        let prefix = self.wildcard_prefix();
        match candidate {
            Version::Semantic(v) => prefix
                .iter()
                .enumerate()
                .all(|(i, p)| p.parse::<u64>().ok() == Some(v.segment(i))),
            other => {
                let text = other.to_string();
                let joined = prefix.join(".");
                text == joined || text.starts_with(&format!("{}.", joined))
            }
        }
    }

    fn exclusive_upper(&self, bound: &Version) -> Option<Version> {
        let Version::Semantic(v) = bound else {
            return None;
        };
        let written = v.segments().len();
        let index = match self.op {
            Operator::Caret => v
                .segments()
                .iter()
                .position(|s| *s != 0)
                .unwrap_or(written.saturating_sub(1)),
            Operator::Tilde => {
                if written >= 2 {
                    1
                } else {
                    0
                }
            }
            Operator::Pessimistic | Operator::Compatible => written.saturating_sub(2),
            _ => return None,
        };
        Some(Version::Semantic(v.bump_segment(index)))
    }

    fn render(&self, target: &Version, precision: usize) -> String {
        let body = target.with_precision(precision);
        let body = body.trim_start_matches(['v', 'V']);
        if self.is_prefixed() && matches!(target, Version::Semantic(_)) {
            format!("v{}", body)
        } else {
            body.to_string()
        }
    }

    /// Version text moving this comparator onto `target`
    fn bumped_text(&self, target: &Version) -> Option<String> {
        match self.op {
            Operator::Exact => Some(self.render(target, usize::MAX)),
            Operator::Caret | Operator::Tilde | Operator::Pessimistic | Operator::Compatible => {
                Some(self.render(target, self.precision()))
            }
            Operator::Wildcard => {
                let fixed = self.wildcard_prefix().len();
                let prefix = self.render(target, fixed.max(1));
                Some(format!("{}.{}", prefix, self.wildcard_token()))
            }
            Operator::GreaterEq | Operator::Greater if !self.matches(target) => {
                Some(self.render(target, usize::MAX))
            }
            Operator::Less | Operator::LessEq if !self.matches(target) => {
                Some(self.raised_upper_text(target))
            }
            _ => None,
        }
    }

    fn raised_upper_text(&self, target: &Version) -> String {
        match (self.op, target) {
            (Operator::Less, Version::Semantic(v)) => {
                let next = Version::Semantic(v.bump_segment(0));
                self.render(&next, self.precision())
            }
            _ => self.render(target, usize::MAX),
        }
    }
}

fn is_wildcard_token(token: &str) -> bool {
    matches!(token, "*" | "x" | "X")
}

/// A parsed constraint string
#[derive(Debug, Clone)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Vec<Comparator>>,
}

impl Constraint {
    /// Parse with bare versions read as exact matches
    pub fn parse(input: &str, scheme: VersionScheme) -> Result<Self, ConfigError> {
        Self::parse_with_default(input, scheme, Operator::Exact)
    }

    /// Parse with bare versions read as `default_op` (Cargo reads `1.2` as `^1.2`)
    pub fn parse_with_default(
        input: &str,
        scheme: VersionScheme,
        default_op: Operator,
    ) -> Result<Self, ConfigError> {
        let mut alternatives = Vec::new();
        let mut offset = 0;

        for part in input.split("||") {
            let comparators = parse_alternative(input, part, offset, scheme, default_op)?;
            if comparators.is_empty() {
                return Err(ConfigError::invalid_requirement(
                    input,
                    "empty alternative",
                ));
            }
            alternatives.push(comparators);
            offset += part.len() + 2;
        }

        Ok(Self {
            raw: input.to_string(),
            alternatives,
        })
    }

    /// The constraint text as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Comparators grouped by `||` alternative
    pub fn alternatives(&self) -> &[Vec<Comparator>] {
        &self.alternatives
    }

    /// Does `version` satisfy the constraint?
    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|alt| alt.iter().all(|c| c.matches(version)))
    }

    /// Highest lower bound written in the constraint
    pub fn minimum_version(&self) -> Option<&Version> {
        self.alternatives
            .iter()
            .flatten()
            .filter(|c| !c.op.is_upper_bound() && c.op != Operator::NotEqual)
            .filter_map(|c| c.version.as_ref())
            .max()
    }

    /// Rewrite every comparator to target `version`, keeping operators,
    /// prefixes and precision. Constraints with several alternatives are
    /// widened instead, so existing alternatives stay valid.
    pub fn bumped_to(&self, version: &Version) -> String {
        if self.alternatives.len() > 1 {
            return self.widened_to(version);
        }
        let edits = self.alternatives[0]
            .iter()
            .filter_map(|c| c.bumped_text(version).map(|t| (c.span.clone(), t)))
            .collect();
        self.apply_edits(edits)
    }

    /// Admit `version` while keeping the old lower bound.
    ///
    /// Already-satisfied constraints are returned unchanged. When only upper
    /// bounds are in the way they are raised; otherwise a new alternative
    /// is appended.
    pub fn widened_to(&self, version: &Version) -> String {
        if self.satisfied_by(version) {
            return self.raw.clone();
        }

        if self.alternatives.len() == 1 {
            let failing: Vec<&Comparator> = self.alternatives[0]
                .iter()
                .filter(|c| !c.matches(version))
                .collect();
            if failing.iter().all(|c| c.op.is_upper_bound()) {
                let edits = failing
                    .iter()
                    .map(|c| (c.span.clone(), c.raised_upper_text(version)))
                    .collect();
                return self.apply_edits(edits);
            }
        }

        let template = self
            .alternatives
            .iter()
            .flatten()
            .find(|c| !c.op.is_upper_bound() && c.op != Operator::NotEqual);
        let appended = match template {
            Some(c) if c.op == Operator::Wildcard => c.bumped_text(version).unwrap_or_default(),
            Some(c) => format!(
                "{}{}",
                c.op.symbol(),
                c.render(version, if c.op == Operator::Exact { usize::MAX } else { c.precision() })
            ),
            None => version.to_string(),
        };
        format!("{} || {}", self.raw.trim_end(), appended)
    }

    /// Apply `strategy` for a move to `version`
    pub fn updated_for(&self, version: &Version, strategy: RequirementsUpdateStrategy) -> String {
        match strategy {
            RequirementsUpdateStrategy::LockfileOnly => self.raw.clone(),
            RequirementsUpdateStrategy::WidenRanges => self.widened_to(version),
            RequirementsUpdateStrategy::BumpVersions => self.bumped_to(version),
            RequirementsUpdateStrategy::BumpVersionsIfNecessary => {
                if self.satisfied_by(version) {
                    self.raw.clone()
                } else {
                    self.bumped_to(version)
                }
            }
        }
    }

    fn apply_edits(&self, mut edits: Vec<(Range<usize>, String)>) -> String {
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut out = self.raw.clone();
        for (span, text) in edits {
            out.replace_range(span, &text);
        }
        out
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn parse_alternative(
    input: &str,
    part: &str,
    offset: usize,
    scheme: VersionScheme,
    default_op: Operator,
) -> Result<Vec<Comparator>, ConfigError> {
    let bytes = part.as_bytes();
    let mut comparators = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let op_start = i;
        while i < bytes.len() && matches!(bytes[i], b'=' | b'!' | b'<' | b'>' | b'^' | b'~') {
            i += 1;
        }
        let symbol = &part[op_start..i];

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let version_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b',' {
            i += 1;
        }
        let version_text = &part[version_start..i];

        if version_text.is_empty() {
            return Err(ConfigError::invalid_requirement(
                input,
                format!("operator '{}' has no version", symbol),
            ));
        }

        let explicit = if symbol.is_empty() {
            None
        } else {
            Some(Operator::from_symbol(symbol).ok_or_else(|| {
                ConfigError::invalid_requirement(input, format!("unknown operator '{}'", symbol))
            })?)
        };

        let (op, version) = if version_text.split('.').any(is_wildcard_token) {
            let whole = is_wildcard_token(version_text);
            match explicit {
                None | Some(Operator::Exact) if whole => (Operator::Any, None),
                None | Some(Operator::Exact) => (Operator::Wildcard, None),
                Some(Operator::NotEqual) if !whole => (Operator::NotEqual, None),
                Some(_) => {
                    return Err(ConfigError::invalid_requirement(
                        input,
                        format!("operator '{}' cannot take wildcard '{}'", symbol, version_text),
                    ))
                }
            }
        } else {
            let version = scheme.parse(version_text).map_err(|_| {
                ConfigError::invalid_requirement(
                    input,
                    format!("'{}' is not a valid {} version", version_text, scheme),
                )
            })?;
            (explicit.unwrap_or(default_op), Some(version))
        };

        comparators.push(Comparator {
            op,
            version,
            version_text: version_text.to_string(),
            span: offset + version_start..offset + i,
        });
    }

    Ok(comparators)
}
