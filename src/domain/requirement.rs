//! Requirement: one constraint occurrence in one file

use crate::error::ConfigError;
use crate::version::{Constraint, Operator, VersionScheme};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a requirement's code comes from when it is not the default registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A git repository
    Git,
    /// A local path
    Path,
    /// An alternative package registry
    Registry,
}

/// Git/path/registry descriptor attached to a requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementSource {
    /// Source type
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Repository or registry URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Git branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Git tag or commit
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Local path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RequirementSource {
    /// A git source at `url`
    pub fn git(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Git,
            url: Some(url.into()),
            branch: None,
            reference: None,
            path: None,
        }
    }

    /// A local path source
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Path,
            url: None,
            branch: None,
            reference: None,
            path: Some(path.into()),
        }
    }

    /// Sets the git branch (builder pattern)
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the git ref (builder pattern)
    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A single constraint occurrence tied to a file and group set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Constraint text in the ecosystem's grammar; None for unconstrained
    pub requirement: Option<String>,
    /// Name of the fetched file that declares it
    pub file: String,
    /// Groups such as "dependencies", "test", "runtime"
    pub groups: Vec<String>,
    /// Optional non-registry source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RequirementSource>,
}

impl Requirement {
    /// Creates a requirement with no groups and no source
    pub fn new(requirement: Option<&str>, file: impl Into<String>) -> Self {
        Self {
            requirement: requirement.map(str::to_string),
            file: file.into(),
            groups: Vec::new(),
            source: None,
        }
    }

    /// Sets the groups (builder pattern)
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the source (builder pattern)
    pub fn with_source(mut self, source: RequirementSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Same requirement with a different constraint string
    pub fn with_requirement(&self, requirement: Option<String>) -> Self {
        Self {
            requirement,
            ..self.clone()
        }
    }

    /// Parse the constraint under `scheme`, reading bare versions as `default_op`
    pub fn constraint(
        &self,
        scheme: VersionScheme,
        default_op: Operator,
    ) -> Result<Option<Constraint>, ConfigError> {
        self.requirement
            .as_deref()
            .map(|r| Constraint::parse_with_default(r, scheme, default_op))
            .transpose()
    }

    /// True when the requirement comes from git
    pub fn is_git(&self) -> bool {
        matches!(&self.source, Some(s) if s.kind == SourceKind::Git)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.requirement.as_deref().unwrap_or("*"),
            self.file
        )
    }
}
