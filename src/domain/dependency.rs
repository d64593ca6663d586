//! Dependency information structures

use super::Requirement;
use crate::ecosystem::Ecosystem;
use crate::error::ConfigError;
use crate::version::{Version, VersionScheme};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named package reference plus its version and constraint information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name, namespaced as the ecosystem writes it
    pub name: String,
    /// Resolved version (usually from a lockfile)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Version before an update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<String>,
    /// Constraint occurrences, in file order
    pub requirements: Vec<Requirement>,
    /// Requirements before an update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_requirements: Option<Vec<Requirement>>,
    /// Ecosystem key this dependency belongs to
    pub package_manager: String,
    /// Lockfile metadata for sub-dependencies (e.g. `{"production": false}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdependency_metadata: Option<Vec<serde_json::Value>>,
}

impl Dependency {
    /// Creates a new dependency
    pub fn new(
        name: impl Into<String>,
        version: Option<&str>,
        requirements: Vec<Requirement>,
        package_manager: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
            previous_version: None,
            requirements,
            previous_requirements: None,
            package_manager: package_manager.into(),
            subdependency_metadata: None,
        }
    }

    /// Sets sub-dependency metadata (builder pattern)
    pub fn with_subdependency_metadata(mut self, metadata: Vec<serde_json::Value>) -> Self {
        self.subdependency_metadata = Some(metadata);
        self
    }

    /// The same dependency moved to `version` with `requirements`, keeping the
    /// current values as the previous ones
    pub fn updated_to(&self, version: Option<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            name: self.name.clone(),
            version,
            previous_version: self.version.clone(),
            requirements,
            previous_requirements: Some(self.requirements.clone()),
            package_manager: self.package_manager.clone(),
            subdependency_metadata: self.subdependency_metadata.clone(),
        }
    }

    /// Declared directly in a manifest rather than pulled in transitively
    pub fn top_level(&self) -> bool {
        !self.requirements.is_empty()
    }

    /// All groups across requirements, deduplicated in order
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for group in self.requirements.iter().flat_map(|r| r.groups.iter()) {
            if !groups.contains(&group.as_str()) {
                groups.push(group);
            }
        }
        groups
    }

    /// Whether the dependency ships to production.
    ///
    /// Top-level dependencies ask the ecosystem's predicate. Sub-dependencies
    /// count as production unless every metadata entry says otherwise.
    pub fn production(&self, ecosystem: &Ecosystem) -> bool {
        if self.top_level() {
            let groups: Vec<String> = self.groups().into_iter().map(str::to_string).collect();
            return ecosystem.is_production(&groups);
        }

        match &self.subdependency_metadata {
            Some(entries) if !entries.is_empty() => entries
                .iter()
                .any(|m| m.get("production").and_then(|p| p.as_bool()) != Some(false)),
            _ => true,
        }
    }

    /// Name used in human-facing output
    pub fn display_name(&self, ecosystem: &Ecosystem) -> String {
        ecosystem
            .display_name_for(self)
            .unwrap_or_else(|| self.name.clone())
    }

    /// True when an update changed the requirements
    pub fn requirements_changed(&self) -> bool {
        matches!(&self.previous_requirements, Some(prev) if *prev != self.requirements)
    }

    /// Parse the current version under `scheme`
    pub fn version_parsed(&self, scheme: VersionScheme) -> Result<Option<Version>, ConfigError> {
        self.version.as_deref().map(|v| scheme.parse(v)).transpose()
    }

    /// Parse the previous version under `scheme`
    pub fn previous_version_parsed(
        &self,
        scheme: VersionScheme,
    ) -> Result<Option<Version>, ConfigError> {
        self.previous_version
            .as_deref()
            .map(|v| scheme.parse(v))
            .transpose()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{} [{}]", self.name, version, self.package_manager),
            None => write!(f, "{} [{}]", self.name, self.package_manager),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirement(groups: &[&str]) -> Requirement {
        Requirement::new(Some("^1.2.3"), "package.json").with_groups(groups.iter().copied())
    }

    #[test]
    fn test_dependency_new() {
        let dep = Dependency::new("lodash", Some("1.2.3"), vec![requirement(&[])], "npm");
        assert_eq!(dep.name, "lodash");
        assert_eq!(dep.version.as_deref(), Some("1.2.3"));
        assert!(dep.top_level());
        assert!(!dep.requirements_changed());
    }

    #[test]
    fn test_groups_deduplicated() {
        let dep = Dependency::new(
            "rake",
            None,
            vec![requirement(&["dev", "test"]), requirement(&["test"])],
            "bundler",
        );
        assert_eq!(dep.groups(), vec!["dev", "test"]);
    }

    #[test]
    fn test_updated_to_keeps_previous() {
        let dep = Dependency::new("lodash", Some("1.2.3"), vec![requirement(&[])], "npm");
        let new_req = Requirement::new(Some("^1.5.0"), "package.json");
        let updated = dep.updated_to(Some("1.5.0".into()), vec![new_req]);
        assert_eq!(updated.previous_version.as_deref(), Some("1.2.3"));
        assert!(updated.requirements_changed());
    }

    #[test]
    fn test_version_parsed() {
        let dep = Dependency::new("a", Some("1.10.0"), vec![], "npm");
        let parsed = dep.version_parsed(VersionScheme::Semantic).unwrap().unwrap();
        assert!(parsed > VersionScheme::Semantic.parse("1.2.0").unwrap());

        let bad = Dependency::new("a", Some("one point two"), vec![], "npm");
        assert!(bad.version_parsed(VersionScheme::Semantic).is_err());
    }

    #[test]
    fn test_dependency_display() {
        let dep = Dependency::new("lodash", Some("1.2.3"), vec![], "npm");
        assert_eq!(format!("{}", dep), "lodash@1.2.3 [npm]");
        let unversioned = Dependency::new("rails", None, vec![], "bundler");
        assert_eq!(format!("{}", unversioned), "rails [bundler]");
    }

    #[test]
    fn test_serde_skips_empty_fields() {
        let dep = Dependency::new("a", None, vec![], "npm")
            .with_subdependency_metadata(vec![json!({"production": false})]);
        let value = serde_json::to_value(&dep).unwrap();
        assert!(value.get("version").is_none());
        assert_eq!(value["subdependency_metadata"][0]["production"], false);
    }
}
