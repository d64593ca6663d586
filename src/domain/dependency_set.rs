//! Name-keyed collection of merged dependencies

use super::{Dependency, Requirement};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
struct Entry {
    combined: Dependency,
    versions: Vec<Dependency>,
}

/// Dependencies keyed by name.
///
/// Adding a dependency whose name is already present merges it into the
/// existing entry: requirements are unioned and the first known version
/// wins. Each distinct version is also kept separately for ecosystems whose
/// lockfiles can hold several versions of one package.
#[derive(Debug, Clone)]
pub struct DependencySet {
    case_sensitive: bool,
    entries: IndexMap<String, Entry>,
}

impl Default for DependencySet {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencySet {
    /// Case-insensitive set
    pub fn new() -> Self {
        Self {
            case_sensitive: false,
            entries: IndexMap::new(),
        }
    }

    /// Set that treats `Foo` and `foo` as distinct
    pub fn case_sensitive() -> Self {
        Self {
            case_sensitive: true,
            entries: IndexMap::new(),
        }
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Add a dependency, merging with any existing entry of the same name
    pub fn insert(&mut self, dependency: Dependency) {
        let key = self.key(&dependency.name);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.combined = merge(&entry.combined, &dependency);
                match entry
                    .versions
                    .iter_mut()
                    .find(|d| d.version == dependency.version)
                {
                    Some(existing) => *existing = merge(existing, &dependency),
                    None => entry.versions.push(dependency),
                }
            }
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        combined: dependency.clone(),
                        versions: vec![dependency],
                    },
                );
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, dependency: Dependency) -> Self {
        self.insert(dependency);
        self
    }

    /// Merge every dependency of `other` into this set
    pub fn combine(mut self, other: DependencySet) -> Self {
        for entry in other.entries.into_values() {
            for dependency in entry.versions {
                self.insert(dependency);
            }
        }
        self
    }

    /// Merged dependency for `name`
    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.get(&self.key(name)).map(|e| &e.combined)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&self.key(name))
    }

    /// One merged dependency per distinct version of `name`
    pub fn all_versions_for_name(&self, name: &str) -> &[Dependency] {
        self.entries
            .get(&self.key(name))
            .map(|e| e.versions.as_slice())
            .unwrap_or(&[])
    }

    /// Merged dependencies in insertion order
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.values().map(|e| &e.combined)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Dependency> {
        self.entries.into_values().map(|e| e.combined).collect()
    }
}

impl Extend<Dependency> for DependencySet {
    fn extend<T: IntoIterator<Item = Dependency>>(&mut self, iter: T) {
        for dependency in iter {
            self.insert(dependency);
        }
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        let mut set = DependencySet::new();
        set.extend(iter);
        set
    }
}

fn union_requirements(existing: &[Requirement], incoming: &[Requirement]) -> Vec<Requirement> {
    let mut merged = existing.to_vec();
    for req in incoming {
        if !merged.contains(req) {
            merged.push(req.clone());
        }
    }
    merged
}

fn merge(existing: &Dependency, incoming: &Dependency) -> Dependency {
    let previous_requirements = match (
        &existing.previous_requirements,
        &incoming.previous_requirements,
    ) {
        (Some(a), Some(b)) => Some(union_requirements(a, b)),
        (a, b) => a.clone().or_else(|| b.clone()),
    };

    let subdependency_metadata = match (
        &existing.subdependency_metadata,
        &incoming.subdependency_metadata,
    ) {
        (Some(a), Some(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().filter(|m| !a.contains(m)).cloned());
            Some(merged)
        }
        (a, b) => a.clone().or_else(|| b.clone()),
    };

    Dependency {
        name: existing.name.clone(),
        version: existing.version.clone().or_else(|| incoming.version.clone()),
        previous_version: existing
            .previous_version
            .clone()
            .or_else(|| incoming.previous_version.clone()),
        requirements: union_requirements(&existing.requirements, &incoming.requirements),
        previous_requirements,
        package_manager: existing.package_manager.clone(),
        subdependency_metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dep(name: &str, version: Option<&str>, groups: &[&str]) -> Dependency {
        Dependency::new(
            name,
            version,
            vec![Requirement::new(Some("~> 1.0"), "Gemfile").with_groups(groups.iter().copied())],
            "bundler",
        )
    }

    #[test]
    fn test_merge_unions_groups() {
        let set = DependencySet::new()
            .with(dep("foo", Some("1.0.0"), &["test"]))
            .with(dep("foo", Some("1.0.0"), &["runtime"]));

        assert_eq!(set.len(), 1);
        let foo = set.get("foo").unwrap();
        assert_eq!(foo.requirements.len(), 2);
        assert_eq!(foo.groups(), vec!["test", "runtime"]);
    }

    #[test]
    fn test_identical_requirements_not_duplicated() {
        let set = DependencySet::new()
            .with(dep("foo", None, &["test"]))
            .with(dep("foo", None, &["test"]));
        assert_eq!(set.get("foo").unwrap().requirements.len(), 1);
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let set = DependencySet::new()
            .with(dep("Rails", Some("7.0.0"), &[]))
            .with(dep("rails", None, &["runtime"]));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("RAILS").unwrap().name, "Rails");

        let sensitive = DependencySet::case_sensitive()
            .with(dep("Rails", None, &[]))
            .with(dep("rails", None, &[]));
        assert_eq!(sensitive.len(), 2);
    }

    #[test]
    fn test_first_version_wins_and_versions_kept() {
        let set = DependencySet::new()
            .with(dep("lodash", None, &[]))
            .with(dep("lodash", Some("4.17.21"), &[]))
            .with(dep("lodash", Some("3.10.1"), &[]));

        assert_eq!(set.get("lodash").unwrap().version.as_deref(), Some("4.17.21"));
        let versions: Vec<_> = set
            .all_versions_for_name("lodash")
            .iter()
            .map(|d| d.version.clone())
            .collect();
        assert_eq!(
            versions,
            vec![None, Some("4.17.21".to_string()), Some("3.10.1".to_string())]
        );
        assert!(set.all_versions_for_name("missing").is_empty());
    }

    #[test]
    fn test_subdependency_metadata_merged() {
        let a = Dependency::new("x", Some("1.0.0"), vec![], "npm")
            .with_subdependency_metadata(vec![json!({"production": false})]);
        let b = Dependency::new("x", Some("1.0.0"), vec![], "npm")
            .with_subdependency_metadata(vec![json!({"production": true})]);
        let set = DependencySet::new().with(a).with(b);
        let merged = set.get("x").unwrap();
        assert_eq!(merged.subdependency_metadata.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_combine_preserves_order() {
        let left: DependencySet = vec![dep("a", None, &[]), dep("b", None, &[])]
            .into_iter()
            .collect();
        let right = DependencySet::new()
            .with(dep("c", None, &[]))
            .with(dep("a", None, &["test"]));
        let combined = left.combine(right);
        let names: Vec<_> = combined.dependencies().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(combined.get("a").unwrap().requirements.len(), 2);
    }
}
