//! UPDATE stage: producing new file contents for updated dependencies

use crate::domain::{Dependency, DependencyFile};
use crate::error::{Result, UpdateError};
use async_trait::async_trait;
use tracing::debug;

/// Per-ecosystem manifest/lockfile rewriting
#[async_trait]
pub trait FileUpdater: Send + Sync {
    /// New snapshots of the files that change. Inputs are never modified.
    async fn updated_files(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<Vec<DependencyFile>>;
}

/// Runs a [`FileUpdater`] and enforces the shared update rules:
/// - every dependency carries its previous state
/// - at least one returned file differs from its input
/// - returned files were among the inputs
/// - a second run over the same inputs yields byte-identical output
pub struct FileUpdate<'a> {
    updater: &'a dyn FileUpdater,
    check_idempotence: bool,
}

impl<'a> FileUpdate<'a> {
    pub fn new(updater: &'a dyn FileUpdater) -> Self {
        Self {
            updater,
            check_idempotence: true,
        }
    }

    /// Skip the second run (builder pattern)
    pub fn without_idempotence_check(mut self) -> Self {
        self.check_idempotence = false;
        self
    }

    /// Changed files for `dependencies`
    pub async fn apply(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<Vec<DependencyFile>> {
        for dependency in dependencies {
            if dependency.previous_version.is_none() && dependency.previous_requirements.is_none() {
                return Err(UpdateError::InvalidDependency {
                    dependency: dependency.name.clone(),
                    message: "no previous version or requirements".to_string(),
                }
                .into());
            }
        }

        let produced = self.updater.updated_files(dependencies, files).await?;
        let changed = changed_files(&produced, files)?;

        if changed.is_empty() {
            return Err(UpdateError::NoChanges {
                dependency: names(dependencies),
            }
            .into());
        }

        if self.check_idempotence {
            let again = self.updater.updated_files(dependencies, files).await?;
            let again = changed_files(&again, files)?;
            for file in &changed {
                let repeat = again.iter().find(|f| f.path() == file.path());
                if repeat.map(DependencyFile::content) != Some(file.content()) {
                    return Err(UpdateError::NotIdempotent { file: file.path() }.into());
                }
            }
            if again.len() != changed.len() {
                return Err(UpdateError::NotIdempotent {
                    file: names_of(&again),
                }
                .into());
            }
        }

        debug!("Updated {} for {}", names_of(&changed), names(dependencies));
        Ok(changed)
    }
}

fn changed_files(
    produced: &[DependencyFile],
    originals: &[DependencyFile],
) -> Result<Vec<DependencyFile>, UpdateError> {
    let mut changed = Vec::new();
    for file in produced {
        let original = originals
            .iter()
            .find(|o| o.path() == file.path())
            .ok_or_else(|| UpdateError::UnexpectedFile { file: file.path() })?;
        if original.content() != file.content() || original.is_deleted() != file.is_deleted() {
            changed.push(file.clone());
        }
    }
    Ok(changed)
}

fn names(dependencies: &[Dependency]) -> String {
    dependencies
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn names_of(files: &[DependencyFile]) -> String {
    files
        .iter()
        .map(DependencyFile::path)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace the declaration `old` with `new` in `content`.
///
/// Fails when `old` is absent, so an updater can never silently report
/// success without touching the file.
pub fn replace_requirement(
    content: &str,
    file: &str,
    dependency: &str,
    old: &str,
    new: &str,
) -> Result<String, UpdateError> {
    if !content.contains(old) {
        return Err(UpdateError::old_text_not_found(file, dependency, old));
    }
    Ok(content.replace(old, new))
}
