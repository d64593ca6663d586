//! PARSE stage: turning fetched files into a dependency set

use crate::domain::{DependencyFile, DependencySet};
use crate::error::{DependencyFileError, Result};

/// Per-ecosystem manifest parsing
pub trait FileParser: Send + Sync {
    /// File names that must be present for this parser to run
    fn required_files(&self) -> &'static [&'static str];

    /// Parse the validated files into a dependency set
    fn parse(&self, files: &RequiredFiles) -> Result<DependencySet>;
}

/// Parser input whose required files have been checked.
///
/// This is the only way to hand files to a [`FileParser`], so no parser ever
/// runs against the wrong file set.
#[derive(Debug, Clone)]
pub struct RequiredFiles {
    files: Vec<DependencyFile>,
}

impl RequiredFiles {
    /// Validate `files` against the parser's required file list
    pub fn new(
        ecosystem: &str,
        parser: &dyn FileParser,
        files: Vec<DependencyFile>,
    ) -> Result<Self, DependencyFileError> {
        let required = parser.required_files();
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !files.iter().any(|f| f.name() == **name && !f.is_deleted()))
            .map(|name| name.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(DependencyFileError::RequiredFilesMissing {
                ecosystem: ecosystem.to_string(),
                message: required.join(", "),
                missing,
            });
        }

        Ok(Self { files })
    }

    pub fn files(&self) -> &[DependencyFile] {
        &self.files
    }

    /// File with the given name
    pub fn get(&self, name: &str) -> Option<&DependencyFile> {
        self.files.iter().find(|f| f.name() == name)
    }

    /// File with the given name, failing with its path when absent
    pub fn require(&self, name: &str) -> Result<&DependencyFile, DependencyFileError> {
        self.get(name)
            .ok_or_else(|| DependencyFileError::not_found(name))
    }

    /// Text of a required file, failing if it is binary
    pub fn text(&self, name: &str) -> Result<&str, DependencyFileError> {
        let file = self.require(name)?;
        file.content_text()
            .ok_or_else(|| DependencyFileError::not_parseable(file.path(), "content is not UTF-8"))
    }

    pub fn into_files(self) -> Vec<DependencyFile> {
        self.files
    }
}

/// Run `parser` and check every requirement names a fetched file
pub fn parse_files(
    ecosystem: &str,
    parser: &dyn FileParser,
    files: &[DependencyFile],
) -> Result<DependencySet> {
    let required = RequiredFiles::new(ecosystem, parser, files.to_vec())?;
    let dependencies = parser.parse(&required)?;

    for dependency in dependencies.dependencies() {
        for requirement in &dependency.requirements {
            let known = files
                .iter()
                .any(|f| f.name() == requirement.file || f.path() == requirement.file);
            if !known {
                return Err(DependencyFileError::UnknownRequirementFile {
                    dependency: dependency.name.clone(),
                    file: requirement.file.clone(),
                }
                .into());
            }
        }
    }

    Ok(dependencies)
}
