//! Shared fixtures: a "dummy" ecosystem over an in-memory repository
//!
//! Dummyfile lines look like `rack "~> 1.2" runtime`; Dummyfile.lock lines
//! look like `rack 1.2.0`.

#![allow(dead_code)]

use async_trait::async_trait;
use depcore::domain::{Dependency, DependencyFile, DependencySet, Requirement};
use depcore::ecosystem::Ecosystem;
use depcore::error::{DependencyFileError, ProviderError, RegistryError, Result};
use depcore::pipeline::{
    replace_requirement, source_from_requirements, CheckContext, FetchContext, FileFetcher,
    FileParser, FileUpdater, MetadataFinder, RequiredFiles, SourceControl, UpdateChecker,
};
use depcore::source::{Provider, Source};
use depcore::version::Version;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub const HEAD: &str = "4f2e1c0b7a9d8e6f5a4b3c2d1e0f9a8b7c6d5e4f";

static LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(\S+)\s+"([^"]*)"(?:\s+(\S+))?$"#).unwrap());

/// Read-only repository held in memory
#[derive(Default)]
pub struct InMemoryRepo {
    files: HashMap<String, Vec<u8>>,
}

impl InMemoryRepo {
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl SourceControl for InMemoryRepo {
    async fn fetch_file_content(
        &self,
        repo: &str,
        path: &str,
        commit: &str,
    ) -> Result<Vec<u8>, ProviderError> {
        assert_eq!(commit, HEAD);
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound {
                repo: repo.to_string(),
                path: path.to_string(),
            })
    }

    async fn head_commit(&self, _repo: &str, _branch: Option<&str>) -> Result<String, ProviderError> {
        Ok(HEAD.to_string())
    }
}

pub struct DummyFetcher;

#[async_trait]
impl FileFetcher for DummyFetcher {
    fn required_files_in(&self, filenames: &[&str]) -> bool {
        filenames.contains(&"Dummyfile")
    }

    fn required_files_message(&self) -> String {
        "Repo must contain a Dummyfile".to_string()
    }

    async fn fetch_files(&self, ctx: &FetchContext) -> Result<Vec<DependencyFile>> {
        let mut files = vec![ctx.fetch_file("Dummyfile").await?];
        files.extend(ctx.fetch_file_if_present("Dummyfile.lock").await?);
        Ok(files)
    }
}

pub struct DummyParser;

impl FileParser for DummyParser {
    fn required_files(&self) -> &'static [&'static str] {
        &["Dummyfile"]
    }

    fn parse(&self, files: &RequiredFiles) -> Result<DependencySet> {
        let manifest = files.text("Dummyfile")?;
        let locked: HashMap<&str, &str> = files
            .get("Dummyfile.lock")
            .and_then(DependencyFile::content_text)
            .map(|text| text.lines().filter_map(|l| l.split_once(' ')).collect())
            .unwrap_or_default();

        let mut set = DependencySet::new();
        for line in manifest.lines().filter(|l| !l.trim().is_empty()) {
            let caps = LINE_RE.captures(line).ok_or_else(|| {
                DependencyFileError::not_parseable("Dummyfile", format!("bad line: {}", line))
            })?;
            let name = &caps[1];
            let group = caps.get(3).map_or("runtime", |m| m.as_str());
            let requirement = Requirement::new(Some(&caps[2]), "Dummyfile").with_groups([group]);
            set.insert(Dependency::new(
                name,
                locked.get(name).copied(),
                vec![requirement],
                "dummy",
            ));
        }
        Ok(set)
    }
}

/// Versions published per package; unknown packages are registry errors
pub struct DummyChecker {
    pub available: HashMap<&'static str, Vec<&'static str>>,
}

#[async_trait]
impl UpdateChecker for DummyChecker {
    async fn latest_version(&self, ctx: &CheckContext<'_>) -> Result<Option<Version>> {
        let name = ctx.dependency.name.as_str();
        let published = self
            .available
            .get(name)
            .ok_or_else(|| RegistryError::package_not_found(name, "dummy"))?;
        let versions = published
            .iter()
            .map(|v| ctx.scheme.parse(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ctx.latest_of(versions)?)
    }
}

pub struct DummyUpdater;

#[async_trait]
impl FileUpdater for DummyUpdater {
    async fn updated_files(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<Vec<DependencyFile>> {
        let mut updated = Vec::new();
        for file in files {
            let Some(text) = file.content_text() else {
                continue;
            };
            let mut content = text.to_string();
            for dependency in dependencies {
                content = match file.name() {
                    "Dummyfile" => update_manifest(&content, dependency)?,
                    "Dummyfile.lock" => update_lockfile(&content, dependency)?,
                    _ => content,
                };
            }
            updated.push(file.with_content(content));
        }
        Ok(updated)
    }
}

fn update_manifest(content: &str, dependency: &Dependency) -> Result<String> {
    let previous = dependency.previous_requirements.as_deref().unwrap_or_default();
    let mut content = content.to_string();
    for (old, new) in previous.iter().zip(&dependency.requirements) {
        if old.requirement == new.requirement {
            continue;
        }
        let render = |r: &Requirement| {
            format!(
                "{} \"{}\"",
                dependency.name,
                r.requirement.as_deref().unwrap_or_default()
            )
        };
        content =
            replace_requirement(&content, "Dummyfile", &dependency.name, &render(old), &render(new))?;
    }
    Ok(content)
}

fn update_lockfile(content: &str, dependency: &Dependency) -> Result<String> {
    match (&dependency.previous_version, &dependency.version) {
        (Some(previous), Some(version)) if previous != version => Ok(replace_requirement(
            content,
            "Dummyfile.lock",
            &dependency.name,
            &format!("{} {}\n", dependency.name, previous),
            &format!("{} {}\n", dependency.name, version),
        )?),
        _ => Ok(content.to_string()),
    }
}

pub struct DummyMetadataFinder;

#[async_trait]
impl MetadataFinder for DummyMetadataFinder {
    async fn source(&self, dependency: &Dependency) -> Result<Option<Source>> {
        Ok(source_from_requirements(dependency))
    }
}

pub fn runtime_only(groups: &[String]) -> bool {
    groups.is_empty() || groups.iter().any(|g| g == "runtime")
}

pub fn default_available() -> HashMap<&'static str, Vec<&'static str>> {
    HashMap::from([
        ("rack", vec!["1.2.0", "1.3.0", "2.0.0"]),
        ("rspec", vec!["3.0.0"]),
        ("foo", vec!["1.0.0", "1.1.0"]),
    ])
}

pub fn dummy_ecosystem(available: HashMap<&'static str, Vec<&'static str>>) -> Ecosystem {
    Ecosystem::builder("dummy")
        .fetcher(Arc::new(DummyFetcher))
        .parser(Arc::new(DummyParser))
        .checker(Arc::new(DummyChecker { available }))
        .updater(Arc::new(DummyUpdater))
        .metadata_finder(Arc::new(DummyMetadataFinder))
        .production_check(runtime_only)
        .build()
        .expect("dummy ecosystem is complete")
}

pub fn fetch_context(repo: InMemoryRepo, directory: &str) -> FetchContext {
    let source = Source::builder(Provider::Github, "acme/app")
        .directory(directory)
        .build()
        .unwrap();
    FetchContext::new(source, Arc::new(repo))
}

pub const MANIFEST: &str = "rack \"~> 1.2\"\nrspec \"~> 3.0\" test\n";

pub const LOCKFILE: &str = "rack 1.2.0\nrspec 3.0.0\n";
