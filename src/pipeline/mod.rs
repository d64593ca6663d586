//! Pipeline stage contracts and the run that composes them
//!
//! Every ecosystem plugs one implementation into each stage:
//! FETCH ([`FileFetcher`]) → PARSE ([`FileParser`]) → CHECK
//! ([`UpdateChecker`], per dependency) → UPDATE ([`FileUpdater`]).
//! [`Pipeline::run`] executes them strictly in that order. Fetch and parse
//! failures abort the run; check and update failures are isolated per
//! dependency and collected in the report.

mod checker;
mod fetcher;
mod metadata;
mod parser;
mod updater;

pub use checker::{
    constraint_updated_requirements, CheckContext, CheckOptions, Unlock, UpdateCheck,
    UpdateChecker,
};
pub use fetcher::{FetchContext, FileFetcher, SourceControl};
pub use metadata::{source_from_requirements, MetadataFinder, RegistryMetadataFinder};
pub use parser::{parse_files, FileParser, RequiredFiles};
pub use updater::{replace_requirement, FileUpdate, FileUpdater};

use crate::domain::{Dependency, DependencyFile, DependencySet};
use crate::ecosystem::{Ecosystem, EcosystemRegistry};
use crate::error::{ConfigError, CoreError, DependencyFileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry or provider credential handed to stages
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential type, e.g. "git_source" or "npm_registry"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credential {
    pub fn new(kind: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            host: Some(host.into()),
            username: None,
            password: None,
        }
    }

    /// Sets username and password (builder pattern)
    pub fn with_login(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Stage a per-dependency failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Check,
    Update,
}

/// A failure isolated to one dependency
#[derive(Debug)]
pub struct DependencyFailure {
    pub dependency: String,
    pub stage: Stage,
    pub error: CoreError,
}

/// Files produced for one updated dependency
#[derive(Debug, Clone)]
pub struct DependencyUpdate {
    /// The dependency with its previous state recorded
    pub dependency: Dependency,
    /// New snapshots of the files that changed
    pub files: Vec<DependencyFile>,
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    /// Files as fetched; never modified by later stages
    pub files: Vec<DependencyFile>,
    pub dependencies: DependencySet,
    pub updates: Vec<DependencyUpdate>,
    pub failures: Vec<DependencyFailure>,
}

impl PipelineReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One ecosystem's pipeline
#[derive(Debug)]
pub struct Pipeline {
    ecosystem: Arc<Ecosystem>,
    options: CheckOptions,
    unlock: Unlock,
}

impl Pipeline {
    pub fn new(ecosystem: Arc<Ecosystem>) -> Self {
        Self {
            ecosystem,
            options: CheckOptions::default(),
            unlock: Unlock::Own,
        }
    }

    /// Pipeline for a registered ecosystem
    pub fn for_ecosystem(registry: &EcosystemRegistry, name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(registry.get(name)?))
    }

    /// Sets the check options (builder pattern)
    pub fn with_options(mut self, options: CheckOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the unlock level (builder pattern)
    pub fn with_unlock(mut self, unlock: Unlock) -> Self {
        self.unlock = unlock;
        self
    }

    pub fn ecosystem(&self) -> &Ecosystem {
        &self.ecosystem
    }

    /// Run fetch, parse, check and update for the source in `ctx`
    pub async fn run(&self, ctx: &FetchContext) -> Result<PipelineReport> {
        let ecosystem = self.ecosystem.as_ref();

        // Step 1: Fetch
        let files = ecosystem.fetcher().fetch_files(ctx).await?;
        if files.is_empty() {
            return Err(
                DependencyFileError::not_found(ecosystem.fetcher().required_files_message()).into(),
            );
        }
        info!("Fetched {} files for {}", files.len(), ecosystem.name());

        // Step 2: Parse
        let dependencies = parse_files(ecosystem.name(), ecosystem.parser(), &files)?;
        info!("Parsed {} dependencies", dependencies.len());

        // Step 3: Check
        let mut failures = Vec::new();
        let mut updated = Vec::new();
        for dependency in dependencies.dependencies().filter(|d| d.top_level()) {
            match self.check(dependency, &files, ctx).await {
                Ok(Some(dependency)) => updated.push(dependency),
                Ok(None) => debug!("{} is up to date", dependency.name),
                Err(error) => {
                    warn!("Checking {} failed: {}", dependency.name, error);
                    failures.push(DependencyFailure {
                        dependency: dependency.name.clone(),
                        stage: Stage::Check,
                        error,
                    });
                }
            }
        }
        info!("{} dependencies need updates", updated.len());

        // Step 4: Update, each dependency against the original files
        let mut updates = Vec::new();
        let file_update = FileUpdate::new(ecosystem.updater());
        for dependency in updated {
            match file_update
                .apply(std::slice::from_ref(&dependency), &files)
                .await
            {
                Ok(changed) => updates.push(DependencyUpdate {
                    dependency,
                    files: changed,
                }),
                Err(error) => {
                    warn!("Updating {} failed: {}", dependency.name, error);
                    failures.push(DependencyFailure {
                        dependency: dependency.name.clone(),
                        stage: Stage::Update,
                        error,
                    });
                }
            }
        }

        Ok(PipelineReport {
            files,
            dependencies,
            updates,
            failures,
        })
    }

    async fn check(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        ctx: &FetchContext,
    ) -> Result<Option<Dependency>> {
        let check_ctx = CheckContext {
            dependency,
            files,
            credentials: ctx.credentials(),
            options: &self.options,
            scheme: self.ecosystem.version_scheme(),
            default_operator: self.ecosystem.default_operator(),
        };
        let check = UpdateCheck::new(self.ecosystem.checker(), check_ctx);
        check.updated_dependency(self.unlock).await
    }
}
