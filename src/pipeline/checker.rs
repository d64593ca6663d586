//! CHECK stage: deciding whether and how far a dependency can move
//!
//! [`UpdateChecker`] is the per-ecosystem lookup. [`UpdateCheck`] wraps one
//! checker for one dependency, memoizes its lookups and applies the shared
//! decision rules (git SHAs, requirement-only dependencies, ignored versions).

use super::Credential;
use crate::domain::{Dependency, DependencyFile, Requirement};
use crate::error::{ConfigError, Result};
use crate::version::{Constraint, Operator, RequirementsUpdateStrategy, Version, VersionScheme};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::debug;

static FULL_SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// Caller-supplied options for one check
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Constraint strings; versions matching any of them are never proposed
    pub ignored_versions: Vec<String>,
    /// How requirement strings should change
    pub strategy: RequirementsUpdateStrategy,
}

/// How far a check may move requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlock {
    /// Keep requirements as they are; only the resolved version moves
    None,
    /// Allow this dependency's own requirements to change
    Own,
}

/// Inputs handed to an [`UpdateChecker`]
pub struct CheckContext<'a> {
    pub dependency: &'a Dependency,
    pub files: &'a [DependencyFile],
    pub credentials: &'a [Credential],
    pub options: &'a CheckOptions,
    pub scheme: VersionScheme,
    /// Operator the ecosystem reads bare requirement versions as
    pub default_operator: Operator,
}

impl<'a> CheckContext<'a> {
    /// The dependency's current version, parsed
    pub fn current_version(&self) -> Result<Option<Version>, ConfigError> {
        self.dependency.version_parsed(self.scheme)
    }

    /// Parse one of the dependency's requirements with the ecosystem's grammar
    pub fn constraint_for(
        &self,
        requirement: &Requirement,
    ) -> Result<Option<Constraint>, ConfigError> {
        requirement.constraint(self.scheme, self.default_operator)
    }

    fn ignored_constraints(&self) -> Result<Vec<Constraint>, ConfigError> {
        self.options
            .ignored_versions
            .iter()
            .map(|raw| Constraint::parse_with_default(raw, self.scheme, self.default_operator))
            .collect()
    }

    /// Drop every version matched by an ignore constraint
    pub fn filter_ignored(&self, versions: Vec<Version>) -> Result<Vec<Version>, ConfigError> {
        let ignored = self.ignored_constraints()?;
        Ok(versions
            .into_iter()
            .filter(|v| !ignored.iter().any(|c| c.satisfied_by(v)))
            .collect())
    }

    /// True when an ignore constraint covers every version
    pub fn ignores_everything(&self) -> Result<bool, ConfigError> {
        Ok(self.ignored_constraints()?.iter().any(|c| {
            c.alternatives().iter().any(|alt| {
                alt.iter().all(|cmp| match cmp.op() {
                    Operator::Any => true,
                    Operator::GreaterEq => cmp.version().is_some_and(|v| {
                        v.with_precision(usize::MAX)
                            .trim_matches(['0', '.'])
                            .is_empty()
                    }),
                    _ => false,
                })
            })
        }))
    }

    /// Pre-releases are only proposed to dependencies already on one
    pub fn wants_prerelease(&self) -> bool {
        if let Ok(Some(current)) = self.current_version() {
            return current.is_prerelease();
        }
        self.dependency
            .requirements
            .iter()
            .filter_map(|r| self.constraint_for(r).ok().flatten())
            .flat_map(|c| {
                c.alternatives()
                    .iter()
                    .flatten()
                    .filter_map(|cmp| cmp.version().map(Version::is_prerelease))
                    .collect::<Vec<_>>()
            })
            .any(|pre| pre)
    }

    /// Highest candidate after ignore and pre-release filtering
    pub fn latest_of(&self, versions: Vec<Version>) -> Result<Option<Version>, ConfigError> {
        let wants_prerelease = self.wants_prerelease();
        Ok(self
            .filter_ignored(versions)?
            .into_iter()
            .filter(|v| wants_prerelease || !v.is_prerelease())
            .max())
    }
}

/// Per-ecosystem version lookup
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Cheapest lookup of the newest available version; no resolution
    async fn latest_version(&self, ctx: &CheckContext<'_>) -> Result<Option<Version>>;

    /// Newest version the ecosystem's resolver accepts with the rest of the
    /// manifest. Ecosystems without a resolution step use the latest version.
    async fn latest_resolvable_version(&self, ctx: &CheckContext<'_>) -> Result<Option<Version>> {
        self.latest_version(ctx).await
    }

    /// Newest resolvable version that the current requirements already allow
    async fn latest_resolvable_version_with_no_unlock(
        &self,
        ctx: &CheckContext<'_>,
    ) -> Result<Option<Version>> {
        let Some(candidate) = self.latest_resolvable_version(ctx).await? else {
            return Ok(None);
        };
        for requirement in &ctx.dependency.requirements {
            if let Some(constraint) = ctx.constraint_for(requirement)? {
                if !constraint.satisfied_by(&candidate) {
                    return Ok(None);
                }
            }
        }
        Ok(Some(candidate))
    }

    /// Requirements rewritten for `target`, keeping their original style
    fn updated_requirements(
        &self,
        ctx: &CheckContext<'_>,
        target: &Version,
    ) -> Result<Vec<Requirement>> {
        constraint_updated_requirements(ctx, target)
    }
}

/// Default requirement update: apply the check's strategy to each constraint
pub fn constraint_updated_requirements(
    ctx: &CheckContext<'_>,
    target: &Version,
) -> Result<Vec<Requirement>> {
    ctx.dependency
        .requirements
        .iter()
        .map(|req| {
            let updated = match ctx.constraint_for(req)? {
                // Git-sourced requirements are pinned by ref, not by constraint.
                Some(_) if req.is_git() => req.requirement.clone(),
                Some(constraint) => Some(constraint.updated_for(target, ctx.options.strategy)),
                None => None,
            };
            Ok(req.with_requirement(updated))
        })
        .collect()
}

/// One dependency's check, with memoized lookups
pub struct UpdateCheck<'a> {
    checker: &'a dyn UpdateChecker,
    ctx: CheckContext<'a>,
    latest: OnceCell<Option<Version>>,
    resolvable: OnceCell<Option<Version>>,
}

impl<'a> UpdateCheck<'a> {
    pub fn new(checker: &'a dyn UpdateChecker, ctx: CheckContext<'a>) -> Self {
        Self {
            checker,
            ctx,
            latest: OnceCell::new(),
            resolvable: OnceCell::new(),
        }
    }

    pub fn dependency(&self) -> &Dependency {
        self.ctx.dependency
    }

    pub async fn latest_version(&self) -> Result<Option<&Version>> {
        let latest = self
            .latest
            .get_or_try_init(|| self.checker.latest_version(&self.ctx))
            .await?;
        Ok(latest.as_ref())
    }

    pub async fn latest_resolvable_version(&self) -> Result<Option<&Version>> {
        let resolvable = self
            .resolvable
            .get_or_try_init(|| self.checker.latest_resolvable_version(&self.ctx))
            .await?;
        Ok(resolvable.as_ref())
    }

    /// Requirements rewritten for the latest resolvable version
    pub async fn updated_requirements(&self) -> Result<Vec<Requirement>> {
        match self.latest_resolvable_version().await? {
            Some(target) => self.checker.updated_requirements(&self.ctx, target),
            None => Ok(self.ctx.dependency.requirements.clone()),
        }
    }

    fn current_is_sha(&self) -> Result<bool, ConfigError> {
        Ok(matches!(self.ctx.current_version()?, Some(v) if v.is_git_ref()))
    }

    /// Compare the latest version with the current one
    pub async fn up_to_date(&self) -> Result<bool> {
        let Some(current) = self.ctx.dependency.version.as_deref() else {
            return self.requirements_up_to_date().await;
        };

        if self.current_is_sha()? {
            return Ok(self
                .latest_version()
                .await?
                .is_some_and(|latest| latest.to_string().starts_with(current)));
        }

        let Some(latest) = self.latest_version().await? else {
            return Ok(false);
        };
        if FULL_SHA_RE.is_match(&latest.to_string()) {
            return Ok(true);
        }
        let current = self.ctx.scheme.parse(current)?;
        Ok(*latest <= current)
    }

    /// True when a newer version than the current one exists
    pub async fn needs_update(&self) -> Result<bool> {
        if self.latest_version().await?.is_none() {
            return Ok(false);
        }
        Ok(!self.up_to_date().await?)
    }

    async fn requirements_up_to_date(&self) -> Result<bool> {
        if self.updated_requirements().await? == self.ctx.dependency.requirements {
            return Ok(true);
        }
        let Some(latest) = self.latest_version().await? else {
            return Ok(false);
        };
        let mut floor: Option<Version> = None;
        for requirement in &self.ctx.dependency.requirements {
            if let Some(constraint) = self.ctx.constraint_for(requirement)? {
                if let Some(min) = constraint.minimum_version() {
                    if floor.as_ref().is_none_or(|f| min > f) {
                        floor = Some(min.clone());
                    }
                }
            }
        }
        Ok(floor.is_some_and(|f| f >= *latest))
    }

    /// Whether an update is possible at the given unlock level
    pub async fn can_update(&self, unlock: Unlock) -> Result<bool> {
        if self.ctx.ignores_everything()? {
            return Ok(false);
        }

        let Some(current) = self.ctx.dependency.version.as_deref() else {
            if unlock == Unlock::None {
                return Ok(false);
            }
            return Ok(self.updated_requirements().await? != self.ctx.dependency.requirements);
        };

        if self.up_to_date().await? {
            return Ok(false);
        }

        let candidate = match unlock {
            Unlock::None => {
                self.checker
                    .latest_resolvable_version_with_no_unlock(&self.ctx)
                    .await?
            }
            Unlock::Own => self.latest_resolvable_version().await?.cloned(),
        };
        let Some(candidate) = candidate else {
            return Ok(false);
        };

        if self.current_is_sha()? {
            return Ok(!candidate.to_string().starts_with(current));
        }
        Ok(candidate > self.ctx.scheme.parse(current)?)
    }

    /// The dependency as it would look after the update
    pub async fn updated_dependency(&self, unlock: Unlock) -> Result<Option<Dependency>> {
        if !self.can_update(unlock).await? {
            debug!("{} cannot be updated", self.ctx.dependency.name);
            return Ok(None);
        }

        let dependency = self.ctx.dependency;
        let updated = match unlock {
            Unlock::None => {
                let version = self
                    .checker
                    .latest_resolvable_version_with_no_unlock(&self.ctx)
                    .await?;
                dependency.updated_to(
                    version.map(|v| v.to_string()),
                    dependency.requirements.clone(),
                )
            }
            Unlock::Own => {
                let version = self.latest_resolvable_version().await?.map(|v| v.to_string());
                let requirements = self.updated_requirements().await?;
                dependency.updated_to(version, requirements)
            }
        };
        Ok(Some(updated))
    }
}
