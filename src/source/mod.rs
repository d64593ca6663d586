//! Source/provider model
//!
//! A [`Source`] is the canonical `{provider, repo, directory}` reference to
//! where code lives, plus the endpoints needed to talk to that provider.
//! Sources are built through [`SourceBuilder`] or parsed from free text with
//! [`Source::from_url`] / [`SourceParser`].

mod parse;

pub use parse::SourceParser;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported code hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Bitbucket,
    Azure,
    #[serde(rename = "codecommit")]
    CodeCommit,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
            Provider::Azure => "azure",
            Provider::CodeCommit => "codecommit",
        }
    }

    /// Public hostname (the AWS region for CodeCommit)
    pub fn default_hostname(&self) -> &'static str {
        match self {
            Provider::Github => "github.com",
            Provider::Gitlab => "gitlab.com",
            Provider::Bitbucket => "bitbucket.org",
            Provider::Azure => "dev.azure.com",
            Provider::CodeCommit => "us-east-1",
        }
    }

    /// Public API base URL; CodeCommit is only reachable through the AWS SDK
    pub fn default_api_endpoint(&self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("https://api.github.com/"),
            Provider::Gitlab => Some("https://gitlab.com/api/v4"),
            Provider::Bitbucket => Some("https://api.bitbucket.org/2.0/"),
            Provider::Azure => Some("https://dev.azure.com/"),
            Provider::CodeCommit => None,
        }
    }

    /// API base URL of a self-hosted instance at `hostname`
    pub fn self_hosted_api_endpoint(&self, hostname: &str) -> Option<String> {
        match self {
            Provider::Github => Some(format!("https://{}/api/v3/", hostname)),
            Provider::Gitlab => Some(format!("https://{}/api/v4", hostname)),
            Provider::Bitbucket => Some(format!("https://{}/rest/api/1.0/", hostname)),
            Provider::Azure => Some(format!("https://{}/", hostname)),
            Provider::CodeCommit => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical reference to a repository (and optionally a directory in it)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    provider: Provider,
    repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_endpoint: Option<String>,
}

impl Source {
    /// Source on the provider's public host
    pub fn new(provider: Provider, repo: impl Into<String>) -> Self {
        Self {
            provider,
            repo: repo.into(),
            directory: None,
            branch: None,
            commit: None,
            hostname: provider.default_hostname().to_string(),
            api_endpoint: provider.default_api_endpoint().map(str::to_string),
        }
    }

    pub fn builder(provider: Provider, repo: impl Into<String>) -> SourceBuilder {
        SourceBuilder {
            provider,
            repo: repo.into(),
            directory: None,
            branch: None,
            commit: None,
            hostname: None,
            api_endpoint: None,
        }
    }

    /// Parse free text with only the public provider hosts recognised
    pub fn from_url(text: &str) -> Option<Source> {
        SourceParser::default().parse(text)
    }

    /// Same source pinned to `commit`
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn api_endpoint(&self) -> Option<&str> {
        self.api_endpoint.as_deref()
    }

    /// First path segment of the repo
    pub fn organization(&self) -> &str {
        self.repo.split('/').next().unwrap_or(&self.repo)
    }

    /// Azure DevOps project (second segment of `org/project/_git/repo`)
    pub fn project(&self) -> Option<&str> {
        match self.provider {
            Provider::Azure => self.repo.split('/').nth(1),
            _ => None,
        }
    }

    /// Last path segment of the repo
    pub fn unscoped_repo(&self) -> &str {
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }

    /// Web URL of the repository
    pub fn url(&self) -> String {
        match self.provider {
            Provider::Azure => format!(
                "https://{}/{}/{}/_git/{}",
                self.hostname,
                self.organization(),
                self.project().unwrap_or_default(),
                self.unscoped_repo()
            ),
            Provider::CodeCommit => format!(
                "https://git-codecommit.{}.amazonaws.com/v1/repos/{}",
                self.hostname, self.repo
            ),
            _ => format!("https://{}/{}", self.hostname, self.repo),
        }
    }

    /// Web URL of the source directory; the repository URL for the root
    pub fn url_with_directory(&self) -> String {
        let directory = match self.directory.as_deref().map(|d| d.trim_matches('/')) {
            None | Some("") | Some(".") => return self.url(),
            Some(d) => d,
        };
        let reference = self.commit.as_deref().or(self.branch.as_deref());

        match self.provider {
            Provider::Github => format!(
                "{}/tree/{}/{}",
                self.url(),
                reference.unwrap_or("HEAD"),
                directory
            ),
            Provider::Gitlab => format!(
                "{}/-/tree/{}/{}",
                self.url(),
                reference.unwrap_or("HEAD"),
                directory
            ),
            Provider::Bitbucket => format!(
                "{}/src/{}/{}",
                self.url(),
                reference.unwrap_or("default"),
                directory
            ),
            Provider::Azure => format!("{}?path=/{}", self.url(), directory),
            Provider::CodeCommit => format!("{}/{}", self.url(), directory),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url_with_directory())
    }
}

/// Builder for [`Source`]
#[derive(Debug, Clone)]
pub struct SourceBuilder {
    provider: Provider,
    repo: String,
    directory: Option<String>,
    branch: Option<String>,
    commit: Option<String>,
    hostname: Option<String>,
    api_endpoint: Option<String>,
}

impl SourceBuilder {
    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(api_endpoint.into());
        self
    }

    /// Finish the source; hostname and api_endpoint go together
    pub fn build(self) -> Result<Source, ConfigError> {
        if self.repo.trim().is_empty() {
            return Err(ConfigError::InvalidSource {
                message: "repo must not be empty".to_string(),
            });
        }

        let (hostname, api_endpoint) = match (self.hostname, self.api_endpoint) {
            (Some(host), Some(api)) => (host, Some(api)),
            // CodeCommit has no HTTP API; its hostname is the AWS region.
            (Some(region), None) if self.provider == Provider::CodeCommit => (region, None),
            (None, None) => (
                self.provider.default_hostname().to_string(),
                self.provider.default_api_endpoint().map(str::to_string),
            ),
            _ => {
                return Err(ConfigError::InvalidSource {
                    message: "hostname and api_endpoint must be specified together".to_string(),
                })
            }
        };

        Ok(Source {
            provider: self.provider,
            repo: self.repo,
            directory: self.directory,
            branch: self.branch,
            commit: self.commit,
            hostname,
            api_endpoint,
        })
    }
}
