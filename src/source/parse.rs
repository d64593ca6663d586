//! Recognising repository references in free text
//!
//! Candidate strings come from package metadata (homepage, repository,
//! changelog fields), so most of them are not source references at all and
//! parsing returns None rather than an error.

use super::{Provider, Source};
use crate::config::SourcesSettings;
use regex::Regex;
use std::sync::LazyLock;

static SCP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+@)?(?P<host>[\w.-]+\.[A-Za-z]+):(?P<path>[^/].*)$").unwrap()
});

static CODECOMMIT_HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git-codecommit\.(?P<region>[a-z0-9-]+)\.amazonaws\.com$").unwrap()
});

/// Source parser with optional self-hosted hosts
#[derive(Debug, Clone, Default)]
pub struct SourceParser {
    github_hosts: Vec<String>,
    gitlab_hosts: Vec<String>,
    bitbucket_hosts: Vec<String>,
}

struct Location<'a> {
    host: String,
    segments: Vec<&'a str>,
    query: Option<&'a str>,
}

impl SourceParser {
    /// Parser that also recognises the self-hosted hosts in `settings`
    pub fn with_hosts(settings: &SourcesSettings) -> Self {
        let lower = |hosts: &[String]| -> Vec<String> {
            hosts.iter().map(|h| h.to_lowercase()).collect()
        };
        Self {
            github_hosts: lower(&settings.github_hosts),
            gitlab_hosts: lower(&settings.gitlab_hosts),
            bitbucket_hosts: lower(&settings.bitbucket_hosts),
        }
    }

    /// First whitespace-separated token of `text` that names a repository
    pub fn parse(&self, text: &str) -> Option<Source> {
        text.split_whitespace().find_map(|token| self.parse_token(token))
    }

    fn parse_token(&self, token: &str) -> Option<Source> {
        let token = token
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '<' | '>' | '(' | ')' | ',' | ';'));
        let token = token.split('#').next().unwrap_or(token);
        let location = split_location(token)?;

        let (provider, self_hosted) = self.provider_for(&location.host)?;
        let source = match provider {
            Provider::Github => simple_source(provider, &location.segments, &["tree", "blob"])?,
            Provider::Bitbucket => simple_source(provider, &location.segments, &["src"])?,
            Provider::Gitlab => gitlab_source(&location.segments)?,
            Provider::Azure => azure_source(&location)?,
            Provider::CodeCommit => codecommit_source(&location)?,
        };

        if !self_hosted {
            return Some(source);
        }
        let api = provider.self_hosted_api_endpoint(&location.host)?;
        rebuild_on_host(source, &location.host, api)
    }

    fn provider_for(&self, host: &str) -> Option<(Provider, bool)> {
        let host = host.strip_prefix("www.").unwrap_or(host);
        match host {
            "github.com" => Some((Provider::Github, false)),
            "gitlab.com" => Some((Provider::Gitlab, false)),
            "bitbucket.org" => Some((Provider::Bitbucket, false)),
            "dev.azure.com" => Some((Provider::Azure, false)),
            h if h.ends_with(".visualstudio.com") => Some((Provider::Azure, false)),
            h if CODECOMMIT_HOST_RE.is_match(h) => Some((Provider::CodeCommit, false)),
            h if self.github_hosts.iter().any(|x| x == h) => Some((Provider::Github, true)),
            h if self.gitlab_hosts.iter().any(|x| x == h) => Some((Provider::Gitlab, true)),
            h if self.bitbucket_hosts.iter().any(|x| x == h) => Some((Provider::Bitbucket, true)),
            _ => None,
        }
    }
}

impl From<&SourcesSettings> for SourceParser {
    fn from(settings: &SourcesSettings) -> Self {
        Self::with_hosts(settings)
    }
}

/// Split a URL-ish token into host, path segments and query
fn split_location(token: &str) -> Option<Location<'_>> {
    let (rest, query) = match token.split_once('?') {
        Some((rest, query)) => (rest, Some(query)),
        None => (token, None),
    };

    let (host, path) = if let Some((_, after)) = rest.split_once("://") {
        after.split_once('/').unwrap_or((after, ""))
    } else if let Some(caps) = SCP_RE.captures(rest) {
        let host = caps.name("host")?;
        let path = caps.name("path")?;
        (&rest[host.start()..host.end()], &rest[path.start()..path.end()])
    } else {
        rest.split_once('/')?
    };

    // Drop credentials and ports.
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host).to_lowercase();

    Some(Location {
        host,
        segments: path.split('/').filter(|s| !s.is_empty()).collect(),
        query,
    })
}

fn clean_repo_name(name: &str) -> &str {
    let name = name.trim_end_matches('.');
    name.strip_suffix(".git").unwrap_or(name).trim_end_matches('.')
}

fn is_name(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

fn directory_from(route: &str, rest: &[&str]) -> Option<String> {
    // blob routes point at a file; its directory is the parent.
    let dirs = if route == "blob" && !rest.is_empty() {
        &rest[..rest.len() - 1]
    } else {
        rest
    };
    (!dirs.is_empty()).then(|| dirs.join("/"))
}

fn with_route(
    provider: Provider,
    repo: String,
    branch: Option<&str>,
    directory: Option<String>,
) -> Option<Source> {
    let mut builder = Source::builder(provider, repo);
    if let Some(branch) = branch {
        builder = builder.branch(branch);
    }
    if let Some(directory) = directory {
        builder = builder.directory(directory);
    }
    builder.build().ok()
}

/// `owner/name[/route/branch/dir...]` for GitHub and Bitbucket
fn simple_source(provider: Provider, segments: &[&str], routes: &[&str]) -> Option<Source> {
    let [owner, name, rest @ ..] = segments else {
        return None;
    };
    let name = clean_repo_name(name);
    if !is_name(owner) || !is_name(name) {
        return None;
    }
    let repo = format!("{}/{}", owner, name);

    match rest {
        [route, branch, dirs @ ..] if routes.contains(route) => {
            with_route(provider, repo, Some(*branch), directory_from(route, dirs))
        }
        _ => with_route(provider, repo, None, None),
    }
}

/// Nested groups, optionally followed by `/-/tree/...` or `/tree/...`
fn gitlab_source(segments: &[&str]) -> Option<Source> {
    let route_at = segments
        .iter()
        .position(|s| matches!(*s, "-" | "tree" | "blob"))
        .unwrap_or(segments.len());
    let repo_parts = &segments[..route_at];
    if repo_parts.len() < 2 {
        return None;
    }

    let mut parts: Vec<&str> = repo_parts.to_vec();
    let last = parts.len() - 1;
    parts[last] = clean_repo_name(parts[last]);
    if !parts.iter().all(|p| is_name(p)) {
        return None;
    }
    let repo = parts.join("/");

    let route = match segments.get(route_at) {
        Some(&"-") => &segments[route_at + 1..],
        _ => &segments[route_at..],
    };
    match route {
        [route @ ("tree" | "blob"), branch, dirs @ ..] => {
            with_route(Provider::Gitlab, repo, Some(*branch), directory_from(route, dirs))
        }
        _ => with_route(Provider::Gitlab, repo, None, None),
    }
}

/// `org/project/_git/repo` on dev.azure.com, `project/_git/repo` on
/// `org.visualstudio.com`
fn azure_source(location: &Location<'_>) -> Option<Source> {
    let git_at = location.segments.iter().position(|s| *s == "_git")?;
    let name = clean_repo_name(location.segments.get(git_at + 1)?);

    let (org, project) = match &location.segments[..git_at] {
        [org, project] => (org.to_string(), *project),
        [project] => (
            location.host.strip_suffix(".visualstudio.com")?.to_string(),
            *project,
        ),
        _ => return None,
    };
    let repo = format!("{}/{}/_git/{}", org, project, name);

    let directory = location.query.and_then(|q| {
        q.split('&')
            .find_map(|kv| kv.strip_prefix("path="))
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
    });
    with_route(Provider::Azure, repo, None, directory)
}

/// `git-codecommit.<region>.amazonaws.com/v1/repos/<name>[/dir]`
fn codecommit_source(location: &Location<'_>) -> Option<Source> {
    let region = CODECOMMIT_HOST_RE
        .captures(&location.host)?
        .name("region")?
        .as_str()
        .to_string();
    let ["v1", "repos", name, dirs @ ..] = location.segments.as_slice() else {
        return None;
    };

    let mut builder = Source::builder(Provider::CodeCommit, clean_repo_name(name)).hostname(region);
    if !dirs.is_empty() {
        builder = builder.directory(dirs.join("/"));
    }
    let branch = location
        .query
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("ref=")));
    if let Some(branch) = branch {
        builder = builder.branch(branch);
    }
    builder.build().ok()
}

fn rebuild_on_host(source: Source, host: &str, api: String) -> Option<Source> {
    let mut builder = Source::builder(source.provider(), source.repo())
        .hostname(host)
        .api_endpoint(api);
    if let Some(directory) = source.directory() {
        builder = builder.directory(directory);
    }
    if let Some(branch) = source.branch() {
        builder = builder.branch(branch);
    }
    builder.build().ok()
}
