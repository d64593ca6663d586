//! Error types using thiserror
//!
//! Error hierarchy:
//! - ConfigError: fatal configuration problems (unknown ecosystem, malformed versions)
//! - DependencyFileError: missing or unusable dependency files
//! - HelperError: sandboxed helper subprocess failures
//! - ReachabilityError: dependencies whose sources cannot be reached
//! - UpdateError: file updates that could not be applied cleanly
//! - ProviderError: source-control read API failures
//! - RegistryError: package registry communication failures

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for every pipeline stage
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Dependency file related errors
    #[error(transparent)]
    DependencyFile(#[from] DependencyFileError),

    /// Helper subprocess errors
    #[error(transparent)]
    Helper(#[from] HelperError),

    /// Unreachable dependency sources
    #[error(transparent)]
    Reachability(#[from] ReachabilityError),

    /// File update errors
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// Source-control provider errors
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Package registry errors
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Convenience alias used throughout the crate
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Fatal configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Lookup of an ecosystem that was never registered
    #[error("unknown ecosystem '{name}': no implementation is registered")]
    UnknownEcosystem { name: String },

    /// A second, different implementation registered under an existing key
    #[error("ecosystem '{name}' is already registered with a different implementation")]
    DuplicateEcosystem { name: String },

    /// An ecosystem descriptor without one of its stage implementations
    #[error("ecosystem '{name}' is missing its {capability} implementation")]
    MissingCapability {
        name: String,
        capability: &'static str,
    },

    /// Version string outside its ecosystem's grammar
    #[error("invalid {scheme} version '{input}'")]
    InvalidVersion { scheme: String, input: String },

    /// Requirement string outside its ecosystem's grammar
    #[error("invalid requirement '{input}': {message}")]
    InvalidRequirement { input: String, message: String },

    /// Inconsistent source definition
    #[error("invalid source: {message}")]
    InvalidSource { message: String },

    /// Settings file could not be read or parsed
    #[error("invalid settings in {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    /// Invalid duration format
    #[error("invalid duration format '{value}': expected format like '30s', '5m', '1h'")]
    InvalidDuration { value: String },
}

/// Errors about the dependency files of a repository
#[derive(Error, Debug)]
pub enum DependencyFileError {
    /// A required file is absent from the repository
    #[error("dependency file not found: {path}")]
    NotFound { path: String },

    /// The parser was handed a file set without its required files
    #[error("{ecosystem} requires {message}; missing: {}", .missing.join(", "))]
    RequiredFilesMissing {
        ecosystem: String,
        message: String,
        missing: Vec<String>,
    },

    /// A file exists but its content cannot be parsed
    #[error("dependency file {path} is not parseable: {message}")]
    NotParseable { path: String, message: String },

    /// A requirement points at a file that was never fetched
    #[error("requirement for '{dependency}' names unfetched file '{file}'")]
    UnknownRequirementFile { dependency: String, file: String },

    /// The configured branch does not exist
    #[error("branch not found: {branch}")]
    BranchNotFound { branch: String },
}

/// Context captured for every helper invocation
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Ecosystem the helper was run for, when the caller named one
    pub ecosystem: Option<String>,
    /// Program that was executed
    pub command: String,
    /// Helper function name sent over stdin
    pub function: String,
    /// Arguments sent over stdin
    pub args: Vec<serde_json::Value>,
    /// Wall-clock time until the child exited or was killed
    pub time_taken: Duration,
    /// Captured standard error, truncated
    pub stderr_output: String,
    /// Exit code, when the child exited normally
    pub exit_code: Option<i32>,
    /// Terminating signal, when the child was killed
    pub termsig: Option<i32>,
}

/// Coarse classification of helper failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperFailureKind {
    /// Error reported by the helper itself through the JSON error field
    Application,
    /// Parent-side wall-clock timeout fired
    Timeout,
    /// Child terminated by a signal (e.g. OOM kill)
    Signaled,
    /// Child produced no parsable JSON
    UnparsableOutput,
    /// Child could not be started or talked to
    Io,
}

/// Failures of the sandboxed helper subprocess
#[derive(Error, Debug)]
pub enum HelperError {
    /// The helper ran and reported an error
    #[error("helper function '{}' failed ({error_class}): {message}", .context.function)]
    Application {
        message: String,
        error_class: String,
        trace: Vec<String>,
        context: Box<ErrorContext>,
    },

    /// The helper exceeded its wall-clock budget and was killed
    #[error("helper function '{}' timed out after {:?}", .context.function, .timeout)]
    Timeout {
        timeout: Duration,
        context: Box<ErrorContext>,
    },

    /// The helper was terminated by a signal
    #[error("helper function '{}' was killed by signal {signal}", .context.function)]
    Signaled {
        signal: i32,
        context: Box<ErrorContext>,
    },

    /// The helper exited without a usable JSON response
    #[error("helper function '{}' produced unparsable output: {message}", .context.function)]
    UnparsableOutput {
        message: String,
        context: Box<ErrorContext>,
    },

    /// The helper program could not be spawned
    #[error("failed to spawn helper '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// IO failure while preparing or talking to the helper
    #[error("helper IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

/// Dependency sources the run could not reach
#[derive(Error, Debug)]
pub enum ReachabilityError {
    /// Private or deleted git repositories
    #[error("git dependencies not reachable: {}", .urls.join(", "))]
    GitDependenciesNotReachable { urls: Vec<String> },

    /// Path dependencies outside the fetched file set
    #[error("path dependencies not reachable: {}", .paths.join(", "))]
    PathDependenciesNotReachable { paths: Vec<String> },

    /// A git dependency pins a ref that no longer exists
    #[error("git reference for '{dependency}' not found")]
    GitReferenceNotFound { dependency: String },

    /// Credentials for a private registry were rejected
    #[error("authentication failed for private source {source_url}")]
    PrivateSourceAuthenticationFailure { source_url: String },

    /// A private registry did not answer in time
    #[error("private source {source_url} timed out")]
    PrivateSourceTimedOut { source_url: String },
}

/// Failures applying an update to a single dependency
#[derive(Error, Debug)]
pub enum UpdateError {
    /// The text the updater expected to replace is not in the file
    #[error("expected '{expected}' for '{dependency}' not found in {file}")]
    OldTextNotFound {
        file: String,
        dependency: String,
        expected: String,
    },

    /// The updater produced no changed files
    #[error("no files changed when updating '{dependency}'")]
    NoChanges { dependency: String },

    /// Applying the updater again changed the output
    #[error("update of {file} is not idempotent")]
    NotIdempotent { file: String },

    /// The updater returned a file that was not among its inputs
    #[error("updater returned unexpected file {file}")]
    UnexpectedFile { file: String },

    /// Dependency passed to the updater lacks the data it needs
    #[error("cannot update '{dependency}': {message}")]
    InvalidDependency { dependency: String, message: String },
}

/// Source-control provider failures
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The path, ref or repository does not exist
    #[error("{path} not found in {repo}")]
    NotFound { repo: String, path: String },

    /// Any other client failure
    #[error("request to {repo} failed: {message}")]
    Request { repo: String, message: String },
}

/// Errors related to package registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Package not found in registry
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    /// Network request failed
    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    /// Invalid response from registry
    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    /// Timeout
    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },
}

impl CoreError {
    /// Stable snake_case tag for reporting
    pub fn error_type(&self) -> &'static str {
        match self {
            CoreError::Config(ConfigError::UnknownEcosystem { .. }) => "unknown_ecosystem",
            CoreError::Config(_) => "configuration_error",
            CoreError::DependencyFile(e) => match e {
                DependencyFileError::NotFound { .. } => "dependency_file_not_found",
                DependencyFileError::RequiredFilesMissing { .. } => "dependency_file_not_found",
                DependencyFileError::NotParseable { .. } => "dependency_file_not_parseable",
                DependencyFileError::UnknownRequirementFile { .. } => {
                    "dependency_file_not_parseable"
                }
                DependencyFileError::BranchNotFound { .. } => "branch_not_found",
            },
            CoreError::Helper(e) => match e.kind() {
                HelperFailureKind::Application => "helper_subprocess_failed",
                HelperFailureKind::Timeout => "helper_timed_out",
                HelperFailureKind::Signaled => "helper_killed",
                HelperFailureKind::UnparsableOutput => "helper_output_unparsable",
                HelperFailureKind::Io => "helper_io_error",
            },
            CoreError::Reachability(e) => match e {
                ReachabilityError::GitDependenciesNotReachable { .. } => {
                    "git_dependencies_not_reachable"
                }
                ReachabilityError::PathDependenciesNotReachable { .. } => {
                    "path_dependencies_not_reachable"
                }
                ReachabilityError::GitReferenceNotFound { .. } => {
                    "git_dependency_reference_not_found"
                }
                ReachabilityError::PrivateSourceAuthenticationFailure { .. } => {
                    "private_source_authentication_failure"
                }
                ReachabilityError::PrivateSourceTimedOut { .. } => "private_source_timed_out",
            },
            CoreError::Update(UpdateError::OldTextNotFound { .. }) => "update_not_applicable",
            CoreError::Update(_) => "update_failed",
            CoreError::Provider(ProviderError::NotFound { .. }) => "provider_not_found",
            CoreError::Provider(_) => "provider_error",
            CoreError::Registry(_) => "registry_error",
        }
    }

    /// True for infrastructure failures a caller may retry with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Helper(e) => e.is_retryable(),
            CoreError::Registry(e) => e.is_retryable(),
            CoreError::Reachability(ReachabilityError::PrivateSourceTimedOut { .. }) => true,
            _ => false,
        }
    }
}

impl ConfigError {
    /// Creates a new UnknownEcosystem error
    pub fn unknown_ecosystem(name: impl Into<String>) -> Self {
        ConfigError::UnknownEcosystem { name: name.into() }
    }

    /// Creates a new InvalidVersion error
    pub fn invalid_version(scheme: impl Into<String>, input: impl Into<String>) -> Self {
        ConfigError::InvalidVersion {
            scheme: scheme.into(),
            input: input.into(),
        }
    }

    /// Creates a new InvalidRequirement error
    pub fn invalid_requirement(input: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidRequirement {
            input: input.into(),
            message: message.into(),
        }
    }
}

impl DependencyFileError {
    /// Creates a new NotFound error
    pub fn not_found(path: impl Into<String>) -> Self {
        DependencyFileError::NotFound { path: path.into() }
    }

    /// Creates a new NotParseable error
    pub fn not_parseable(path: impl Into<String>, message: impl Into<String>) -> Self {
        DependencyFileError::NotParseable {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl HelperError {
    /// Classifies the failure
    pub fn kind(&self) -> HelperFailureKind {
        match self {
            HelperError::Application { .. } => HelperFailureKind::Application,
            HelperError::Timeout { .. } => HelperFailureKind::Timeout,
            HelperError::Signaled { .. } => HelperFailureKind::Signaled,
            HelperError::UnparsableOutput { .. } => HelperFailureKind::UnparsableOutput,
            HelperError::Spawn { .. } | HelperError::Io { .. } => HelperFailureKind::Io,
        }
    }

    /// Timeouts and garbled output may succeed on a second attempt.
    /// Signal kills (usually OOM) and application errors will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            HelperFailureKind::Timeout | HelperFailureKind::UnparsableOutput
        )
    }

    /// Invocation context, absent for spawn/IO failures
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            HelperError::Application { context, .. }
            | HelperError::Timeout { context, .. }
            | HelperError::Signaled { context, .. }
            | HelperError::UnparsableOutput { context, .. } => Some(context),
            HelperError::Spawn { .. } | HelperError::Io { .. } => None,
        }
    }
}

impl From<std::io::Error> for HelperError {
    fn from(source: std::io::Error) -> Self {
        HelperError::Io { source }
    }
}

impl UpdateError {
    /// Creates a new OldTextNotFound error
    pub fn old_text_not_found(
        file: impl Into<String>,
        dependency: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        UpdateError::OldTextNotFound {
            file: file.into(),
            dependency: dependency.into(),
            expected: expected.into(),
        }
    }
}

impl RegistryError {
    /// Creates a new PackageNotFound error
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Creates a new NetworkError
    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    /// Creates a new Timeout error
    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }

    /// Network failures, timeouts and rate limits are transient
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::NetworkError { .. }
                | RegistryError::Timeout { .. }
                | RegistryError::RateLimitExceeded { .. }
        )
    }
}
