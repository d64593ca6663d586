//! FETCH stage: retrieving dependency files from source control

use super::Credential;
use crate::domain::DependencyFile;
use crate::error::{CoreError, DependencyFileError, ProviderError, Result};
use crate::source::Source;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Read-only source-control API supplied by a provider client
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Raw bytes of `path` at `commit`
    async fn fetch_file_content(
        &self,
        repo: &str,
        path: &str,
        commit: &str,
    ) -> Result<Vec<u8>, ProviderError>;

    /// HEAD commit of `branch`, or of the default branch when None
    async fn head_commit(&self, repo: &str, branch: Option<&str>) -> Result<String, ProviderError>;
}

/// Per-ecosystem file retrieval
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Pure applicability check over a directory listing
    fn required_files_in(&self, filenames: &[&str]) -> bool;

    /// Human-readable description of the files this fetcher needs
    fn required_files_message(&self) -> String;

    /// Retrieve the files, failing with `DependencyFileError::NotFound` for
    /// any required file that is absent
    async fn fetch_files(&self, ctx: &FetchContext) -> Result<Vec<DependencyFile>>;
}

/// Everything a fetcher may use during one run.
///
/// The commit is resolved once and reused, so every file comes from the
/// same snapshot.
pub struct FetchContext {
    source: Source,
    credentials: Vec<Credential>,
    client: Arc<dyn SourceControl>,
    commit: OnceCell<String>,
}

impl FetchContext {
    pub fn new(source: Source, client: Arc<dyn SourceControl>) -> Self {
        Self {
            source,
            credentials: Vec::new(),
            client,
            commit: OnceCell::new(),
        }
    }

    /// Sets the credentials (builder pattern)
    pub fn with_credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    /// Commit all files are fetched at
    pub async fn commit(&self) -> Result<&str> {
        let commit = self
            .commit
            .get_or_try_init(|| async {
                if let Some(commit) = self.source.commit() {
                    return Ok::<String, CoreError>(commit.to_string());
                }
                let branch = self.source.branch();
                self.client
                    .head_commit(self.source.repo(), branch)
                    .await
                    .map_err(|e| -> CoreError {
                        match (e, branch) {
                            (ProviderError::NotFound { .. }, Some(branch)) => {
                                DependencyFileError::BranchNotFound {
                                    branch: branch.to_string(),
                                }
                                .into()
                            }
                            (e, _) => e.into(),
                        }
                    })
            })
            .await?;
        Ok(commit)
    }

    /// Fetch `name` relative to the source directory
    pub async fn fetch_file(&self, name: &str) -> Result<DependencyFile> {
        self.fetch(name, false).await
    }

    /// Fetch `name`, returning None when it does not exist
    pub async fn fetch_file_if_present(&self, name: &str) -> Result<Option<DependencyFile>> {
        match self.fetch(name, false).await {
            Ok(file) => Ok(Some(file)),
            Err(CoreError::DependencyFile(DependencyFileError::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch a file that is needed for resolution but never updated
    pub async fn fetch_support_file(&self, name: &str) -> Result<DependencyFile> {
        self.fetch(name, true).await
    }

    async fn fetch(&self, name: &str, support_file: bool) -> Result<DependencyFile> {
        let commit = self.commit().await?;
        let directory = self.source.directory().unwrap_or("/");
        let placeholder = DependencyFile::new(name, "").in_directory(directory);
        let path = placeholder.path();

        debug!("Fetching {} at {}", path, commit);
        let bytes = self
            .client
            .fetch_file_content(self.source.repo(), &path, commit)
            .await
            .map_err(|e| -> CoreError {
                match e {
                    ProviderError::NotFound { .. } => DependencyFileError::not_found(&path).into(),
                    other => other.into(),
                }
            })?;

        let file = placeholder.with_content(bytes);
        Ok(if support_file {
            file.as_support_file()
        } else {
            file
        })
    }
}
