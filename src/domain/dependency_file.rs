//! Immutable snapshots of fetched manifest and lock files

use serde::{Deserialize, Serialize};
use std::fmt;

/// File content as fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum FileContent {
    /// UTF-8 text
    Text(String),
    /// Decoded binary content
    Binary(Vec<u8>),
}

impl FileContent {
    /// Raw bytes of the content
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(s) => s.as_bytes(),
            FileContent::Binary(b) => b,
        }
    }
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        FileContent::Text(s)
    }
}

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        FileContent::Text(s.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => FileContent::Text(s),
            Err(e) => FileContent::Binary(e.into_bytes()),
        }
    }
}

/// Kind of tree entry the file was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Regular file
    #[default]
    File,
    /// Git submodule
    Submodule,
    /// Symbolic link
    Symlink,
}

/// A dependency file at a specific commit.
///
/// Values are never edited in place; updates produce new values through
/// [`DependencyFile::with_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFile {
    name: String,
    directory: String,
    content: FileContent,
    support_file: bool,
    #[serde(rename = "type")]
    file_type: FileType,
    deleted: bool,
}

impl DependencyFile {
    /// Creates a regular file in the root directory
    pub fn new(name: impl Into<String>, content: impl Into<FileContent>) -> Self {
        Self {
            name: name.into(),
            directory: "/".to_string(),
            content: content.into(),
            support_file: false,
            file_type: FileType::File,
            deleted: false,
        }
    }

    /// Sets the directory (builder pattern)
    pub fn in_directory(mut self, directory: &str) -> Self {
        self.directory = normalize_directory(directory);
        self
    }

    /// Marks the file as a support file (builder pattern)
    pub fn as_support_file(mut self) -> Self {
        self.support_file = true;
        self
    }

    /// Sets the tree entry kind (builder pattern)
    pub fn with_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    /// New snapshot of the same file with different content
    pub fn with_content(&self, content: impl Into<FileContent>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    /// New snapshot marking the file as deleted
    pub fn deleted(&self) -> Self {
        Self {
            content: FileContent::Text(String::new()),
            deleted: true,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// Text content, None for binary files
    pub fn content_text(&self) -> Option<&str> {
        match &self.content {
            FileContent::Text(s) => Some(s),
            FileContent::Binary(_) => None,
        }
    }

    pub fn is_support_file(&self) -> bool {
        self.support_file
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Repository-relative path without a leading slash
    pub fn path(&self) -> String {
        clean_path(&format!("{}/{}", self.directory, self.name))
            .trim_start_matches('/')
            .to_string()
    }
}

impl fmt::Display for DependencyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

fn normalize_directory(directory: &str) -> String {
    clean_path(&format!("/{}", directory))
}

/// Resolve `.`/`..` components and duplicate slashes
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}
