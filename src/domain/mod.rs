//! Core domain models shared by every pipeline stage
//!
//! - Dependency and Requirement describe what a manifest declares
//! - DependencyFile is an immutable snapshot of a fetched file
//! - DependencySet merges repeated declarations of one package

mod dependency;
mod dependency_file;
mod dependency_set;
mod requirement;

pub use dependency::Dependency;
pub use dependency_file::{DependencyFile, FileContent, FileType};
pub use dependency_set::DependencySet;
pub use requirement::{Requirement, RequirementSource, SourceKind};
