//! depcore - ecosystem-agnostic dependency update framework
//!
//! This library provides the pieces every package-manager integration
//! plugs into:
//! - Version and constraint model (semantic, calendar, git-ref, channel, ordinal)
//! - Dependency data model (Dependency, Requirement, DependencyFile, DependencySet)
//! - Ecosystem registry mapping names to stage implementations
//! - Pipeline contracts: fetch → parse → check → update
//! - Sandboxed helper-process protocol
//! - Source/provider model

pub mod config;
pub mod domain;
pub mod ecosystem;
pub mod error;
pub mod helper;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod version;

pub use error::{CoreError, Result};
