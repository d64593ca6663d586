//! Sandboxed helper protocol
//!
//! Ecosystem-specific resolution runs in a separate process that speaks one
//! JSON request and one JSON response over stdio:
//! - [`HelperRunner`] is the parent side: temp-dir scoping, hard timeouts,
//!   signal detection and error classification
//! - [`serve`] is the child side for helpers written in Rust
//! - [`retry_with_backoff`] retries the infrastructure failures worth retrying

mod protocol;
mod retry;
mod runner;
mod server;

pub use protocol::{HelperRequest, HelperResponse};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
pub use runner::{HelperCommand, HelperRunner};
pub use server::{serve, Deadline, HelperFailure, HelperFunctions, TIMEOUT_ERROR_CLASS};
