//! Caller-side retry for transient infrastructure failures

use crate::config::HelperSettings;
use crate::error::{CoreError, HelperError, RegistryError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Base delay for exponential backoff (in milliseconds)
const BASE_DELAY_MS: u64 = 100;

/// Errors that know whether a second attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for CoreError {
    fn is_retryable(&self) -> bool {
        CoreError::is_retryable(self)
    }
}

impl Retryable for HelperError {
    fn is_retryable(&self) -> bool {
        HelperError::is_retryable(self)
    }
}

impl Retryable for RegistryError {
    fn is_retryable(&self) -> bool {
        RegistryError::is_retryable(self)
    }
}

/// How often and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl From<&HelperSettings> for RetryPolicy {
    fn from(settings: &HelperSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            ..Self::default()
        }
    }
}

/// Run `op`, retrying retryable errors with doubling delays
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                debug!("Attempt {} failed ({}), retrying in {:?}", attempt + 1, e, delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
