//! Retry wrapper for unreliable providers.

use super::{SecretError, SecretProvider};
use crate::engine::RootSecret;
use std::time::Duration;

/// Retries an inner provider a fixed number of times.
///
/// Once the budget is spent the last error is returned wrapped in
/// [`SecretError::Exhausted`].
#[derive(Debug, Clone)]
pub struct RetryingProvider<P> {
    inner: P,
    attempts: u32,
    delay: Duration,
}

impl<P: SecretProvider> RetryingProvider<P> {
    /// Wraps `inner` with `attempts` tries (at least one) spaced by `delay`.
    pub fn new(inner: P, attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Unwraps the inner provider.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: SecretProvider> SecretProvider for RetryingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&mut self) -> Result<RootSecret, SecretError> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch() {
                Ok(secret) => return Ok(secret),
                Err(e) if attempt >= self.attempts => {
                    tracing::error!(
                        provider = self.inner.name(),
                        attempts = attempt,
                        error = %e,
                        "Secret provider exhausted"
                    );
                    return Err(SecretError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.inner.name(),
                        attempt,
                        max = self.attempts,
                        error = %e,
                        "Secret fetch failed, retrying"
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
            }
        }
    }
}
