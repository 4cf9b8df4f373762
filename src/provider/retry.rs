//! Retry decorator for generation providers
//!
//! Wraps any `Embedder` / `Completer` and retries transient provider
//! failures with exponential backoff. With `max_retries = 0` (the default)
//! every call is made exactly once.

use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use tracing::warn;

use crate::config::RetryConfig;
use crate::core::{Completer, Embedder};
use crate::error::Result;

/// Provider wrapped in a retry policy
pub struct Retrying<P> {
    inner: P,
    policy: RetryConfig,
}

impl<P> Retrying<P> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: P, policy: RetryConfig) -> Self {
        Retrying { inner, policy }
    }

    /// The wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_interval)
            .with_max_interval(self.policy.max_interval)
            .with_max_elapsed_time(None)
            .build()
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.policy.max_retries;
        if max_retries == 0 {
            return f().await;
        }

        let mut attempt = 0u32;
        backoff::future::retry(self.backoff(), || {
            attempt += 1;
            let current = attempt;
            let fut = f();
            async move {
                fut.await.map_err(|e| {
                    if e.is_retryable() && current <= max_retries {
                        warn!(operation, attempt = current, error = %e, "Retrying provider call");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}

#[async_trait]
impl<P: Embedder> Embedder for Retrying<P> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }

    async fn generate_vector(&self, text: &str) -> Result<Vec<f32>> {
        self.call("generate_vector", || self.inner.generate_vector(text))
            .await
    }
}

#[async_trait]
impl<P: Completer> Completer for Retrying<P> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate_completion(&self, prompt: &str) -> Result<String> {
        self.call("generate_completion", || self.inner.generate_completion(prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the given error until `failures` calls have been made
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        retryable: bool,
    }

    impl Flaky {
        fn new(failures: u32, retryable: bool) -> Self {
            Flaky {
                calls: AtomicU32::new(0),
                failures,
                retryable,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for Flaky {
        fn model(&self) -> &str {
            "flaky"
        }

        async fn generate_vector(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(if self.retryable {
                    Error::provider_transient("503")
                } else {
                    Error::provider("400")
                });
            }
            Ok(vec![1.0, 0.0])
        }
    }

    fn policy(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let provider = Retrying::new(Flaky::new(1, true), RetryConfig::default());
        assert!(provider.generate_vector("x").await.is_err());
        assert_eq!(provider.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let provider = Retrying::new(Flaky::new(2, true), policy(3));
        assert_eq!(provider.generate_vector("x").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(provider.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provider = Retrying::new(Flaky::new(10, true), policy(2));
        assert!(provider.generate_vector("x").await.is_err());
        assert_eq!(provider.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let provider = Retrying::new(Flaky::new(1, false), policy(3));
        let err = provider.generate_vector("x").await.unwrap_err();
        assert!(matches!(err, Error::Provider { retryable: false, .. }));
        assert_eq!(provider.inner().calls(), 1);
    }
}
