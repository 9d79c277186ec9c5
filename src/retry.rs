//! Generic retry-with-backoff helper (spec §4.7 step 3, §7: "retried
//! locally within the claim/submit helper, up to 3 attempts").
//!
//! Grounded on the teacher's `retry.rs` (`IsRetryable`/`download_with_retry`
//! and the jittered-exponential-backoff loop shape); the retryability
//! classification itself is rewritten against the new `Error`/`SeedboxError`
//! enums rather than the teacher's NNTP-specific variants.
//!
//! # Example
//!
//! ```no_run
//! use rssbox::retry::{with_retry, RetryConfig};
//! use rssbox::error::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     Ok::<String, Error>("success".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, SeedboxError};
use std::future::Future;
use std::time::Duration;

/// Backoff parameters for [`with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    /// §7's default of 3 attempts, starting at 1s and doubling up to 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Whether an error is worth retrying locally, as opposed to surfacing to
/// the caller (who, for a Download/Account, will release the lock instead).
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Seedbox(e) => e.is_retryable(),
            Error::Database(_) | Error::Sqlx(_) => false,
            Error::FileHandler(_) => false,
            Error::Hash(_) => false,
            Error::Config { .. } => false,
            Error::NotFound => false,
            Error::ShuttingDown => false,
            Error::Serialization(_) => false,
            Error::Other(_) => false,
        }
    }
}

impl IsRetryable for SeedboxError {
    fn is_retryable(&self) -> bool {
        self.is_retryable()
    }
}

/// Run `operation` until it succeeds, a non-retryable error is returned, or
/// `config.max_attempts` retries are exhausted. Returns the last error in
/// the latter two cases.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                let jittered_delay = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt + 1, "retries exhausted");
                } else {
                    tracing::error!(error = %e, "non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter uniformly distributed between 0% and 100% of `delay`,
/// so the actual wait is between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(2), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3, "initial attempt + 2 retries");
    }

    #[tokio::test]
    async fn never_retries_a_permanent_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(5), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Permanent)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backoff_delays_increase_and_respect_max_delay() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(60),
            backoff_multiplier: 10.0,
            jitter: false,
        };

        let timestamps = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let ts_clone = timestamps.clone();

        let _result = with_retry(&config, || {
            let ts = ts_clone.clone();
            async move {
                ts.lock().await.push(std::time::Instant::now());
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        let ts = timestamps.lock().await;
        assert_eq!(ts.len(), 5, "initial + 4 retries");

        let gap1 = ts[1].duration_since(ts[0]);
        let gap3 = ts[3].duration_since(ts[2]);
        assert!(gap1 >= Duration::from_millis(15) && gap1 < Duration::from_millis(100));
        // without capping gap3 would be ~2000ms; the cap keeps it near max_delay
        assert!(gap3 < Duration::from_millis(150), "gap3 {gap3:?} should be capped near max_delay");
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = Duration::from_millis(50);
        for _ in 0..200 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay);
            assert!(jittered <= delay * 2);
        }
    }

    #[test]
    fn io_connection_errors_are_retryable() {
        let reset = Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(reset.is_retryable());
        let not_found = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "nf"));
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn seedbox_transient_is_retryable_others_are_not() {
        assert!(Error::Seedbox(SeedboxError::Transient("timeout".into())).is_retryable());
        assert!(!Error::Seedbox(SeedboxError::TooLarge("huge".into())).is_retryable());
        assert!(!Error::Seedbox(SeedboxError::AuthFailed("bad creds".into())).is_retryable());
    }

    #[test]
    fn database_and_hash_errors_are_not_retryable() {
        assert!(!Error::NotFound.is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(!Error::Other("mystery".to_string()).is_retryable());
    }
}
