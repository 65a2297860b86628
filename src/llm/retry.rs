//! Bounded exponential backoff around a single remote call.
//!
//! Only [`GenerationError::Transient`] failures are retried. Each attempt may
//! be capped by a timeout, and a [`Cancellation`] aborts either the in-flight
//! attempt or the pending backoff.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::GenerationError;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based) is `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Upper bound on a single attempt. Expiry counts as a transient failure.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(800),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before the retry that follows attempt `attempt` (0-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use quizgen::llm::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(800));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(3200));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Runs `op` until it succeeds, fails permanently, exhausts the retry
    /// budget, or `cancel` fires. `op` receives the 0-based attempt index.
    ///
    /// After the budget is spent the last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, cancel: &Cancellation, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                result = self.attempt(op(attempt)) => result,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, backing off"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T, GenerationError>
    where
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        match self.attempt_timeout {
            None => fut.await,
            Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(GenerationError::Transient {
                    status: None,
                    message: format!("attempt timeout after {}ms", limit.as_millis()),
                })
            }),
        }
    }
}

/// Receiving half of a cancellation signal.
///
/// Cloneable; every clone observes the same signal. [`Cancellation::never`]
/// yields a handle that never fires.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending half of a cancellation signal.
#[derive(Debug)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Cancellation {
    /// Creates a linked sender/receiver pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use quizgen::llm::Cancellation;
    ///
    /// let (canceller, cancellation) = Cancellation::pair();
    /// assert!(!cancellation.is_cancelled());
    /// canceller.cancel();
    /// assert!(cancellation.is_cancelled());
    /// ```
    pub fn pair() -> (Canceller, Self) {
        let (tx, rx) = watch::channel(false);
        (Canceller { tx }, Self { rx: Some(rx) })
    }

    /// A handle that is never cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Pends forever if the sender
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Canceller {
    /// Signals every linked [`Cancellation`].
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
