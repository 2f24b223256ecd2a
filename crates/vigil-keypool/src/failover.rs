//! Failover execution over the pool.

use std::collections::BTreeSet;
use std::future::Future;

use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, UpstreamError};
use crate::credential::CredentialLease;
use crate::error::{KeyPoolError, KeyPoolResult};
use crate::pool::KeyPool;

impl KeyPool {
    /// Run `op` with the configured number of attempts.
    pub async fn run_with_failover<T, F, Fut>(&self, op: F) -> KeyPoolResult<T>
    where
        F: FnMut(CredentialLease) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.run_with_failover_attempts(op, self.config.max_attempts)
            .await
    }

    /// Run `op` against leased credentials, rotating on capacity failures.
    ///
    /// Capacity failures are reported against the credential, followed by a
    /// linear backoff (`attempt × backoff_step`) before the next attempt.
    /// Any other failure propagates at once.
    #[instrument(skip(self, op), fields(credentials = self.len()))]
    pub async fn run_with_failover_attempts<T, F, Fut>(
        &self,
        mut op: F,
        max_attempts: u32,
    ) -> KeyPoolResult<T>
    where
        F: FnMut(CredentialLease) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut tried: BTreeSet<String> = BTreeSet::new();
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            let lease = self.acquire().ok_or(KeyPoolError::PoolExhausted)?;
            let label = lease.label.clone();
            tried.insert(label.clone());

            match op(lease).await {
                Ok(value) => {
                    self.report_success(&label)?;
                    if attempt > 1 {
                        info!(credential = %label, attempt, "Operation succeeded after failover");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let class = classify(&error);
                    if !class.is_capacity() {
                        warn!(credential = %label, class = %class, error = %error, "Non-retryable upstream failure");
                        return Err(KeyPoolError::Upstream {
                            class,
                            source: error,
                        });
                    }

                    self.report_failure(&label, &error)?;
                    warn!(
                        credential = %label,
                        class = %class,
                        attempt,
                        max_attempts,
                        "Capacity failure, rotating credential"
                    );
                    last_failure = Some((class, error));

                    if attempt < max_attempts {
                        let backoff = self.config.backoff_step * attempt;
                        debug!(backoff_ms = backoff.as_millis() as u64, "Backing off");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        match last_failure {
            Some((class, last_error)) => Err(KeyPoolError::Exhausted {
                class,
                tried: tried.len(),
                attempts: max_attempts,
                last_error,
            }),
            None => Err(KeyPoolError::PoolExhausted),
        }
    }
}
