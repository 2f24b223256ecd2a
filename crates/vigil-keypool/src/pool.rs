//! Round-robin credential pool.
//!
//! Availability is optimistic: a credential may be leased to several
//! callers at once. The pool only guarantees that a credential leaves
//! rotation after `max_failures` capacity failures and comes back once the
//! cooldown has elapsed. Every mutation is a short synchronous critical
//! section; no lock is held across an await.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use vigil_types::{elapsed_between, Clock, SystemClock};

use crate::classify::UpstreamError;
use crate::config::PoolConfig;
use crate::credential::{Credential, CredentialLease, CredentialStatus, Secret};
use crate::error::{KeyPoolError, KeyPoolResult};
use crate::source::CredentialSource;

#[derive(Debug)]
struct PoolState {
    credentials: Vec<Credential>,
    cursor: usize,
}

/// Shared pool of AI credentials.
pub struct KeyPool {
    state: Mutex<PoolState>,
    pub(crate) config: PoolConfig,
    clock: Arc<dyn Clock>,
}

impl KeyPool {
    /// Build a pool from labelled secrets, in rotation order.
    pub fn new(credentials: Vec<(String, Secret)>, config: PoolConfig, clock: Arc<dyn Clock>) -> Self {
        let credentials = credentials
            .into_iter()
            .map(|(label, secret)| Credential::new(label, secret))
            .collect();
        Self {
            state: Mutex::new(PoolState {
                credentials,
                cursor: 0,
            }),
            config,
            clock,
        }
    }

    /// Load a pool from a source, failing when it yields nothing.
    pub fn from_source(
        source: &CredentialSource,
        config: PoolConfig,
        clock: Arc<dyn Clock>,
    ) -> KeyPoolResult<Self> {
        let credentials = source.load_env();
        if credentials.is_empty() {
            return Err(KeyPoolError::NoCredentials {
                prefix: source.prefix().to_string(),
                max: source.max_fallbacks(),
            });
        }
        info!(prefix = %source.prefix(), credentials = credentials.len(), "Credential pool loaded");
        Ok(Self::new(credentials, config, clock))
    }

    /// Pool over bare secrets labelled `primary`, `fallback-1`, ...
    pub fn from_secrets<I, S>(secrets: I, config: PoolConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = secrets
            .into_iter()
            .enumerate()
            .map(|(i, secret)| {
                let label = if i == 0 {
                    "primary".to_string()
                } else {
                    format!("fallback-{}", i)
                };
                (label, Secret::new(secret))
            })
            .collect();
        Self::new(credentials, config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lease the next available credential.
    ///
    /// Unavailable credentials whose cooldown has elapsed are re-admitted
    /// first. The cursor advances by one on every call, found or not.
    pub fn acquire(&self) -> Option<CredentialLease> {
        let now = self.clock.now();
        let cooldown = self.config.cooldown;
        let mut state = self.lock();

        for credential in state.credentials.iter_mut().filter(|c| !c.available) {
            let rested = credential
                .last_used_at
                .map(|at| elapsed_between(at, now) >= cooldown)
                .unwrap_or(true);
            if rested {
                credential.available = true;
                credential.failure_count = 0;
                info!(credential = %credential.label, "Credential re-admitted after cooldown");
            }
        }

        let total = state.credentials.len();
        if total == 0 {
            return None;
        }
        let start = state.cursor % total;
        state.cursor = (start + 1) % total;

        for offset in 0..total {
            let credential = &mut state.credentials[(start + offset) % total];
            if credential.available {
                credential.last_used_at = Some(now);
                debug!(credential = %credential.label, "Credential acquired");
                return Some(credential.lease());
            }
        }

        warn!(credentials = total, "No credential available");
        None
    }

    /// Mark a credential healthy.
    pub fn report_success(&self, label: &str) -> KeyPoolResult<()> {
        let mut state = self.lock();
        let credential = find(&mut state, label)?;
        credential.failure_count = 0;
        credential.last_error = None;
        credential.available = true;
        Ok(())
    }

    /// Count a capacity failure against a credential.
    pub fn report_failure(&self, label: &str, error: &UpstreamError) -> KeyPoolResult<()> {
        let now = self.clock.now();
        let max_failures = self.config.max_failures;
        let mut state = self.lock();
        let credential = find(&mut state, label)?;

        credential.failure_count += 1;
        credential.last_error = Some(error.to_string());
        if credential.failure_count >= max_failures && credential.available {
            credential.available = false;
            credential.last_used_at = Some(now);
            warn!(
                credential = %credential.label,
                failures = credential.failure_count,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Credential taken out of rotation"
            );
        }
        Ok(())
    }

    /// Masked snapshot of every credential.
    pub fn status(&self) -> Vec<CredentialStatus> {
        self.lock().credentials.iter().map(Credential::status).collect()
    }

    /// Snapshot of one credential.
    pub fn credential(&self, label: &str) -> Option<CredentialStatus> {
        self.lock()
            .credentials
            .iter()
            .find(|c| c.label == label)
            .map(Credential::status)
    }
}

fn find<'a>(state: &'a mut PoolState, label: &str) -> KeyPoolResult<&'a mut Credential> {
    state
        .credentials
        .iter_mut()
        .find(|c| c.label == label)
        .ok_or_else(|| KeyPoolError::UnknownCredential(label.to_string()))
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("credentials", &self.status())
            .field("config", &self.config)
            .finish()
    }
}
