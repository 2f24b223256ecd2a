//! # Vigil Keypool - AI Credential Rotation
//!
//! Keeps AI-backed operations (quiz generation, integrity re-checks)
//! available despite per-credential rate limits.
//!
//! - [`KeyPool::acquire`] leases credentials round-robin, re-admitting
//!   rested ones after the cooldown
//! - [`KeyPool::run_with_failover`] retries capacity failures on the next
//!   credential with linear backoff and propagates everything else
//! - [`classify`] sorts upstream failures into overload, quota, auth, unknown
//! - [`CredentialSource`] loads `<PREFIX>`, `<PREFIX>_1` ... `<PREFIX>_N`
//!
//! The pool is an owned value shared through an `Arc`; there is no global.
//!
//! ```rust
//! use vigil_keypool::{KeyPool, PoolConfig};
//!
//! let pool = KeyPool::from_secrets(["key-a-1111", "key-b-2222"], PoolConfig::default());
//! let lease = pool.acquire().unwrap();
//! assert_eq!(lease.label, "primary");
//! assert_eq!(pool.status()[0].masked_secret, "****1111");
//! ```

#![deny(unsafe_code)]

pub mod classify;
pub mod config;
pub mod credential;
pub mod error;
pub mod failover;
pub mod pool;
pub mod source;

pub use classify::{classify, ErrorClass, UpstreamError};
pub use config::PoolConfig;
pub use credential::{mask_secret, Credential, CredentialLease, CredentialStatus, Secret};
pub use error::{KeyPoolError, KeyPoolResult};
pub use pool::KeyPool;
pub use source::{CredentialSource, DEFAULT_MAX_FALLBACKS};
