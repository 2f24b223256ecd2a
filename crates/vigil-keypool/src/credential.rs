//! Credentials, leases and masked status snapshots.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Replace all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

/// A secret that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Arc<str>);

impl Secret {
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    /// The raw value, for the upstream call only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        mask_secret(&self.0)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", self.masked())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// A pooled credential and its health.
#[derive(Debug, Clone)]
pub struct Credential {
    pub(crate) label: String,
    pub(crate) secret: Secret,
    pub(crate) available: bool,
    pub(crate) failure_count: u32,
    pub(crate) last_used_at: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
}

impl Credential {
    pub fn new(label: impl Into<String>, secret: Secret) -> Self {
        Self {
            label: label.into(),
            secret,
            available: true,
            failure_count: 0,
            last_used_at: None,
            last_error: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn lease(&self) -> CredentialLease {
        CredentialLease {
            label: self.label.clone(),
            secret: self.secret.clone(),
        }
    }

    pub(crate) fn status(&self) -> CredentialStatus {
        CredentialStatus {
            label: self.label.clone(),
            masked_secret: self.secret.masked(),
            available: self.available,
            failure_count: self.failure_count,
            last_used_at: self.last_used_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// What an operation receives for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialLease {
    pub label: String,
    pub secret: Secret,
}

impl CredentialLease {
    pub fn secret(&self) -> &str {
        self.secret.expose()
    }
}

/// Serializable, masked view of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub label: String,
    pub masked_secret: String,
    pub available: bool,
    pub failure_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_secret("AIzaSyD-abcdefgh1234"), "****1234");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret(""), "****");
    }

    #[test]
    fn secret_never_prints_raw() {
        let secret = Secret::new("sk-live-0123456789wxyz");
        assert_eq!(format!("{}", secret), "****wxyz");
        assert_eq!(format!("{:?}", secret), "Secret(****wxyz)");
        let lease = Credential::new("primary", secret).lease();
        assert!(!format!("{:?}", lease).contains("0123456789"));
        assert_eq!(lease.secret(), "sk-live-0123456789wxyz");
    }
}
