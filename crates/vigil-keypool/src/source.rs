//! Ordered credential sources.
//!
//! A pool is loaded from a primary entry plus numbered fallbacks:
//! `<PREFIX>`, `<PREFIX>_1`, ..., `<PREFIX>_N`. Blank values and duplicates
//! are skipped, order is preserved.

use tracing::debug;

use crate::credential::Secret;

/// Default number of numbered fallbacks looked up.
pub const DEFAULT_MAX_FALLBACKS: usize = 9;

/// Where credentials are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    prefix: String,
    max_fallbacks: usize,
}

impl CredentialSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            max_fallbacks: DEFAULT_MAX_FALLBACKS,
        }
    }

    pub fn with_max_fallbacks(mut self, max_fallbacks: usize) -> Self {
        self.max_fallbacks = max_fallbacks;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_fallbacks(&self) -> usize {
        self.max_fallbacks
    }

    /// Entry names in lookup order, paired with their pool labels.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![(self.prefix.clone(), "primary".to_string())];
        for n in 1..=self.max_fallbacks {
            entries.push((format!("{}_{}", self.prefix, n), format!("fallback-{}", n)));
        }
        entries
    }

    /// Load `(label, secret)` pairs through an arbitrary lookup.
    pub fn load_with<F>(&self, lookup: F) -> Vec<(String, Secret)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut seen: Vec<String> = Vec::new();
        let mut loaded = Vec::new();

        for (name, label) in self.entries() {
            let Some(value) = lookup(&name) else {
                continue;
            };
            let value = value.trim().to_string();
            if value.is_empty() {
                debug!(entry = %name, "Skipping blank credential entry");
                continue;
            }
            if seen.contains(&value) {
                debug!(entry = %name, "Skipping duplicate credential entry");
                continue;
            }
            seen.push(value.clone());
            loaded.push((label, Secret::new(value)));
        }

        loaded
    }

    /// Load from process environment variables.
    pub fn load_env(&self) -> Vec<(String, Secret)> {
        self.load_with(|name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn loads_primary_and_fallbacks_in_order() {
        let vars = HashMap::from([
            ("VIGIL_AI_KEY", "key-primary-0001"),
            ("VIGIL_AI_KEY_1", "  "),
            ("VIGIL_AI_KEY_2", "key-second-0002"),
            ("VIGIL_AI_KEY_3", "key-primary-0001"),
            ("VIGIL_AI_KEY_5", "key-fifth-0005"),
        ]);
        let loaded = CredentialSource::new("VIGIL_AI_KEY")
            .load_with(|name| vars.get(name).map(|v| v.to_string()));
        let labels: Vec<_> = loaded.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["primary", "fallback-2", "fallback-5"]);
        assert_eq!(loaded[1].1.expose(), "key-second-0002");
    }

    #[test]
    fn fallback_limit_is_respected() {
        let source = CredentialSource::new("K").with_max_fallbacks(2);
        let loaded = source.load_with(|name| Some(format!("{}-secret", name)));
        assert_eq!(loaded.len(), 3);
        assert_eq!(source.entries().last().map(|e| e.0.as_str()), Some("K_2"));
    }
}
