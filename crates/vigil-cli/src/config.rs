//! Configuration for the vigil CLI

use serde::{Deserialize, Serialize};
use vigil_keypool::{CredentialSource, PoolConfig, DEFAULT_MAX_FALLBACKS};
use vigil_proctor::ProctorConfig;
use vigil_session::SessionConfig;

/// Environment prefix for configuration overrides.
const ENV_PREFIX: &str = "VIGIL";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Detection, aggregation and escalation
    #[serde(default)]
    pub proctor: ProctorConfig,

    /// Attempt lifecycle
    #[serde(default)]
    pub session: SessionConfig,

    /// Credential failover
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Where AI credentials are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Variable holding the primary credential; fallbacks are `<prefix>_<n>`
    #[serde(default = "default_credential_prefix")]
    pub env_prefix: String,

    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: usize,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_credential_prefix(),
            max_fallbacks: DEFAULT_MAX_FALLBACKS,
        }
    }
}

impl CredentialsConfig {
    pub fn source(&self) -> CredentialSource {
        CredentialSource::new(self.env_prefix.clone()).with_max_fallbacks(self.max_fallbacks)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_credential_prefix() -> String {
    "VIGIL_AI_KEY".to_string()
}

fn default_max_fallbacks() -> usize {
    DEFAULT_MAX_FALLBACKS
}

impl VigilConfig {
    /// Load configuration: defaults, then the optional file, then `VIGIL_`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&VigilConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config
            .proctor
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}
