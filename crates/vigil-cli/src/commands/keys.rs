//! `vigil keys`

use std::sync::Arc;

use vigil_keypool::KeyPool;
use vigil_types::SystemClock;

use crate::config::VigilConfig;

/// Print the credential pool as JSON. Secrets are masked.
pub fn execute(config: &VigilConfig) -> anyhow::Result<()> {
    let source = config.credentials.source();
    let pool = KeyPool::from_source(&source, config.pool.clone(), Arc::new(SystemClock))?;
    println!("{}", serde_json::to_string_pretty(&pool.status())?);
    Ok(())
}
