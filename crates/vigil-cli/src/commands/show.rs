//! `vigil config`

use crate::config::VigilConfig;

pub fn execute(config: &VigilConfig) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
