//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (`TSS_` prefix, `__` separates sections)

use crate::foundation::{Result, TssError};
use crate::infrastructure::config::types::TssConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::{debug, info};
use std::path::Path;

/// Example: `TSS_SESSION__KEYSIGN_TIMEOUT_SECS` -> `session.keysign_timeout_secs`
const ENV_PREFIX: &str = "TSS_";

pub fn load_config_from_file(path: &Path) -> Result<TssConfig> {
    info!("loading configuration path={}", path.display());
    let mut figment = Figment::new().merge(Serialized::defaults(TssConfig::default()));
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!("configuration file missing; using defaults and env only path={}", path.display());
    }
    extract(figment)
}

pub fn load_config_from_str(toml: &str) -> Result<TssConfig> {
    // Surface TOML syntax errors with the parser's message before layering.
    let _: toml::Value = toml::from_str(toml)?;
    extract(Figment::new().merge(Serialized::defaults(TssConfig::default())).merge(Toml::string(toml)))
}

fn extract(figment: Figment) -> Result<TssConfig> {
    let config: TssConfig = figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
    config.validate().map_err(|errors| TssError::ConfigError(format!("validation failed: {:?}", errors)))?;
    debug!(
        "configuration loaded join_party_timeout_secs={} keysign_timeout_secs={} max_payload_bytes={} base_dir={}",
        config.party.join_party_timeout_secs,
        config.session.keysign_timeout_secs,
        config.transport.max_payload_bytes,
        config.storage.base_dir
    );
    Ok(config)
}
