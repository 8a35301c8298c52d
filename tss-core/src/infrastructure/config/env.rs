use crate::foundation::Result;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "TSS_CONFIG_PATH";
pub const DATA_DIR_ENV: &str = "TSS_DATA_DIR";

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let cwd = std::env::current_dir().map_err(|err| crate::storage_err!("env::current_dir", err))?;
    Ok(cwd.join(".tss"))
}

pub fn resolve_config_path(data_dir: &Path) -> PathBuf {
    non_empty_env(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|| data_dir.join("tss-config.toml"))
}
