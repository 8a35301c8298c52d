mod env;
mod loader;
mod types;
pub mod validation;

pub use env::{resolve_config_path, resolve_data_dir, CONFIG_PATH_ENV, DATA_DIR_ENV};
pub use loader::{load_config_from_file, load_config_from_str};
pub use types::*;

use crate::foundation::Result;

/// Resolves the data dir and config path from the environment, then loads.
pub fn load_config_from_env() -> Result<TssConfig> {
    let data_dir = resolve_data_dir()?;
    load_config_from_file(&resolve_config_path(&data_dir))
}
