mod config;

pub use config::{Config, FeedConfig, LocationConfig, MonitorSection, NotificationsConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding `config.toml`.
///
/// `ISSNEAR_HOME` wins when set. Otherwise `~/.config/issnear[-dev]/`,
/// with `ISSNEAR_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ISSNEAR_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("ISSNEAR_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("issnear-dev")
            } else {
                base_dir.join("issnear")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
