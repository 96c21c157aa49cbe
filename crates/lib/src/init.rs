//! Initialize the configuration directory: create `~/.masala` and a default `config.json`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Create the config directory and write the default config if the file does not exist.
/// Credentials are left out; supply them through DISCORD_TOKEN and GEMINI_API_KEY.
/// Returns the config directory and whether a new file was written.
pub fn init_config_dir(config_path: &Path) -> Result<(PathBuf, bool)> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
        return Ok((config_dir.to_path_buf(), false));
    }
    let default_config =
        serde_json::to_string_pretty(&Config::default()).context("serializing default config")?;
    std::fs::write(config_path, default_config)
        .with_context(|| format!("writing default config to {}", config_path.display()))?;
    log::info!("created default config at {}", config_path.display());
    Ok((config_dir.to_path_buf(), true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn writes_default_config_once() {
        let dir = std::env::temp_dir().join(format!("masala-init-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("config.json");

        let (created_dir, written) = init_config_dir(&path).unwrap();
        assert!(written);
        assert_eq!(created_dir, dir.join("nested"));
        let (config, _) = load_config(Some(path.clone())).unwrap();
        assert_eq!(config.keep_alive.port, 8080);
        assert!(config.discord.token.is_none());

        std::fs::write(&path, br#"{"keepAlive":{"port":9999}}"#).unwrap();
        let (_, written) = init_config_dir(&path).unwrap();
        assert!(!written);
        let (config, _) = load_config(Some(path)).unwrap();
        assert_eq!(config.keep_alive.port, 9999);
    }
}
