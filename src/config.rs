use crate::model::Settings;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "lofi";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "lofi.log";
const NOISE_DIR: &str = "noise";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("LOFI_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(config_root()?.join(LOG_FILE))
}

/// Directory the noise assets are read from when `noise_base` is not configured.
pub fn default_noise_base() -> Result<String> {
    let dir = config_root()?.join(NOISE_DIR);
    Ok(format!("{}{}", dir.display(), std::path::MAIN_SEPARATOR))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path()?)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}
