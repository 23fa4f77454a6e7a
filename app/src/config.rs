use directories::ProjectDirs;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Oldest undo entries are dropped past this many.
    pub history_limit: Option<usize>,
    /// Write target files after every `run`.
    pub save_targets: bool,
    /// Pretty-print JSON bundles written by `pack`.
    pub pretty_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_limit: Some(200),
            save_targets: true,
            pretty_json: true,
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("org", "treeflow", "treeflow") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            if let Err(e) = fs::create_dir_all(config_dir) {
                error!("Failed to create config directory: {}", e);
                return None;
            }
        }
        return Some(config_dir.join("config.toml"));
    }
    None
}

pub fn save_config(config: &AppConfig) {
    if let Some(path) = get_config_path() {
        match toml::to_string_pretty(config) {
            Ok(toml_str) => {
                if let Err(e) = fs::write(&path, toml_str) {
                    error!("Failed to write config file: {}", e);
                } else {
                    info!("Config saved to {}", path.display());
                }
            }
            Err(e) => {
                error!("Failed to serialize config: {}", e);
            }
        }
    }
}

/// Reads `path`, or the per-user config file when none is given.
pub fn load_config(path: Option<&PathBuf>) -> AppConfig {
    let path = match path.cloned().or_else(get_config_path) {
        Some(path) => path,
        None => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match fs::read_to_string(&path) {
        Ok(toml_str) => match toml::from_str(&toml_str) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file, using defaults: {}", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config file, using defaults: {}", e);
            AppConfig::default()
        }
    }
}
