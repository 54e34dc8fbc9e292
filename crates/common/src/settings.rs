// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Launcher UI preferences and their persistence

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which daemon notifications the front end should surface
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    #[default]
    ShowAll,
    SuppressAll,
    SuppressInfo,
}

/// Preferences owned by the launcher, not the daemon
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LauncherSettings {
    #[serde(default)]
    pub notification_mode: NotificationMode,
    #[serde(default)]
    pub log_text_wrapping: bool,
}

/// Load/save backend for [`LauncherSettings`]
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<LauncherSettings>;
    fn save(&self, settings: &LauncherSettings) -> Result<()>;
}

/// Settings stored as a TOML file
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config_dir>/tunnel-launcher/settings.toml`
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        Ok(Self::new(config_dir.join("tunnel-launcher").join("settings.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<LauncherSettings> {
        if !self.path.exists() {
            return Ok(LauncherSettings::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn save(&self, settings: &LauncherSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(settings)?)?;
        tracing::debug!("Saved launcher settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("settings.toml"));
        assert_eq!(store.load().unwrap(), LauncherSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::new(dir.path().join("a").join("settings.toml"));
        let settings = LauncherSettings {
            notification_mode: NotificationMode::SuppressInfo,
            log_text_wrapping: true,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("suppress_info"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "notification_mode = 12").unwrap();
        assert!(TomlSettingsStore::new(path).load().is_err());
    }
}
