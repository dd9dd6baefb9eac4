// Configuration management for mixtape
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub playback: PlaybackConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub repeat_one: bool,
    /// Whether picking a track from the list starts it right away.
    pub autoplay_on_select: bool,
    pub tick_interval_ms: u64,
    pub volume: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub show_notifications: bool,
    pub print_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        let app_dir = app_dir();

        Self {
            database_path: app_dir.join("mixtape.db"),
            log_dir: app_dir.join("logs"),
            playback: PlaybackConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            repeat_one: false,
            autoplay_on_select: true,
            tick_interval_ms: 250,
            volume: 1.0,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_notifications: false,
            print_progress: true,
        }
    }
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }
}

impl Config {
    /// Loads the user config, writing the defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("mixtape");

        Ok(config_dir.join("config.toml"))
    }
}

fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixtape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load_keeps_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let mut config = Config::default();
        config.playback.repeat_one = true;
        config.playback.tick_interval_ms = 500;
        config.database_path = dir.path().join("tracks.db");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[playback]\nrepeat_one = true\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.playback.repeat_one);
        assert!(loaded.playback.autoplay_on_select);
        assert_eq!(loaded.playback.tick_interval_ms, 250);
        assert_eq!(loaded.ui, UiConfig::default());
    }

    #[test]
    fn test_garbage_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "playback = 12").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_tick_interval_has_a_floor() {
        let playback = PlaybackConfig {
            tick_interval_ms: 0,
            ..PlaybackConfig::default()
        };
        assert_eq!(playback.tick_interval(), Duration::from_millis(10));
    }
}
