use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatcher::DispatchSettings;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub dispatch: DispatchConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    // Sender label placed in every webhook message
    pub username: String,
    // Transport timeout in seconds; 0 means no timeout
    pub timeout_secs: u64,
    pub success_note: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_history_shown: usize,
    pub language: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            username: "MaxBot Controller".to_string(),
            timeout_secs: 15,
            success_note: "Sent to Discord webhook".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_history_shown: 20,
            language: "auto".to_string(),
        }
    }
}

impl Config {
    /// Loads `config.toml` from `home`, writing defaults on first run.
    pub fn load(home: &Path) -> Result<Self> {
        let config_path = Self::config_path(home);

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(home)?;
            Ok(config)
        }
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        fs::create_dir_all(home)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(Self::config_path(home), content)?;
        Ok(())
    }

    /// `$BOTCTL_HOME`, or `~/.botctl`.
    pub fn home_dir() -> PathBuf {
        match std::env::var_os("BOTCTL_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".botctl"),
        }
    }

    pub fn config_path(home: &Path) -> PathBuf {
        home.join("config.toml")
    }

    pub fn catalog_path(home: &Path) -> PathBuf {
        home.join("commands.toml")
    }

    pub fn secure_dir(home: &Path) -> PathBuf {
        home.join("secure")
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            username: self.dispatch.username.clone(),
            success_note: self.dispatch.success_note.clone(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.dispatch.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn get_effective_language(&self) -> String {
        if self.display.language == "auto" {
            std::env::var("LANG")
                .unwrap_or_else(|_| "en_US".to_string())
                .split('.')
                .next()
                .unwrap_or("en")
                .to_string()
        } else {
            self.display.language.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.dispatch.timeout_secs, 15);
        assert!(Config::config_path(dir.path()).exists());

        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.dispatch.username, config.dispatch.username);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            Config::config_path(dir.path()),
            "[dispatch]\nusername = \"ops-bot\"\ntimeout_secs = 0\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.dispatch.username, "ops-bot");
        assert_eq!(config.dispatch.success_note, "Sent to Discord webhook");
        assert_eq!(config.display.max_history_shown, 20);
        assert_eq!(config.timeout(), None);
        assert_eq!(config.dispatch_settings().username, "ops-bot");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(Config::config_path(dir.path()), "[dispatch\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
