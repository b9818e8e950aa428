//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::{SessionStoreConfig, TempFileManager};

/// Folio configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub temp: TempConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Evict idle sessions in the background
    pub enabled: bool,
    pub ttl_secs: u64,
    pub reap_interval_secs: u64,
    /// 0 means unlimited
    pub max_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TempConfig {
    /// Scratch file root; the system temp dir when unset
    pub directory: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = SessionStoreConfig::default();
        Self {
            enabled: defaults.enabled,
            ttl_secs: defaults.ttl.as_secs(),
            reap_interval_secs: defaults.reap_interval.as_secs(),
            max_sessions: defaults.max_sessions,
        }
    }
}

const KEYS: [&str; 5] = [
    "session.enabled",
    "session.ttl_secs",
    "session.reap_interval_secs",
    "session.max_sessions",
    "temp.directory",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FOLIO_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("folio")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, then apply `FOLIO_*` environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Apply overrides from `FOLIO_SESSION_ENABLED`, `FOLIO_SESSION_TTL_SECS`
    /// and `FOLIO_TEMP_DIR`, looked up through `lookup`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        let overrides = [
            ("FOLIO_SESSION_ENABLED", "session.enabled"),
            ("FOLIO_SESSION_TTL_SECS", "session.ttl_secs"),
            ("FOLIO_TEMP_DIR", "temp.directory"),
        ];

        for (var, key) in overrides {
            if let Some(value) = lookup(var) {
                self.set(key, &value)
                    .with_context(|| format!("Invalid value in environment variable {}", var))?;
            }
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.session.ttl_secs == 0 {
            return Err(anyhow!("session.ttl_secs must be greater than 0"));
        }
        if self.session.reap_interval_secs == 0 {
            return Err(anyhow!("session.reap_interval_secs must be greater than 0"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Session settings
            "session.enabled" => Ok(self.session.enabled.to_string()),
            "session.ttl_secs" => Ok(self.session.ttl_secs.to_string()),
            "session.reap_interval_secs" => Ok(self.session.reap_interval_secs.to_string()),
            "session.max_sessions" => Ok(self.session.max_sessions.to_string()),

            // Temp settings
            "temp.directory" => Ok(match &self.temp.directory {
                Some(dir) => dir.display().to_string(),
                None => format!("(system default: {})", self.temp_manager().root().display()),
            }),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `folio config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // Session settings
            "session.enabled" => {
                self.session.enabled = match value.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => true,
                    "false" | "0" | "no" | "off" => false,
                    _ => return Err(anyhow!("Invalid boolean value: {}", value)),
                };
            }
            "session.ttl_secs" => {
                let ttl: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid ttl_secs value: {}", value))?;
                if ttl == 0 {
                    return Err(anyhow!("Session TTL must be greater than 0"));
                }
                self.session.ttl_secs = ttl;
            }
            "session.reap_interval_secs" => {
                let interval: u64 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid reap_interval_secs value: {}", value))?;
                if interval == 0 {
                    return Err(anyhow!("Reap interval must be greater than 0"));
                }
                self.session.reap_interval_secs = interval;
            }
            "session.max_sessions" => {
                self.session.max_sessions = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid max_sessions value: {}", value))?;
            }

            // Temp settings
            "temp.directory" => {
                let value = value.trim();
                self.temp.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `folio config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }

    /// Session store settings derived from this configuration
    pub fn to_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            enabled: self.session.enabled,
            ttl: Duration::from_secs(self.session.ttl_secs),
            reap_interval: Duration::from_secs(self.session.reap_interval_secs),
            max_sessions: self.session.max_sessions,
        }
    }

    /// Temp file manager rooted at the configured directory
    pub fn temp_manager(&self) -> TempFileManager {
        match &self.temp.directory {
            Some(dir) => TempFileManager::new(dir),
            None => TempFileManager::with_defaults(),
        }
    }
}
