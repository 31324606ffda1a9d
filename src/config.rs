use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage::IN_MEMORY_PATH;

pub const KEYS: &[&str] = &[
    "database.path",
    "server.host",
    "server.port",
    "questions-per-page",
];

const MAX_QUESTIONS_PER_PAGE: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Could not determine home directory")]
    NoHomeDir,
}

fn validate_database_path(path: &str) -> Result<PathBuf, ConfigError> {
    if path == IN_MEMORY_PATH {
        return Ok(PathBuf::from(path));
    }
    if path.contains('\0') {
        return Err(ConfigError::InvalidConfig(
            "Path contains invalid characters".to_string(),
        ));
    }
    if path.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(
            "Path cannot be empty".to_string(),
        ));
    }

    Ok(PathBuf::from(shellexpand::tilde(path).as_ref()))
}

fn validate_host(value: &str) -> Result<(), ConfigError> {
    if value == "localhost" || value.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    Err(ConfigError::InvalidConfig(format!(
        "server.host must be an IP address or localhost, got {}",
        value
    )))
}

fn validate_port(value: &str) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidConfig("server.port must be an integer between 0 and 65535".to_string())
    })
}

fn validate_per_page(value: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .ok()
        .filter(|n| (1..=MAX_QUESTIONS_PER_PAGE).contains(n))
        .ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "questions-per-page must be an integer between 1 and {}",
                MAX_QUESTIONS_PER_PAGE
            ))
        })
}

/// Values stored in the config file. Unset fields fall back to defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub server_host: Option<String>,
    #[serde(default)]
    pub server_port: Option<u16>,
    #[serde(default)]
    pub questions_per_page: Option<usize>,
}

impl Config {
    pub fn with_defaults() -> Self {
        Self {
            database_path: default_database_path(),
            server_host: Some(default_host()),
            server_port: Some(default_port()),
            questions_per_page: Some(default_questions_per_page()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.database_path {
            validate_database_path(path)?;
        }
        if let Some(ref host) = self.server_host {
            validate_host(host)?;
        }
        if let Some(per_page) = self.questions_per_page {
            validate_per_page(&per_page.to_string())?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match self.database_path.clone().or_else(default_database_path) {
            Some(path) => validate_database_path(&path),
            None => Err(ConfigError::NoHomeDir),
        }
    }

    pub fn host(&self) -> String {
        self.server_host.clone().unwrap_or_else(default_host)
    }

    pub fn port(&self) -> u16 {
        self.server_port.unwrap_or_else(default_port)
    }

    pub fn questions_per_page(&self) -> usize {
        self.questions_per_page
            .unwrap_or_else(default_questions_per_page)
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("trivia"))
}

fn default_database_path() -> Option<String> {
    config_dir().map(|dir| dir.join("trivia.db").to_string_lossy().to_string())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_questions_per_page() -> usize {
    10
}

/// Loads, edits and persists the JSON config file.
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Opens the config at `config_path`, or at `~/.config/trivia/config.json`.
    /// A missing or empty file yields the defaults.
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => config_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join("config.json"),
        };

        let config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Config::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Config::default()
        };
        config.validate()?;

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Explicitly set value for `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let config = &self.config;
        let value = match key {
            "database.path" => config.database_path.clone(),
            "server.host" => config.server_host.clone(),
            "server.port" => config.server_port.map(|v| v.to_string()),
            "questions-per-page" => config.questions_per_page.map(|v| v.to_string()),
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        };
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut config = self.config.clone();

        match key {
            "database.path" => {
                let path = validate_database_path(value)?;
                config.database_path = Some(path.to_string_lossy().to_string());
            }
            "server.host" => {
                validate_host(value)?;
                config.server_host = Some(value.to_string());
            }
            "server.port" => {
                config.server_port = Some(validate_port(value)?);
            }
            "questions-per-page" => {
                config.questions_per_page = Some(validate_per_page(value)?);
            }
            _ => {
                return Err(ConfigError::InvalidKey(key.to_string()));
            }
        }
        config.validate()?;
        self.config = config;
        self.save()
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            "database.path" => self.config.database_path = None,
            "server.host" => self.config.server_host = None,
            "server.port" => self.config.server_port = None,
            "questions-per-page" => self.config.questions_per_page = None,
            _ => return Err(ConfigError::InvalidKey(key.to_string())),
        }
        self.save()
    }

    /// Every key with its effective value and whether that value is the default.
    pub fn list(&self) -> Vec<(String, String, bool)> {
        let defaults = Config::with_defaults();

        KEYS.iter()
            .map(|key| {
                let (set, default) = match *key {
                    "database.path" => (
                        self.config.database_path.clone(),
                        defaults.database_path.clone(),
                    ),
                    "server.host" => (self.config.server_host.clone(), defaults.server_host.clone()),
                    "server.port" => (
                        self.config.server_port.map(|v| v.to_string()),
                        defaults.server_port.map(|v| v.to_string()),
                    ),
                    _ => (
                        self.config.questions_per_page.map(|v| v.to_string()),
                        defaults.questions_per_page.map(|v| v.to_string()),
                    ),
                };
                match set {
                    Some(value) => (key.to_string(), value, false),
                    None => (
                        key.to_string(),
                        default.unwrap_or_else(|| "null".to_string()),
                        true,
                    ),
                }
            })
            .collect()
    }
}
