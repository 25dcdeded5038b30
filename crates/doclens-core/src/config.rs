use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
pub const DEFAULT_CAMERA_PROGRAM: &str = "ffmpeg";

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_program: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let invalid = |reason: String| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason,
        };
        let config_content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&config_content).map_err(|e| invalid(e.to_string()))
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason,
        };

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| invalid(e.to_string()))?;
        }

        let config_content =
            serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))?;
        fs::write(path, config_content).map_err(|e| invalid(e.to_string()))
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("doclens").join("config.json"))
    }

    /// Resolve the API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::resolve_api_key`] with an injectable env lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = API_KEY_VARS.iter().find_map(|name| non_blank(lookup(name)));
        match from_env {
            Some(key) => {
                tracing::debug!(source = "env", "API key resolved");
                Ok(key)
            }
            None => match non_blank(self.api_key.clone()) {
                Some(key) => {
                    tracing::debug!(source = "config", "API key resolved");
                    Ok(key)
                }
                None => Err(ConfigError::MissingCredential),
            },
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn camera_device(&self) -> &str {
        self.camera_device.as_deref().unwrap_or(DEFAULT_CAMERA_DEVICE)
    }

    pub fn camera_program(&self) -> &str {
        self.camera_program.as_deref().unwrap_or(DEFAULT_CAMERA_PROGRAM)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_wins_over_config() {
        let config = Config {
            api_key: Some("from-config".to_string()),
            ..Config::new()
        };
        let key = config
            .resolve_api_key_with(|name| (name == "API_KEY").then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn test_gemini_var_checked_before_api_key() {
        let key = Config::new()
            .resolve_api_key_with(|name| Some(format!("{name}-value")))
            .unwrap();
        assert_eq!(key, "GEMINI_API_KEY-value");
    }

    #[test]
    fn test_falls_back_to_config_key() {
        let config = Config {
            api_key: Some("from-config".to_string()),
            ..Config::new()
        };
        let key = config.resolve_api_key_with(|_| None).unwrap();
        assert_eq!(key, "from-config");
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::new()
        };
        let err = config
            .resolve_api_key_with(|_| Some(String::new()))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingCredential);
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.export_dir(), PathBuf::from("."));
        assert_eq!(config.camera_device(), DEFAULT_CAMERA_DEVICE);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = Config {
            base_url: Some("http://localhost:8080/".to_string()),
            ..Config::new()
        };
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            model: Some("gemini-2.5-pro".to_string()),
            export_dir: Some(PathBuf::from("/tmp/out")),
            ..Config::new()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_corrupt_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidFile { .. })
        ));
    }
}
