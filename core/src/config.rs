use crate::errors::{SaverError, SaverResult};
use crate::types::ReasoningEffort;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "playground-saver";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration shared by the CLI and the web server
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SaverConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model_name: Option<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub instructions: Option<String>,
    pub save_history: Option<bool>,
    pub history_file: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    /// Browser origins, besides the server's own, allowed to call the web API
    pub allowed_origins: Option<Vec<String>>,
}

impl SaverConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> SaverResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SaverError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SaverError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> SaverResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| SaverError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SaverError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| SaverError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            reasoning_effort: other.reasoning_effort.or(self.reasoning_effort),
            instructions: other
                .instructions
                .clone()
                .or_else(|| self.instructions.clone()),
            save_history: other.save_history.or(self.save_history),
            history_file: other
                .history_file
                .clone()
                .or_else(|| self.history_file.clone()),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
            allowed_origins: other
                .allowed_origins
                .clone()
                .or_else(|| self.allowed_origins.clone()),
        }
    }

    /// Overlay of the `OPENAI_API_KEY` and `OPENAI_BASE_URL` environment variables
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL"),
            ..Self::default()
        }
    }

    /// File config with the environment layered on top
    pub fn load_layered(path: &Path) -> SaverResult<Self> {
        Ok(Self::load_from_file(path)?.merge(&Self::from_env()))
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn allowed_origins(&self) -> &[String] {
        self.allowed_origins.as_deref().unwrap_or_default()
    }

    pub fn save_history(&self) -> bool {
        self.save_history.unwrap_or(true)
    }

    /// History log location, defaulting to `history.json` next to the config file
    pub fn history_path(&self) -> SaverResult<PathBuf> {
        match &self.history_file {
            Some(path) => Ok(path.clone()),
            None => Ok(get_default_config_dir(APP_NAME)?.join("history.json")),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> SaverResult<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| SaverError::Config("Could not determine home directory".to_string()))?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> SaverResult<PathBuf> {
    Ok(get_default_config_dir(app_name)?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = SaverConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, SaverConfig::default());
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert!(config.save_history());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = SaverConfig {
            api_key: Some("sk-test".to_string()),
            model_name: Some("o3".to_string()),
            reasoning_effort: Some(ReasoningEffort::High),
            save_history: Some(false),
            ..SaverConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = SaverConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model_name = [").unwrap();
        let err = SaverConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, SaverError::Config(_)));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = SaverConfig {
            api_key: Some("file-key".to_string()),
            model_name: Some("gpt-4o".to_string()),
            timeout_secs: Some(30),
            ..SaverConfig::default()
        };
        let overlay = SaverConfig {
            api_key: Some("env-key".to_string()),
            ..SaverConfig::default()
        };

        let merged = base.merge(&overlay);
        assert_eq!(merged.api_key.as_deref(), Some("env-key"));
        assert_eq!(merged.model(), "gpt-4o");
        assert_eq!(merged.timeout_secs(), 30);
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = SaverConfig {
            base_url: Some("http://127.0.0.1:9000/v1/".to_string()),
            ..SaverConfig::default()
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/v1");
    }
}
