use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::render::HtmlPolicy;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "gemma3:latest";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub model: String,
    pub probe_timeout_ms: u64,
    /// Pass raw HTML from model output through to rendered markup.
    pub trust_html: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            probe_timeout_ms: 1500,
            trust_html: false,
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line or through `ORACLE_*` variables.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub trust_html: bool,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::get_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(model) = overrides.model {
            self.model = model;
        }
        if overrides.trust_html {
            self.trust_html = true;
        }
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn html_policy(&self) -> HtmlPolicy {
        if self.trust_html {
            HtmlPolicy::Trusted
        } else {
            HtmlPolicy::Escape
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("digital-oracle").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.html_policy(), HtmlPolicy::Escape);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            model: "llama3.2".to_string(),
            trust_html: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.html_policy(), HtmlPolicy::Trusted);
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "model": "mistral" }"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model, "mistral");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.probe_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let file = Config {
            endpoint: "http://gpu-box:11434".to_string(),
            model: "mistral".to_string(),
            ..Config::default()
        };
        let resolved = file.clone().apply(Overrides {
            endpoint: None,
            model: Some("phi3".to_string()),
            trust_html: false,
        });
        assert_eq!(resolved.endpoint, "http://gpu-box:11434");
        assert_eq!(resolved.model, "phi3");
        assert!(!resolved.trust_html);

        let trusted = file.apply(Overrides {
            trust_html: true,
            ..Overrides::default()
        });
        assert!(trusted.trust_html);
    }
}
