use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::backend::Session;

pub const AVATAR_BASE_ENV_VAR: &str = "DYNASTY_AVATAR_BASE_URL";
pub const SERVER_URL_ENV_VAR: &str = "DYNASTY_SERVER_URL";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SleeperProviderConfig {
    pub base_url: String,
    pub avatar_base_url: String,
    #[serde(default = "default_sport")]
    pub sport: String,
}

fn default_sport() -> String {
    "nba".to_string()
}

impl Default for SleeperProviderConfig {
    fn default() -> Self {
        SleeperProviderConfig {
            base_url: "https://api.sleeper.app/v1".to_string(),
            avatar_base_url: "https://sleepercdn.com/avatars/thumbs".to_string(),
            sport: default_sport(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub sleeper: SleeperProviderConfig,
    /// Yahoo is reached through the backend's OAuth proxy unless overridden.
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            sleeper: SleeperProviderConfig::default(),
            yahoo: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Signed-in user for commands that read account data.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:3000".to_string(),
            username: None,
            token: None,
        }
    }
}

impl BackendConfig {
    pub fn session(&self) -> Session {
        match self.username.as_deref().map(str::trim) {
            Some(username) if !username.is_empty() => {
                Session::with_user(username, self.token.clone())
            }
            _ => Session::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    pub stale_time_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            stale_time_secs: 120,
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            let mut config = Self::default();
            config.apply_env_overrides();
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("app", "dynasty", "dynasty-dash")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.apply_env_overrides();
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Environment wins over the file for deployment-specific URLs.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(AVATAR_BASE_ENV_VAR).ok(),
            std::env::var(SERVER_URL_ENV_VAR).ok(),
        );
    }

    fn apply_overrides(&mut self, avatar_base: Option<String>, server_url: Option<String>) {
        if let Some(url) = avatar_base.filter(|u| !u.trim().is_empty()) {
            debug!(%url, "Avatar base URL overridden from environment");
            self.providers.sleeper.avatar_base_url = url;
        }
        if let Some(url) = server_url.filter(|u| !u.trim().is_empty()) {
            debug!(%url, "Server URL overridden from environment");
            self.backend.base_url = url;
        }
    }

    pub fn yahoo_base_url(&self) -> String {
        match &self.providers.yahoo {
            Some(yahoo) => yahoo.base_url.clone(),
            None => format!("{}/yahoo", self.backend.base_url.trim_end_matches('/')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  sleeper:
    base_url: "http://localhost:9000/v1"
    avatar_base_url: "http://localhost:9000/avatars"
  yahoo:
    base_url: "http://localhost:9100/yahoo"
backend:
  base_url: "http://localhost:3000"
cache:
  stale_time_secs: 30
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.providers.sleeper.base_url, "http://localhost:9000/v1");
        assert_eq!(
            config.providers.sleeper.avatar_base_url,
            "http://localhost:9000/avatars"
        );
        assert_eq!(config.providers.sleeper.sport, "nba");
        assert_eq!(config.yahoo_base_url(), "http://localhost:9100/yahoo");
        assert_eq!(config.cache.stale_time(), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.providers.sleeper.base_url, "https://api.sleeper.app/v1");
        assert_eq!(config.yahoo_base_url(), "http://localhost:3000/yahoo");
        assert_eq!(config.cache.stale_time_secs, 120);
    }

    #[test]
    fn test_overrides_replace_urls() {
        let mut config = AppConfig::default();
        config.apply_overrides(
            Some("https://cdn.example.com/thumbs".to_string()),
            Some("https://api.example.com/".to_string()),
        );
        assert_eq!(
            config.providers.sleeper.avatar_base_url,
            "https://cdn.example.com/thumbs"
        );
        assert_eq!(config.backend.base_url, "https://api.example.com/");
        assert_eq!(config.yahoo_base_url(), "https://api.example.com/yahoo");
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("  ".to_string()), None);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_session_from_backend_config() {
        let mut backend = BackendConfig::default();
        assert!(!backend.session().is_logged_in());

        backend.username = Some("  ".to_string());
        assert!(!backend.session().is_logged_in());

        backend.username = Some("kobe".to_string());
        backend.token = Some("abc".to_string());
        let session = backend.session();
        assert_eq!(session.current().unwrap().username, "kobe");
        assert_eq!(session.token().as_deref(), Some("abc"));
    }

    #[test]
    fn test_load_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "backend:\n  base_url: http://127.0.0.1:4000\n").unwrap();
        let config = AppConfig::load_from_path(file.path()).unwrap();
        // SERVER_URL_ENV_VAR is never set in the test environment
        if std::env::var(SERVER_URL_ENV_VAR).is_err() {
            assert_eq!(config.backend.base_url, "http://127.0.0.1:4000");
        }
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let err = AppConfig::load_from_path("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
