//! Configuration management for StreamFlix
//!
//! Handles config file loading and environment overrides.
//! Config is stored at ~/.config/streamflix/config.toml
//!
//! Endpoints and keys are configuration, not code: every upstream URL can be
//! overridden and the TMDB key has no built-in value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading an explicitly requested config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TMDB API key (query-string auth)
    pub tmdb_api_key: Option<String>,
    /// TMDB API base URL
    pub tmdb_base_url: String,
    /// TMDB image CDN base URL
    pub image_base_url: String,
    /// Source provider base URL
    pub source_base_url: String,
    /// Decryption service endpoint
    pub decrypt_url: String,
    /// Source provider server used when the caller doesn't pick one
    pub default_server: String,
    /// User-Agent sent to the source provider and required by its CDN
    pub user_agent: String,
    /// Origin header the CDN expects
    pub playback_origin: String,
    /// Referer header the CDN expects
    pub playback_referer: String,
    /// Listen address for `streamflix serve`
    pub bind: String,
    /// Timeout for each source/decrypt request
    pub request_timeout_secs: u64,
    /// mpv binary used for local playback
    pub mpv_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            tmdb_base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p".to_string(),
            source_base_url: "https://api.videasy.net".to_string(),
            decrypt_url: "https://enc-dec.app/api/dec-videasy".to_string(),
            default_server: "myflixerzupcloud".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            playback_origin: "https://videasy.net".to_string(),
            playback_referer: "https://videasy.net/".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 15,
            mpv_path: "mpv".to_string(),
        }
    }
}

impl Config {
    /// Get config file path (~/.config/streamflix/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("streamflix").join("config.toml"))
    }

    /// Load config from the default location, or defaults if absent/invalid.
    /// Environment overrides are applied either way.
    pub fn load() -> Self {
        let mut config: Config = Self::path()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default();
        config.apply_env();
        config
    }

    /// Load config from an explicit path; unlike [`Config::load`] a missing
    /// or broken file is an error
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("TMDB_API_KEY") {
            self.tmdb_api_key = Some(key);
        }
        if let Some(bind) = non_empty("STREAMFLIX_BIND") {
            self.bind = bind;
        }
        if let Some(url) = non_empty("STREAMFLIX_SOURCE_URL") {
            self.source_base_url = url;
        }
        if let Some(url) = non_empty("STREAMFLIX_DECRYPT_URL") {
            self.decrypt_url = url;
        }
    }

    /// TMDB key, or an empty string (requests will then fail with 401)
    pub fn tmdb_api_key(&self) -> String {
        self.tmdb_api_key.clone().unwrap_or_default()
    }

    pub fn has_tmdb_api_key(&self) -> bool {
        self.tmdb_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
