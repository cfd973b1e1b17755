use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "mangadex-reader";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_uploads_url")]
    pub uploads_url: String,

    /// Application backend that stores bookmarks, history, ratings and status
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Translated language requested from the chapter feed
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Pause before the single retry of a transient failure
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_debounce")]
    pub search_debounce_ms: u64,

    /// Read compressed pages from the data-saver bucket
    #[serde(default)]
    pub data_saver: bool,
}

fn default_api_url() -> String { "https://api.mangadex.org".to_string() }
fn default_uploads_url() -> String { "https://uploads.mangadex.org".to_string() }
fn default_backend_url() -> String { "http://localhost:8000".to_string() }
fn default_language() -> String { "en".to_string() }
fn default_timeout() -> u64 { 15 }
fn default_retry_delay() -> u64 { 300 }
fn default_debounce() -> u64 { 500 }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            uploads_url: default_uploads_url(),
            backend_url: default_backend_url(),
            language: default_language(),
            request_timeout_secs: default_timeout(),
            retry_delay_ms: default_retry_delay(),
            search_debounce_ms: default_debounce(),
            data_saver: false,
        }
    }
}

impl Config {
    /// Loads `config.json` from the config directory, falling back to defaults,
    /// then applies environment overrides.
    pub fn load() -> Self {
        let mut config = config_dir()
            .map(|dir| dir.join("config.json"))
            .and_then(|path| Self::from_file(&path).ok())
            .unwrap_or_default();
        config.apply_env();
        config
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("MANGA_API_URL") {
            self.api_url = v;
        }
        if let Ok(v) = env::var("MANGA_UPLOADS_URL") {
            self.uploads_url = v;
        }
        if let Ok(v) = env::var("MANGA_BACKEND_URL") {
            self.backend_url = v;
        }
        if let Ok(v) = env::var("MANGA_LANGUAGE") {
            self.language = v;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
