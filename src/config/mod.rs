use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::WikicastError;

/// Environment variable holding a Google Cloud API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Environment variable holding an OAuth access token
/// (e.g. from `gcloud auth print-access-token`)
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Encyclopedia content service
    pub content: ContentConfig,

    /// Speech synthesis service
    pub speech: SpeechConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// MediaWiki `api.php` endpoint
    pub api_base: String,

    /// User-Agent sent to Wikimedia servers (required by their API etiquette)
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Google Cloud Text-to-Speech `text:synthesize` endpoint
    pub endpoint: String,

    /// API key, only ever taken from the environment
    #[serde(skip)]
    pub api_key: Option<String>,

    /// OAuth bearer token, only ever taken from the environment
    #[serde(skip)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for per-title output folders
    pub files_dir: PathBuf,

    /// ffmpeg executable
    pub ffmpeg_path: String,

    /// ffprobe executable, used to measure the narration length
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Timeout for each network request, unbounded if not set
    pub network_timeout_secs: Option<u64>,

    /// Timeout for the ffmpeg encode, unbounded if not set
    pub encode_timeout_secs: Option<u64>,

    /// Remove the title folder when a stage fails after it was created
    pub cleanup_on_failure: bool,
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content: ContentConfig {
                api_base: "https://en.wikipedia.org/w/api.php".to_string(),
                user_agent: concat!(
                    "wikicast/",
                    env!("CARGO_PKG_VERSION"),
                    " (https://github.com/yourusername/wikicast)"
                )
                .to_string(),
            },
            speech: SpeechConfig {
                endpoint: "https://texttospeech.googleapis.com/v1/text:synthesize".to_string(),
                api_key: None,
                access_token: None,
            },
            app: AppConfig {
                files_dir: PathBuf::from("./files"),
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: default_ffprobe_path(),
                network_timeout_secs: Some(60),
                encode_timeout_secs: None,
                cleanup_on_failure: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults) and overlay credentials from the environment
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| WikicastError::Config(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Fill credentials from the given environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.speech.api_key = Some(key);
        }
        if let Some(token) = non_empty(ACCESS_TOKEN_ENV) {
            self.speech.access_token = Some(token);
        }
    }

    /// Get configuration file path
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("wikicast").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("content.api_base", &self.content.api_base),
            ("speech.endpoint", &self.speech.endpoint),
        ] {
            crate::utils::validate_and_normalize_url(value)
                .map_err(|e| WikicastError::Config(format!("{}: {}", name, e)))?;
        }

        for (name, value) in [
            ("app.ffmpeg_path", &self.app.ffmpeg_path),
            ("app.ffprobe_path", &self.app.ffprobe_path),
        ] {
            if value.trim().is_empty() {
                return Err(WikicastError::Config(format!("{} must not be empty", name)).into());
            }
        }

        Ok(())
    }

    /// Network request timeout, if bounded
    pub fn network_timeout(&self) -> Option<Duration> {
        self.app.network_timeout_secs.map(Duration::from_secs)
    }

    /// Encode timeout, if bounded
    pub fn encode_timeout(&self) -> Option<Duration> {
        self.app.encode_timeout_secs.map(Duration::from_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Wikipedia API: {}", self.content.api_base);
        println!("  Speech Endpoint: {}", self.speech.endpoint);
        let credentials = match (&self.speech.api_key, &self.speech.access_token) {
            (Some(_), _) => format!("API key ({})", API_KEY_ENV),
            (None, Some(_)) => format!("access token ({})", ACCESS_TOKEN_ENV),
            (None, None) => "not set".to_string(),
        };
        println!("  Speech Credentials: {}", credentials);
        println!("  Files Directory: {}", self.app.files_dir.display());
        println!("  ffmpeg: {}", self.app.ffmpeg_path);
        println!("  ffprobe: {}", self.app.ffprobe_path);
        match self.app.network_timeout_secs {
            Some(secs) => println!("  Network Timeout: {}s", secs),
            None => println!("  Network Timeout: none"),
        }
        match self.app.encode_timeout_secs {
            Some(secs) => println!("  Encode Timeout: {}s", secs),
            None => println!("  Encode Timeout: none"),
        }
        println!("  Cleanup On Failure: {}", self.app.cleanup_on_failure);
    }
}
