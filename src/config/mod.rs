use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sources: SourceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
            max_concurrent: default_max_concurrent(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_logging_format(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_reddit_mirrors")]
    pub reddit_mirrors: Vec<String>,
    #[serde(default = "default_cobalt_instances")]
    pub cobalt_instances: Vec<String>,
    #[serde(default = "default_mobile_user_agent")]
    pub mobile_user_agent: String,
    #[serde(default = "default_desktop_user_agent")]
    pub desktop_user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            reddit_mirrors: default_reddit_mirrors(),
            cobalt_instances: default_cobalt_instances(),
            mobile_user_agent: default_mobile_user_agent(),
            desktop_user_agent: default_desktop_user_agent(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_tool_timeout_secs() -> u64 {
    300
}

fn default_logging_format() -> String {
    "json".to_string()
}

fn default_reddit_mirrors() -> Vec<String> {
    [
        "https://redlib.catsarch.com",
        "https://redlib.vlingit.com",
        "https://libreddit.kavin.rocks",
        "https://redlib.tux.pizza",
        "https://redlib.ducks.party",
        "https://r.walkx.org",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_cobalt_instances() -> Vec<String> {
    [
        "https://api.cobalt.tools/api/json",
        "https://cobalt.kwiatekmiki.pl/api/json",
        "https://co.wuk.sh/api/json",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_mobile_user_agent() -> String {
    "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Mobile Safari/537.36"
        .to_string()
}

fn default_desktop_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram.token.as_deref()
    }

    /// The cookie jar lives next to the downloads so every worker sees the
    /// same file; written once at startup, read-only afterwards.
    pub fn cookie_path(&self) -> PathBuf {
        self.downloads.dir.join("cookies.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.downloads.max_concurrent, 4);
        assert_eq!(config.logging_format(), "json");
        assert!(config.telegram_token().is_none());
        assert!(!config.sources.reddit_mirrors.is_empty());
        assert!(!config.sources.cobalt_instances.is_empty());
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            token = "123:abc"

            [downloads]
            max_concurrent = 2

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram_token(), Some("123:abc"));
        assert_eq!(config.downloads.max_concurrent, 2);
        assert_eq!(config.logging_format(), "pretty");
        assert_eq!(config.downloads.tool_timeout_secs, 300);
    }

    #[test]
    fn test_cookie_path_under_download_dir() {
        let config = Config::default();
        assert!(config.cookie_path().ends_with("cookies.txt"));
        assert!(config.cookie_path().starts_with(&config.downloads.dir));
    }
}
