use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Items older than this many days are purged by the cleanup task
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// RSS/Atom feed URL
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Source label stored with every item (part of the dedup key)
    #[serde(default = "default_source_name")]
    pub source_name: String,
    /// Feed entries considered per fetch
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Items handed to the pipeline per fetch
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Feed request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Article page request timeout in seconds
    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_secs: u64,
    /// Scrape article pages for an image and description
    #[serde(default = "default_true")]
    pub enrich_articles: bool,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            source_name: default_source_name(),
            max_candidates: default_max_candidates(),
            max_items: default_max_items(),
            request_timeout_secs: default_timeout(),
            enrichment_timeout_secs: default_enrichment_timeout(),
            enrich_articles: default_true(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (overridden by the BOT_TOKEN environment variable)
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Target chat id (overridden by the CHAT_ID environment variable)
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Bot API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Timeout for send calls in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Timeout for the getMe reachability probe in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Pause between consecutive deliveries in milliseconds
    #[serde(default = "default_delivery_delay")]
    pub delivery_delay_ms: u64,
    /// Let Telegram render a link preview for text messages
    #[serde(default = "default_true")]
    pub link_preview: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_api_base(),
            request_timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            delivery_delay_ms: default_delivery_delay(),
            link_preview: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start the scheduler with the daemon
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Polling loop tick in seconds
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// A task is due within this many seconds of its schedule
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: u64,
    /// Minimum seconds between runs of an hourly task
    #[serde(default = "default_hourly_spacing")]
    pub hourly_min_spacing_secs: u64,
    /// Minimum seconds between runs of a daily task
    #[serde(default = "default_daily_spacing")]
    pub daily_min_spacing_secs: u64,
    /// UTC hour of the daily cleanup task
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour: u32,
    /// Seconds stop() waits for in-flight tasks before detaching them
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_secs: default_tick(),
            tolerance_secs: default_tolerance(),
            hourly_min_spacing_secs: default_hourly_spacing(),
            daily_min_spacing_secs: default_daily_spacing(),
            cleanup_hour: default_cleanup_hour(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsrelay")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_feed_url() -> String {
    "https://www.espncricinfo.com/rss/content/story/feeds/0.xml".to_string()
}

fn default_source_name() -> String {
    "ESPN".to_string()
}

fn default_max_candidates() -> usize {
    10
}

fn default_max_items() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_enrichment_timeout() -> u64 {
    10
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_delivery_delay() -> u64 {
    1000
}

fn default_tick() -> u64 {
    60
}

fn default_tolerance() -> u64 {
    120 // 2 minutes either side of the scheduled minute
}

fn default_hourly_spacing() -> u64 {
    50 * 60
}

fn default_daily_spacing() -> u64 {
    23 * 3600
}

fn default_cleanup_hour() -> u32 {
    3
}

fn default_shutdown_grace() -> u64 {
    30
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Secrets are usually injected by the environment rather than written to disk
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = non_empty("CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(url) = non_empty("NEWSRELAY_FEED_URL") {
            self.feed.url = url;
        }
    }

    /// Check that everything a delivery client needs is present
    pub fn validate_delivery(&self) -> crate::Result<(&str, &str)> {
        let token = self
            .telegram
            .bot_token
            .as_deref()
            .ok_or_else(|| crate::Error::Config("telegram.bot_token (or BOT_TOKEN) is not set".to_string()))?;
        let chat_id = self
            .telegram
            .chat_id
            .as_deref()
            .ok_or_else(|| crate::Error::Config("telegram.chat_id (or CHAT_ID) is not set".to_string()))?;
        Ok((token, chat_id))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsrelay/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsrelay")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("newsrelay.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.general.retention_days, 7);
        assert_eq!(config.feed.max_candidates, 10);
        assert_eq!(config.feed.max_items, 5);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.scheduler.tolerance_secs, 120);
        assert_eq!(config.scheduler.cleanup_hour, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [feed]
            source_name = "Cricinfo"

            [scheduler]
            tick_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.feed.source_name, "Cricinfo");
        assert_eq!(config.feed.max_items, 5);
        assert_eq!(config.scheduler.tick_secs, 30);
        assert_eq!(config.scheduler.daily_min_spacing_secs, 23 * 3600);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "BOT_TOKEN" => Some("123:abc".to_string()),
            "CHAT_ID" => Some("-10042".to_string()),
            "NEWSRELAY_FEED_URL" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.chat_id.as_deref(), Some("-10042"));
        assert_eq!(config.feed.url, default_feed_url());
        assert_eq!(config.validate_delivery().unwrap(), ("123:abc", "-10042"));
    }

    #[test]
    fn test_validate_delivery_missing_token() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate_delivery(),
            Err(crate::Error::Config(_))
        ));
    }
}
