//! Configuration infrastructure
//!
//! `AppConfig` is stored as pretty JSON under the user's config directory.
//! Every section defaults independently, so a partial file only overrides
//! what it names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::infrastructure::parsing::config::SelectorConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub crawling: CrawlingConfig,
    pub http: HttpConfig,
    pub selectors: SelectorConfig,
    pub logging: LoggingConfig,
    /// Directory holding seed files, category table and per-category corpus files
    pub corpus_dir: Option<PathBuf>,
}

/// How far actualization walks a product's review listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActualizationPolicy {
    /// Stop at the first review already in the store
    #[default]
    Fast,
    /// Walk every page and keep whatever the store does not know yet
    Exhaustive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingConfig {
    pub policy: ActualizationPolicy,
    /// Categories processed in parallel
    pub workers: usize,
    /// Reviews a product listing can actually show
    pub display_cap: u64,
    /// Path appended to a product URL to reach its review listing
    pub reviews_path_suffix: String,
    /// Taxonomy levels below a category root that discovery descends
    pub max_discovery_depth: u32,
    /// Hard stop for any single paginated listing
    pub max_pages_per_listing: Option<u32>,
}

impl Default for CrawlingConfig {
    fn default() -> Self {
        Self {
            policy: ActualizationPolicy::default(),
            workers: defaults::WORKERS,
            display_cap: defaults::DISPLAY_CAP,
            reviews_path_suffix: defaults::REVIEWS_PATH_SUFFIX.to_string(),
            max_discovery_depth: defaults::MAX_DISCOVERY_DEPTH,
            max_pages_per_listing: None,
        }
    }
}

impl CrawlingConfig {
    /// URL of the review listing for a product page
    pub fn reviews_url(&self, product_url: &str) -> String {
        let suffix = self.reviews_path_suffix.trim_matches('/');
        if suffix.is_empty() {
            return product_url.to_string();
        }

        let trimmed = product_url.trim_end_matches('/');
        if trimmed.ends_with(&format!("/{suffix}")) {
            format!("{trimmed}/")
        } else {
            format!("{trimmed}/{suffix}/")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub requests_per_second: u32,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            requests_per_second: defaults::REQUESTS_PER_SECOND,
            follow_redirects: true,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for the log file; next to the executable when unset
    pub directory: Option<PathBuf>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Module-specific level filters (e.g. "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let module_filters = [("reqwest", "warn"), ("hyper", "warn"), ("html5ever", "error")]
            .into_iter()
            .map(|(module, level)| (module.to_string(), level.to_string()))
            .collect();

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            directory: None,
            max_files: defaults::LOG_MAX_FILES,
            module_filters,
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);
        Ok(config_dir)
    }

    /// Manager for the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_path: Self::get_config_dir()?.join(defaults::CONFIG_FILE_NAME),
        })
    }

    /// Manager for an explicit config file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, creating the default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !fs::try_exists(&self.config_path).await.unwrap_or(false) {
            info!(
                "[Config] No configuration at {:?}, writing defaults",
                self.config_path
            );
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .with_context(|| format!("Failed to read configuration file {:?}", self.config_path))?;

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => {
                info!("[Config] Loaded configuration from {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("[Config] Configuration is unreadable: {}", parse_error);

                let backup_path = self.config_path.with_extension("json.corrupted");
                match fs::copy(&self.config_path, &backup_path).await {
                    Ok(_) => info!("[Config] Backed up corrupted config to {:?}", backup_path),
                    Err(e) => warn!("[Config] Failed to back up corrupted config: {}", e),
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                warn!("[Config] Reset to default configuration");
                Ok(default_config)
            }
        }
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;
        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("[Config] Saved configuration to {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "review-harvest";

    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Categories processed in parallel
    pub const WORKERS: usize = 3;

    /// Reviews the site shows per product at most
    pub const DISPLAY_CAP: u64 = 500;

    pub const REVIEWS_PATH_SUFFIX: &str = "recenze/";

    pub const MAX_DISCOVERY_DEPTH: u32 = 4;

    pub const USER_AGENT: &str = concat!("review-harvest/", env!("CARGO_PKG_VERSION"));

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const REQUESTS_PER_SECOND: u32 = 2;

    pub const MAX_REDIRECTS: usize = 10;

    pub const LOG_LEVEL: &str = "info";

    pub const LOG_FILE_NAME: &str = "review-harvest.log";

    pub const LOG_MAX_FILES: u32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reviews_url() {
        let crawling = CrawlingConfig::default();
        assert_eq!(
            crawling.reviews_url("https://mixer.example.cz/"),
            "https://mixer.example.cz/recenze/"
        );
        assert_eq!(
            crawling.reviews_url("https://mixer.example.cz"),
            "https://mixer.example.cz/recenze/"
        );
        assert_eq!(
            crawling.reviews_url("https://mixer.example.cz/recenze/"),
            "https://mixer.example.cz/recenze/"
        );

        let no_suffix = CrawlingConfig {
            reviews_path_suffix: String::new(),
            ..CrawlingConfig::default()
        };
        assert_eq!(
            no_suffix.reviews_url("https://mixer.example.cz/r"),
            "https://mixer.example.cz/r"
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"crawling": {"workers": 8, "policy": "exhaustive"}}"#).unwrap();
        assert_eq!(config.crawling.workers, 8);
        assert_eq!(config.crawling.policy, ActualizationPolicy::Exhaustive);
        assert_eq!(config.crawling.display_cap, defaults::DISPLAY_CAP);
        assert_eq!(config.http.requests_per_second, defaults::REQUESTS_PER_SECOND);
        assert!(config.corpus_dir.is_none());
    }

    #[tokio::test]
    async fn test_first_run_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let config = manager.load_config().await.unwrap();
        assert_eq!(config.crawling.workers, defaults::WORKERS);
        assert!(manager.config_path().exists());

        let reloaded = manager.load_config().await.unwrap();
        assert_eq!(reloaded.logging.level, defaults::LOG_LEVEL);
    }

    #[tokio::test]
    async fn test_corrupt_config_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = ConfigManager::with_path(&path).load_config().await.unwrap();
        assert_eq!(config.crawling.workers, defaults::WORKERS);
        assert_eq!(
            std::fs::read_to_string(path.with_extension("json.corrupted")).unwrap(),
            "{ not json"
        );
    }
}
