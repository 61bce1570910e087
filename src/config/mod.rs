use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub http: HttpConfig,
    pub resolver: ResolverConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
    pub session: SessionConfig,
}

/// Feed polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// How often the watcher scans the feed
    #[serde(with = "duration")]
    pub scan_interval: Duration,
    /// How far before process start the initial watermark sits
    #[serde(with = "duration")]
    pub initial_lookback: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    #[serde(with = "duration")]
    pub connect_timeout: Duration,
    #[serde(with = "duration")]
    pub request_timeout: Duration,
}

/// Thread metadata resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// `{thread_id}` is substituted with the thread identifier
    pub metadata_url_template: String,
    /// Appended to a feed entry link to form its metadata URL
    pub metadata_suffix: String,
    pub max_attempts: u32,
    #[serde(with = "duration")]
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub log_dir: PathBuf,
    pub extension: String,
}

/// Remote metrics sink. The credential is supplied at runtime, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub credential_header: String,
    #[serde(with = "duration")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(with = "duration")]
    pub reconnect_initial_delay: Duration,
    #[serde(with = "duration")]
    pub reconnect_max_delay: Duration,
    pub reconnect_jitter_percent: u8,
    pub worker_queue_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            initial_lookback: Duration::from_secs(DEFAULT_INITIAL_LOOKBACK_SECS),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            metadata_url_template: DEFAULT_METADATA_URL_TEMPLATE.to_string(),
            metadata_suffix: DEFAULT_METADATA_SUFFIX.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            extension: DEFAULT_LOG_EXTENSION.to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_METRICS_ENDPOINT.to_string(),
            credential_header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            timeout: Duration::from_secs(DEFAULT_METRICS_TIMEOUT_SECS),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_delay: Duration::from_secs(DEFAULT_RECONNECT_INITIAL_DELAY_SECS),
            reconnect_max_delay: Duration::from_secs(DEFAULT_RECONNECT_MAX_DELAY_SECS),
            reconnect_jitter_percent: DEFAULT_RECONNECT_JITTER_PERCENT,
            worker_queue_capacity: DEFAULT_WORKER_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Load from a TOML file, writing the defaults out when it does not exist
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let config_file = config_file.as_ref();
        let config = if config_file.exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str::<Self>(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file.display());
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feed.scan_interval.is_zero() {
            anyhow::bail!("feed.scan_interval must be greater than zero");
        }
        if self.session.reconnect_initial_delay > self.session.reconnect_max_delay {
            anyhow::bail!(
                "session.reconnect_initial_delay must not exceed session.reconnect_max_delay"
            );
        }
        if self.resolver.max_attempts == 0 {
            anyhow::bail!("resolver.max_attempts must be at least 1");
        }
        if !self.resolver.metadata_url_template.contains("{thread_id}") {
            anyhow::bail!("resolver.metadata_url_template must contain {{thread_id}}");
        }
        if self.session.worker_queue_capacity == 0 {
            anyhow::bail!("session.worker_queue_capacity must be at least 1");
        }
        if self.session.reconnect_jitter_percent > 100 {
            anyhow::bail!("session.reconnect_jitter_percent must be between 0 and 100");
        }
        Ok(())
    }
}
