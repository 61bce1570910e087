/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Feed defaults
pub const DEFAULT_FEED_URL: &str = "https://www.reddit.com/r/live/new/.rss";
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INITIAL_LOOKBACK_SECS: u64 = 0;

// HTTP defaults
pub const DEFAULT_USER_AGENT: &str =
    "desktop:com.camr12.viewerstats:v1.0.0 (by /u/everyboysfantasy)";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Resolver defaults
pub const DEFAULT_METADATA_URL_TEMPLATE: &str = "http://www.reddit.com/live/{thread_id}/about.json";
pub const DEFAULT_METADATA_SUFFIX: &str = "about.json";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

// Storage defaults
pub const DEFAULT_LOG_DIR: &str = ".";
pub const DEFAULT_LOG_EXTENSION: &str = "csv";

// Metrics defaults
pub const DEFAULT_METRICS_ENDPOINT: &str = "http://echelon.writhem.com/influx/";
pub const DEFAULT_CREDENTIAL_HEADER: &str = "API-Key";
pub const DEFAULT_METRICS_TIMEOUT_SECS: u64 = 10;

// Session defaults
pub const DEFAULT_RECONNECT_INITIAL_DELAY_SECS: u64 = 1;
pub const DEFAULT_RECONNECT_MAX_DELAY_SECS: u64 = 60;
pub const DEFAULT_RECONNECT_JITTER_PERCENT: u8 = 25;
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 256;
