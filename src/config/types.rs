use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sumi-Relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub analyze: AnalyzeConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    pub seeds: SeedConfig,
}

/// Fetch pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Number of concurrent fetch workers
    #[serde(rename = "pool-size", default = "default_fetch_pool_size")]
    pub pool_size: u32,

    /// Pause after every request made by one worker (seconds)
    #[serde(rename = "politeness-delay", default = "default_politeness_delay")]
    pub politeness_delay: f64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Sleep between polls of an empty queue (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pool_size: default_fetch_pool_size(),
            politeness_delay: default_politeness_delay(),
            request_timeout: default_request_timeout(),
            idle_backoff_ms: default_idle_backoff_ms(),
        }
    }
}

/// Analyze pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeConfig {
    /// Number of analyze worker threads
    #[serde(rename = "pool-size", default = "default_analyze_pool_size")]
    pub pool_size: u32,

    /// Handoff buffer length above which a warning is logged
    #[serde(rename = "buffer-soft-limit", default)]
    pub buffer_soft_limit: Option<usize>,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            pool_size: default_analyze_pool_size(),
            buffer_soft_limit: None,
        }
    }
}

/// Periodic statistics reporting
#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// Reporting interval (seconds)
    #[serde(default = "default_stats_interval")]
    pub interval: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval: default_stats_interval(),
        }
    }
}

/// Shutdown behavior
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShutdownConfig {
    /// Upper bound on the drain barrier wait (seconds, 0 waits forever)
    #[serde(rename = "drain-timeout", default)]
    pub drain_timeout: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Which store backs the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierBackend {
    /// In-process sets, lost on exit
    #[default]
    Memory,
    /// SQLite database, survives restarts
    Sqlite,
}

/// Frontier configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontierConfig {
    #[serde(default)]
    pub backend: FrontierBackend,

    /// Path to the SQLite frontier database (sqlite backend only)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database that receives extracted records
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Settings for the bundled HTML analyzer
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// CSS selector for elements whose `href` is followed
    #[serde(rename = "link-selector", default = "default_link_selector")]
    pub link_selector: String,

    /// CSS selector for elements turned into records
    #[serde(rename = "item-selector", default)]
    pub item_selector: Option<String>,

    /// Only follow links on the host of the page they were found on
    #[serde(rename = "same-host-only", default)]
    pub same_host_only: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            link_selector: default_link_selector(),
            item_selector: None,
            same_host_only: false,
        }
    }
}

/// Seed URLs
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// URLs the crawl starts from
    pub urls: Vec<String>,

    /// Clear all frontier state before seeding
    #[serde(default)]
    pub reset: bool,
}

/// Runtime knobs for the engine, with typed durations
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub fetch_workers: usize,
    pub analyze_workers: usize,
    pub politeness_delay: Duration,
    pub idle_backoff: Duration,
    pub stats_interval: Duration,
    pub drain_timeout: Option<Duration>,
    pub buffer_soft_limit: Option<usize>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            fetch_workers: default_fetch_pool_size() as usize,
            analyze_workers: default_analyze_pool_size() as usize,
            politeness_delay: Duration::from_secs_f64(default_politeness_delay()),
            idle_backoff: Duration::from_millis(default_idle_backoff_ms()),
            stats_interval: Duration::from_secs(default_stats_interval()),
            drain_timeout: None,
            buffer_soft_limit: None,
        }
    }
}

impl TryFrom<&Config> for CrawlSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let delay = config.fetch.politeness_delay;
        let politeness_delay = Duration::try_from_secs_f64(delay).map_err(|e| {
            ConfigError::Validation(format!("politeness-delay {} is not a duration: {}", delay, e))
        })?;

        Ok(Self {
            fetch_workers: config.fetch.pool_size as usize,
            analyze_workers: config.analyze.pool_size as usize,
            politeness_delay,
            idle_backoff: Duration::from_millis(config.fetch.idle_backoff_ms),
            stats_interval: Duration::from_secs(config.stats.interval),
            drain_timeout: (config.shutdown.drain_timeout > 0)
                .then(|| Duration::from_secs(config.shutdown.drain_timeout)),
            buffer_soft_limit: config.analyze.buffer_soft_limit,
        })
    }
}

fn default_fetch_pool_size() -> u32 {
    10
}

fn default_analyze_pool_size() -> u32 {
    4
}

fn default_politeness_delay() -> f64 {
    1.0
}

fn default_request_timeout() -> u64 {
    30
}

fn default_idle_backoff_ms() -> u64 {
    200
}

fn default_stats_interval() -> u64 {
    5
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}
