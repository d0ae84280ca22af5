//! Sumi-Relay: a two-pool crawl orchestration engine
//!
//! This crate pulls URLs from a deduplicating frontier, fetches them with a
//! pool of concurrent fetch workers, hands each response to a pool of
//! analyze workers running a pluggable analyzer, and routes the results back
//! into the frontier (new URLs) and out to a record sink.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod pipeline;
pub mod state;

use thiserror::Error;

/// Main error type for Sumi-Relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] frontier::FrontierError),

    #[error("Frontier failed during the crawl: {0}")]
    FrontierFatal(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("Operation not allowed while the crawler is {0:?}")]
    NotIdle(state::CrawlState),

    #[error("Crawler is not running (currently {0:?})")]
    NotRunning(state::CrawlState),

    #[error("No tokio runtime available: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Sumi-Relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Coordinator;
pub use frontier::{Frontier, MemoryFrontier, SqliteFrontier};
pub use output::CrawlStatistics;
pub use pipeline::{Analyzer, Extraction, ResponseBody, Sink};
pub use state::CrawlState;
