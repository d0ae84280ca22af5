//! Configuration module for Sumi-Relay
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_relay::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("relay.toml")).unwrap();
//! println!("Fetch workers: {}", config.fetch.pool_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalyzeConfig, AnalyzerConfig, Config, CrawlSettings, FetchConfig, FrontierBackend,
    FrontierConfig, OutputConfig, SeedConfig, ShutdownConfig, StatsConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
