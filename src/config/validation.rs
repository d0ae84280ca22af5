use crate::config::types::{
    AnalyzeConfig, AnalyzerConfig, Config, FetchConfig, FrontierBackend, FrontierConfig,
    SeedConfig, StatsConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_analyze_config(&config.analyze)?;
    validate_stats_config(&config.stats)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_frontier_config(&config.frontier)?;
    validate_output_config(&config.output)?;
    validate_analyzer_config(&config.analyzer)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates fetch pool configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.pool_size < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch pool-size must be >= 1, got {}",
            config.pool_size
        )));
    }

    // Also rejects values too large to sleep for
    if Duration::try_from_secs_f64(config.politeness_delay).is_err() {
        return Err(ConfigError::Validation(format!(
            "politeness-delay must be a non-negative number of seconds, got {}",
            config.politeness_delay
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if config.idle_backoff_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "idle-backoff-ms must be >= 1ms, got {}ms",
            config.idle_backoff_ms
        )));
    }

    Ok(())
}

/// Validates analyze pool configuration
fn validate_analyze_config(config: &AnalyzeConfig) -> Result<(), ConfigError> {
    if config.pool_size < 1 {
        return Err(ConfigError::Validation(format!(
            "analyze pool-size must be >= 1, got {}",
            config.pool_size
        )));
    }

    if config.buffer_soft_limit == Some(0) {
        return Err(ConfigError::Validation(
            "buffer-soft-limit must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_stats_config(config: &StatsConfig) -> Result<(), ConfigError> {
    if config.interval < 1 {
        return Err(ConfigError::Validation(format!(
            "stats interval must be >= 1s, got {}s",
            config.interval
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.backend == FrontierBackend::Sqlite {
        match config.database_path.as_deref() {
            Some(path) if !path.is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(
                    "frontier database-path is required for the sqlite backend".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "output database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates analyzer selectors by compiling them
fn validate_analyzer_config(config: &AnalyzerConfig) -> Result<(), ConfigError> {
    validate_selector(&config.link_selector)?;
    if let Some(item_selector) = &config.item_selector {
        validate_selector(item_selector)?;
    }
    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

/// Validates seed URLs
fn validate_seeds(seeds: &SeedConfig) -> Result<(), ConfigError> {
    if seeds.urls.is_empty() {
        return Err(ConfigError::Validation(
            "At least one seed URL is required".to_string(),
        ));
    }

    for seed in &seeds.urls {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
