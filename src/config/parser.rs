use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_relay::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Fetch workers: {}", config.fetch.pool_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is logged at startup so a resumed crawl can be matched to the
/// configuration it was started with.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CrawlSettings, FrontierBackend};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./items.db"

[seeds]
urls = ["https://example.com/"]
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetch.pool_size, 10);
        assert_eq!(config.analyze.pool_size, 4);
        assert_eq!(config.stats.interval, 5);
        assert_eq!(config.frontier.backend, FrontierBackend::Memory);
        assert_eq!(config.analyzer.link_selector, "a[href]");
        assert!(!config.seeds.reset);
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r#"
[fetch]
pool-size = 3
politeness-delay = 0.5
request-timeout = 10
idle-backoff-ms = 50

[analyze]
pool-size = 2
buffer-soft-limit = 500

[stats]
interval = 2

[shutdown]
drain-timeout = 60

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[frontier]
backend = "sqlite"
database-path = "./frontier.db"

[output]
database-path = "./items.db"

[analyzer]
link-selector = "a.page-numbers"
item-selector = ".post-meta"
same-host-only = true

[seeds]
urls = ["https://example.com/", "https://example.com/blog"]
reset = true
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetch.pool_size, 3);
        assert_eq!(config.analyze.buffer_soft_limit, Some(500));
        assert_eq!(config.frontier.backend, FrontierBackend::Sqlite);
        assert_eq!(config.analyzer.item_selector.as_deref(), Some(".post-meta"));
        assert_eq!(config.seeds.urls.len(), 2);
        assert!(config.seeds.reset);

        let settings = CrawlSettings::try_from(&config).unwrap();
        assert_eq!(settings.fetch_workers, 3);
        assert_eq!(settings.analyze_workers, 2);
        assert_eq!(settings.politeness_delay, Duration::from_millis(500));
        assert_eq!(settings.idle_backoff, Duration::from_millis(50));
        assert_eq!(settings.stats_interval, Duration::from_secs(2));
        assert_eq!(settings.drain_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = format!("{}\n[analyze]\npool-size = 0\n", MINIMAL);
        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_huge_politeness_delay_is_rejected() {
        let config_content = format!("{}\n[fetch]\npoliteness-delay = 1e30\n", MINIMAL);
        let file = create_temp_config(&config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));

        // Settings built from an unvalidated config fail instead of panicking
        let mut config = load_config(create_temp_config(MINIMAL).path()).unwrap();
        config.fetch.politeness_delay = 1e30;
        assert!(matches!(
            CrawlSettings::try_from(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
