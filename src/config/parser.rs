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
/// use catalog_sweep::config::load_config;
///
/// let config = load_config(Path::new("sweep.toml")).unwrap();
/// println!("Sources: {}", config.sources.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of configuration text
///
/// A checkpoint written under one hash is not resumed under another.
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes a SHA-256 hash of the configuration file content
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
    Ok(compute_content_hash(&content))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, compute_content_hash(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversalMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID: &str = r#"
[crawler]
source-group = "pointsite"
worker-count = 2
settle-interval-ms = 500
delay-between-pages-ms = 1500

[browser]
max-uses-per-session = 40
user-agent = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X)"
viewport-width = 390
viewport-height = 844

[checkpoint]
path = "./state/checkpoint.json"

[output]
database-path = "./catalog.db"
report-dir = "./reports"
summary-path = "./summary.md"

[[source]]
id = "shopping"
url = "https://pointsite.test/list.php?category=66&page={page}"
mode = "paged"
end-marker-text = "No ads found"
id-pattern = '/ad_details/(?:redirect/)?(\d+)'

[source.extract]
item = ".box01"
title = ".title"
price = ".point"

[source.extract.attributes]
condition = ".condition"

[source.tags]
category = "shopping"

[[source]]
id = "games"
url = "https://pointsite.test/list.php?category=70"
mode = "infinite-scroll"
stability-threshold = 4

[source.extract]
item = ".box01"
title = ".title"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.source_group, "pointsite");
        assert_eq!(config.crawler.worker_count, 2);
        assert_eq!(config.crawler.max_consecutive_empty_pages, 3);
        assert_eq!(config.crawler.delay_between_pages_ms, 1500);
        assert_eq!(config.crawler.delay_between_sources_ms, 2000);
        assert_eq!(config.crawler.retry_backoff_ms, 2000);
        assert_eq!(config.browser.viewport_width, 390);
        assert_eq!(config.checkpoint.interval_items, 10);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].mode, TraversalMode::InfiniteScroll);
        assert_eq!(
            config.sources[0].tags.get("category").map(String::as_str),
            Some("shopping")
        );
        assert_eq!(
            config.catalog.hash_fields,
            vec!["category", "condition", "device"]
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/sweep.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_hash() {
        let file = create_temp_config(VALID);
        let (_, hash) = load_config_with_hash(file.path()).unwrap();
        assert_eq!(hash, compute_config_hash(file.path()).unwrap());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(
            compute_content_hash("content 1"),
            compute_content_hash("content 2")
        );
        assert_eq!(compute_content_hash("same"), compute_content_hash("same"));
    }
}
