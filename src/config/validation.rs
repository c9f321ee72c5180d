use crate::config::types::{
    BrowserSettings, CatalogConfig, CheckpointConfig, Config, CrawlerConfig, ExtractRules,
    OutputConfig, SourceConfig,
};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_settings(&config.browser)?;
    validate_checkpoint_config(&config.checkpoint)?;
    validate_output_config(&config.output)?;
    validate_catalog_config(&config.catalog)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_identifier("source-group", &config.source_group)?;

    if config.worker_count < 1 || config.worker_count > 32 {
        return Err(ConfigError::Validation(format!(
            "worker-count must be between 1 and 32, got {}",
            config.worker_count
        )));
    }

    if config.max_consecutive_empty_pages < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-empty-pages must be >= 1".to_string(),
        ));
    }

    if config.stability_threshold < 1 {
        return Err(ConfigError::Validation(
            "stability-threshold must be >= 1".to_string(),
        ));
    }

    if config.step_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "step-timeout-ms must be >= 100ms, got {}ms",
            config.step_timeout_ms
        )));
    }

    if !(0.0..=1.0).contains(&config.min_completion_rate) {
        return Err(ConfigError::Validation(format!(
            "min-completion-rate must be between 0.0 and 1.0, got {}",
            config.min_completion_rate
        )));
    }

    Ok(())
}

/// Validates browser settings
fn validate_browser_settings(config: &BrowserSettings) -> Result<(), ConfigError> {
    if config.max_uses_per_session < 1 {
        return Err(ConfigError::Validation(
            "max-uses-per-session must be >= 1".to_string(),
        ));
    }

    if config.health_check_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "health-check-timeout-ms must be >= 100ms, got {}ms",
            config.health_check_timeout_ms
        )));
    }

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(
            "viewport dimensions must be non-zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint path cannot be empty".to_string(),
        ));
    }

    if config.interval_items < 1 {
        return Err(ConfigError::Validation(
            "checkpoint interval-items must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.report_dir.is_empty() {
        return Err(ConfigError::Validation(
            "report-dir cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    if config.upsert_batch_size < 1 {
        return Err(ConfigError::Validation(
            "upsert-batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.hash_fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "hash-fields cannot contain empty names".to_string(),
        ));
    }
    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        validate_identifier("source id", &source.id)?;

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        let url = Url::parse(&source.listing_url()).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid URL for source '{}': {}", source.id, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Source '{}' must use an http(s) URL",
                source.id
            )));
        }

        if source.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "Source '{}': max-pages must be >= 1",
                source.id
            )));
        }

        if source.max_consecutive_empty_pages == Some(0) || source.stability_threshold == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Source '{}': thresholds must be >= 1",
                source.id
            )));
        }

        if let Some(text) = &source.end_marker_text {
            if text.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Source '{}': end-marker-text cannot be blank",
                    source.id
                )));
            }
        }

        if let Some(selector) = &source.end_marker_selector {
            validate_selector(&source.id, "end-marker-selector", selector)?;
        }

        if let Some(pattern) = &source.id_pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidPattern(format!(
                    "Source '{}': invalid id-pattern '{}': {}",
                    source.id, pattern, e
                ))
            })?;
        }

        validate_extract_rules(&source.id, &source.extract)?;
    }

    Ok(())
}

fn validate_extract_rules(source_id: &str, rules: &ExtractRules) -> Result<(), ConfigError> {
    validate_selector(source_id, "extract.item", &rules.item)?;
    validate_selector(source_id, "extract.title", &rules.title)?;
    validate_selector(source_id, "extract.link", &rules.link)?;

    if let Some(price) = &rules.price {
        validate_selector(source_id, "extract.price", price)?;
    }

    for (name, selector) in &rules.attributes {
        validate_selector(source_id, &format!("extract.attributes.{}", name), selector)?;
    }

    Ok(())
}

fn validate_selector(source_id: &str, field: &str, selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector).map_err(|e| {
        ConfigError::InvalidPattern(format!(
            "Source '{}': invalid CSS selector in {} '{}': {:?}",
            source_id, field, selector, e
        ))
    })?;
    Ok(())
}

/// Identifiers end up inside item ids, so the id separators are reserved
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
    }

    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "{} must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_config;

    const BASE: &str = r#"
[crawler]
source-group = "pointsite"

[checkpoint]
path = "./checkpoint.json"

[output]
database-path = "./catalog.db"
report-dir = "./reports"
summary-path = "./summary.md"
"#;

    fn with_source(source: &str) -> String {
        format!("{}\n{}", BASE, source)
    }

    const GOOD_SOURCE: &str = r#"
[[source]]
id = "shopping"
url = "https://shop.test/list?page={page}"
mode = "paged"

[source.extract]
item = ".box01"
title = ".title"
"#;

    #[test]
    fn test_valid_config() {
        assert!(parse_config(&with_source(GOOD_SOURCE)).is_ok());
    }

    #[test]
    fn test_no_sources() {
        let result = parse_config(BASE);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_duplicate_source_ids() {
        let doubled = format!("{}{}", GOOD_SOURCE, GOOD_SOURCE);
        let result = parse_config(&with_source(&doubled));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_source_id() {
        let src = GOOD_SOURCE.replace("id = \"shopping\"", "id = \"shop:ping\"");
        let result = parse_config(&with_source(&src));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_url() {
        let src = GOOD_SOURCE.replace("https://shop.test/list?page={page}", "not a url");
        let result = parse_config(&with_source(&src));
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_id_pattern() {
        let src = GOOD_SOURCE.replace(
            "mode = \"paged\"",
            "mode = \"paged\"\nid-pattern = 'ad_details/(\\d+'",
        );
        let result = parse_config(&with_source(&src));
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_invalid_selector() {
        let src = GOOD_SOURCE.replace("\".title\"", "\"..[\"");
        let result = parse_config(&with_source(&src));
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_zero_workers() {
        let cfg = with_source(GOOD_SOURCE).replace(
            "source-group = \"pointsite\"",
            "source-group = \"pointsite\"\nworker-count = 0",
        );
        let result = parse_config(&cfg);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_completion_rate_out_of_range() {
        let cfg = with_source(GOOD_SOURCE).replace(
            "source-group = \"pointsite\"",
            "source-group = \"pointsite\"\nmin-completion-rate = 1.5",
        );
        let result = parse_config(&cfg);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
