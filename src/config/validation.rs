use crate::config::types::{BrowserConfig, Config, CrawlConfig, HttpConfig};
use crate::pattern::parse_stages;
use crate::ConfigError;
use url::Url;

/// Largest accepted worker pool
pub const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_http_config(&config.http)?;
    validate_browser_config(&config.browser)?;
    Ok(())
}

/// Validates traversal settings
///
/// An empty search list is allowed here; the command line may still supply
/// one. Tokens that are present must parse.
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.output.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if !config.search.is_empty() {
        parse_stages(&config.search)
            .map_err(|e| ConfigError::Validation(format!("invalid search pattern: {}", e)))?;
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.page_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http page-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.download_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "download-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser settings
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.page_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "browser page-timeout-secs must be >= 1".to_string(),
        ));
    }

    let url = Url::parse(&config.webdriver_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webdriver-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "webdriver-url must use http or https, got '{}'",
            config.webdriver_url
        )));
    }

    Ok(())
}

/// Validates a seed URL given on the command line
pub fn validate_seed_url(seed: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    Ok(url)
}
