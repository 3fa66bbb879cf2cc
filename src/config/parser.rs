use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
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
/// use recursive_dl::config::load_config;
///
/// let config = load_config(Path::new("recursive-dl.toml")).unwrap();
/// println!("Workers: {}", config.crawl.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = parse_config_file(path)?;
    validate(&config)?;
    Ok(config)
}

/// Reads and parses a configuration file without validating it
///
/// Used when command line values still have to be layered on top; the
/// caller validates the merged result.
pub fn parse_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parses configuration from a TOML string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchMode;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawl]
search = ["*.mp3", "*.flac>*.mp3"]
mode = "firefox"
workers = 2
output = "./music"

[http]
user-agent = "TestAgent/1.0"
page-timeout-secs = 10

[browser]
headless = false
settle-ms = 250
webdriver-url = "http://127.0.0.1:4444"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.search.len(), 2);
        assert_eq!(config.crawl.mode, FetchMode::Firefox);
        assert_eq!(config.crawl.workers, 2);
        assert_eq!(config.crawl.output, PathBuf::from("./music"));
        assert_eq!(config.http.user_agent, "TestAgent/1.0");
        assert_eq!(config.http.page_timeout_secs, 10);
        assert_eq!(config.http.download_timeout_secs, 60);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.settle_ms, 250);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.crawl.workers, 4);
        assert_eq!(config.crawl.mode, FetchMode::Requests);
        assert!(config.crawl.search.is_empty());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/recursive-dl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = parse_config_str("[crawl]\nmode = \"safari\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = parse_config_str("[crawl]\ndelay = 2.0\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawl]
search = ["*.mp3"]
workers = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
