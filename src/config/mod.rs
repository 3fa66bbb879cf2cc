//! Configuration module for recursive-dl
//!
//! Settings come from four layers, highest priority first: command line
//! flags, environment variables (including a `.env` file), an optional TOML
//! file, and built-in defaults. The TOML file is parsed here; the command
//! line and environment layers arrive as [`Overrides`].
//!
//! # Example
//!
//! ```no_run
//! use recursive_dl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("recursive-dl.toml")).unwrap();
//! println!("Fetching with {} workers", config.crawl.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlConfig, FetchMode, HttpConfig, Overrides, DEFAULT_USER_AGENT,
};

// Re-export parser and validation functions
pub use parser::{load_config, parse_config_file, parse_config_str};
pub use validation::{validate, validate_seed_url, MAX_WORKERS};
