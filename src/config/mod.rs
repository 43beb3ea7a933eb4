//! Configuration module for Page-Lens
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use page_lens::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("page-lens.toml")).unwrap();
//! println!("Probes in flight: {}", config.crawler.max_concurrent_probes);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, HubConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
