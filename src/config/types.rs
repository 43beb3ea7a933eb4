use serde::Deserialize;

/// Main configuration structure for Page-Lens
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub hub: HubConfig,
    pub output: OutputConfig,
}

/// Page fetch and link probe behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Timeout for fetching the submitted page (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Timeout for each link probe (seconds), shorter than the page timeout
    #[serde(rename = "probe-timeout-secs", default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Maximum number of link probes in flight for one job
    #[serde(rename = "max-concurrent-probes", default = "default_max_probes")]
    pub max_concurrent_probes: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// Event hub sizing
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Outbound queue capacity per subscriber before it is dropped as unresponsive
    #[serde(rename = "subscriber-queue-capacity", default = "default_queue_capacity")]
    pub subscriber_queue_capacity: usize,

    /// Capacity of the command channel feeding the hub task
    #[serde(rename = "command-buffer", default = "default_command_buffer")]
    pub command_buffer: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_page_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_max_probes() -> u32 {
    16
}

fn default_queue_capacity() -> usize {
    256
}

fn default_command_buffer() -> usize {
    1024
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: default_page_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            max_concurrent_probes: default_max_probes(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: default_queue_capacity(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "PageLens".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
            hub: HubConfig::default(),
            output: OutputConfig {
                database_path: "./page-lens.db".to_string(),
            },
        }
    }
}
