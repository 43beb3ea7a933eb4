use crate::config::types::{Config, CrawlerConfig, HubConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_hub_config(&config.hub)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates fetch and probe limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_timeout_secs < 1 || config.page_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "page_timeout_secs must be between 1 and 300, got {}",
            config.page_timeout_secs
        )));
    }

    if config.probe_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "probe_timeout_secs must be >= 1, got {}",
            config.probe_timeout_secs
        )));
    }

    // Probe timeout stays below the page timeout
    if config.probe_timeout_secs >= config.page_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "probe_timeout_secs ({}) must be shorter than page_timeout_secs ({})",
            config.probe_timeout_secs, config.page_timeout_secs
        )));
    }

    if config.max_concurrent_probes < 1 || config.max_concurrent_probes > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_probes must be between 1 and 256, got {}",
            config.max_concurrent_probes
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

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates event hub sizing
fn validate_hub_config(config: &HubConfig) -> Result<(), ConfigError> {
    if config.subscriber_queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "subscriber_queue_capacity must be >= 1".to_string(),
        ));
    }

    if config.command_buffer < 1 {
        return Err(ConfigError::Validation(
            "command_buffer must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_probe_timeout_must_be_shorter_than_page_timeout() {
        let mut config = Config::default();
        config.crawler.page_timeout_secs = 10;
        config.crawler.probe_timeout_secs = 10;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));

        config.crawler.probe_timeout_secs = 5;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_probe_bounds() {
        let mut config = Config::default();
        config.crawler.max_concurrent_probes = 0;
        assert!(validate(&config).is_err());

        config.crawler.max_concurrent_probes = 257;
        assert!(validate(&config).is_err());

        config.crawler.max_concurrent_probes = 256;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_crawler_name_characters() {
        let mut config = Config::default();
        config.user_agent.crawler_name = "Page Lens".to_string();
        assert!(validate(&config).is_err());

        config.user_agent.crawler_name = "Page-Lens2".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_contact_url() {
        let mut config = Config::default();
        config.user_agent.contact_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut config = Config::default();
        config.hub.subscriber_queue_capacity = 0;
        assert!(validate(&config).is_err());
    }
}
