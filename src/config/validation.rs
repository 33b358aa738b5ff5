use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
///
/// Checks that cannot be expressed through the type system: URLs must
/// parse, timeouts and retry counts must be non-zero, and the PRADO form
/// field names must be present since the pagination postback is unusable
/// without them.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let url = Url::parse(&config.portal.search_url)
        .map_err(|e| ConfigError::Validation(format!("portal.search-url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "portal.search-url must be http(s), got {}",
            url.scheme()
        )));
    }

    if config.portal.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "portal.request-timeout-secs must be greater than 0".to_string(),
        ));
    }

    if config.portal.max_retries == 0 {
        return Err(ConfigError::Validation(
            "portal.max-retries must be greater than 0".to_string(),
        ));
    }

    if config.portal.pager_target.is_empty() || config.portal.num_page_field.is_empty() {
        return Err(ConfigError::Validation(
            "portal.pager-target and portal.num-page-field must not be empty".to_string(),
        ));
    }

    if config.storage.mongo_uri.is_empty() {
        return Err(ConfigError::Validation(
            "storage.mongo-uri must not be empty".to_string(),
        ));
    }

    if config.storage.database.is_empty() || config.storage.collection.is_empty() {
        return Err(ConfigError::Validation(
            "storage.database and storage.collection must not be empty".to_string(),
        ));
    }

    if config.state.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state.state-path must not be empty".to_string(),
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
    fn test_rejects_bad_url() {
        let mut config = Config::default();
        config.portal.search_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = Config::default();
        config.portal.search_url = "ftp://portal.example/".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::default();
        config.portal.request_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_retries() {
        let mut config = Config::default();
        config.portal.max_retries = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_pager_target() {
        let mut config = Config::default();
        config.portal.pager_target = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_state_path() {
        let mut config = Config::default();
        config.state.state_path = String::new();
        assert!(validate(&config).is_err());
    }
}
