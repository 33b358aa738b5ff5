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
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

/// Loads a configuration file, falling back to built-in defaults when the
/// file does not exist
///
/// A present-but-broken file is still an error; only absence falls back, so
/// a typo in an existing config never silently reverts to defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
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
[portal]
search-url = "https://portal.example/index.php?page=search"
user-agent = "TestHarvester/1.0"
request-timeout-secs = 10
delay-between-requests-ms = 50
max-retries = 2
pager-target = "ctl0$resultSearch$PagerTop$ctl2"
num-page-field = "ctl0$resultSearch$numPageTop"

[storage]
mongo-uri = "mongodb://localhost:27017/"
database = "marches_test"
collection = "annonces"

[state]
state-path = "./state.json"

[api]
bind = "127.0.0.1:9090"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.portal.request_timeout_secs, 10);
        assert_eq!(config.portal.max_retries, 2);
        assert_eq!(config.storage.database, "marches_test");
        assert_eq!(config.api.bind, "127.0.0.1:9090");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config_content = r#"
[storage]
mongo-uri = "mongodb://db.internal:27017/"
database = "marches_publics"
collection = "annonces"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.storage.mongo_uri, "mongodb://db.internal:27017/");
        // Portal section absent entirely, defaults apply
        assert_eq!(config.portal.max_retries, 3);
        assert_eq!(config.state.state_path, "state.json");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvester.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/harvester.toml")).unwrap();
        assert!(config.portal.search_url.contains("marchespublics.gov.ma"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let config_content = r#"
[portal]
serch-url = "typo"
"#;
        let file = create_temp_config(config_content);
        assert!(load_config(file.path()).is_err());
    }
}
