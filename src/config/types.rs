use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Portal endpoint and PRADO pagination protocol settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// Announcement search endpoint (GET yields page 1 and a fresh token)
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// User agent sent on every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Fixed delay between page requests, in milliseconds
    #[serde(rename = "delay-between-requests-ms")]
    pub delay_between_requests_ms: u64,

    /// Retry attempts for transient network failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// PRADO postback target for the "go to page N" pager event
    #[serde(rename = "pager-target")]
    pub pager_target: String,

    /// Name of the form field carrying the requested page number
    #[serde(rename = "num-page-field")]
    pub num_page_field: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.marchespublics.gov.ma/index.php?page=entreprise.EntrepriseAdvancedSearch&searchAnnCons&keyWord=".to_string(),
            user_agent: "Mozilla/5.0 (Harvester pour analyse des marches publics)".to_string(),
            request_timeout_secs: 15,
            delay_between_requests_ms: 2000,
            max_retries: 3,
            pager_target: "ctl0$CONTENU_PAGE$resultSearch$PagerTop$ctl2".to_string(),
            num_page_field: "ctl0$CONTENU_PAGE$resultSearch$numPageTop".to_string(),
        }
    }
}

/// MongoDB target for harvested announcements
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(rename = "mongo-uri")]
    pub mongo_uri: String,

    pub database: String,

    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017/".to_string(),
            database: "marches_publics".to_string(),
            collection: "annonces".to_string(),
        }
    }
}

/// Resume state location
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Path of the JSON checkpoint file, replaced atomically on each page
    #[serde(rename = "state-path")]
    pub state_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_path: "state.json".to_string(),
        }
    }
}

/// Query API server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Socket address the `serve` subcommand binds to
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
