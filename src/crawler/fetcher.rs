//! HTTP client for the PRADO portal
//!
//! This module owns the session side of the pagination protocol:
//! - one cookie-carrying client per run
//! - GET of the search page, which yields page 1 and a fresh page-state token
//! - POST of the pager postback that requests a specific result page
//! - retry with linear backoff on transient transport failures
//!
//! The token handed back by [`PortalClient::fetch_search_page`] is only
//! valid for the next postback. Callers must re-fetch the search page
//! before every result page; reusing a token across two target pages gets
//! rejected by the remote framework (an error page, or a silently
//! unchanged result set).

use crate::config::PortalConfig;
use crate::{HarvestError, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

/// Hidden input names carrying the page-state token, in preference order.
/// Older portal deployments used the underscored spelling.
const PRADO_STATE_FIELDS: [&str; 2] = ["PRADO_PAGESTATE", "PRADO_PAGE_STATE"];

/// Result of a search-page GET: the page HTML plus the token needed for
/// the next pager postback
#[derive(Debug)]
pub struct SearchPage {
    pub html: String,
    pub prado_state: String,
}

/// One HTTP session against the portal
///
/// Cookies accumulate across requests for the lifetime of the client;
/// dropping it releases the connection pool, so the session is scoped to
/// one orchestrator run.
pub struct PortalClient {
    client: Client,
    config: PortalConfig,
}

impl PortalClient {
    /// Builds the session client from the portal configuration
    pub fn open(config: PortalConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    /// GETs the announcements search page and extracts a fresh token
    ///
    /// # Errors
    ///
    /// * [`HarvestError::RetriesExhausted`] - transport kept failing
    /// * [`HarvestError::PageStructure`] - response carries no page-state
    ///   input, meaning the portal markup changed
    pub async fn fetch_search_page(&self) -> Result<SearchPage> {
        let html = self
            .with_retry(|| self.client.get(&self.config.search_url))
            .await?;

        let prado_state = extract_prado_state(&html).ok_or_else(|| {
            HarvestError::PageStructure(
                "search page carries no PRADO page-state input".to_string(),
            )
        })?;

        Ok(SearchPage { html, prado_state })
    }

    /// POSTs the "go to page N" pager event with a just-fetched token
    ///
    /// The form mirrors the portal's own pager postback: the page-state
    /// token, the pager control as postback target, and the requested page
    /// number in the pager's numeric field.
    pub async fn fetch_result_page(&self, page: u32, prado_state: &str) -> Result<String> {
        let page_number = page.to_string();
        let form: Vec<(&str, &str)> = vec![
            ("PRADO_PAGESTATE", prado_state),
            ("PRADO_POSTBACK_TARGET", &self.config.pager_target),
            ("PRADO_POSTBACK_PARAMETER", ""),
            (&self.config.num_page_field, &page_number),
        ];

        self.with_retry(|| self.client.post(&self.config.search_url).form(&form))
            .await
    }

    /// Sends a request, retrying transient failures with linear backoff
    ///
    /// Transport errors and non-success statuses both count as transient;
    /// the backoff grows by `delay-between-requests-ms` per attempt.
    async fn with_retry<F>(&self, build: F) -> Result<String>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let url = self.config.search_url.clone();
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries {
            match build().send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => last_error = format!("reading body: {}", e),
                    },
                    Err(e) => last_error = e.to_string(),
                },
                Err(e) => last_error = e.to_string(),
            }

            tracing::warn!(
                "Attempt {}/{} against {} failed: {}",
                attempt,
                self.config.max_retries,
                url,
                last_error
            );

            if attempt < self.config.max_retries {
                let backoff = Duration::from_millis(
                    self.config.delay_between_requests_ms * u64::from(attempt),
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(HarvestError::RetriesExhausted {
            url,
            attempts: self.config.max_retries,
            message: last_error,
        })
    }
}

/// Pulls the page-state token out of the search page markup
///
/// Accepts both historical spellings of the hidden input name.
pub fn extract_prado_state(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for name in PRADO_STATE_FIELDS {
        let selector = Selector::parse(&format!(r#"input[name="{}"]"#, name)).ok()?;
        if let Some(input) = document.select(&selector).next() {
            if let Some(value) = input.value().attr("value") {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}
