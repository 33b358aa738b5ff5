//! Run orchestration: the sequential page-by-page harvest loop
//!
//! One logical worker drives the portal's session-stateful pagination:
//! refresh the token, fetch the page, extract, store, checkpoint, repeat.
//! The remote protocol cannot be parallelized — concurrent fetches would
//! race on token validity and invalidate each other — so the only
//! suspension points are the network calls and the fixed inter-page delay.
//!
//! The resume state only advances after a page is fully stored. Any
//! failure leaves it at the last successful checkpoint, so the next run
//! resumes exactly there.

use crate::config::Config;
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::PortalClient;
use crate::state::{CrawlState, StateStore};
use crate::storage::{AnnouncementSink, UpsertOutcome};
use crate::Result;
use std::time::Duration;
use url::Url;

/// Why a run stopped cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The explicit page limit for this invocation was reached
    PageLimit,
    /// The pager chrome showed no next-page control
    EndOfPagination,
    /// The current page reached or passed the reported total page count
    TotalPagesReached,
    /// The reported total shrank mid-run; stopping is safer than guessing
    /// how the remote result set was reshuffled
    TotalShrank,
}

/// Counters for one completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_processed: u32,
    pub records_seen: u64,
    pub records_inserted: u64,
    pub records_updated: u64,
    pub records_skipped: u64,
    pub stopped: StopReason,
}

/// Drives a complete harvest run
///
/// * `page_limit` - cap on pages processed this invocation; `None` runs
///   until the pagination ends
/// * `no_resume` - ignore the persisted state and start at page 1
///
/// Before every page, including the first, the search page is re-fetched
/// for a fresh token; the token is never reused across two target pages.
/// Page 1 is served by the search GET itself, so no postback is issued
/// for it.
///
/// # Errors
///
/// Fetch failures that survive retries, structural extraction failures,
/// and storage outages all abort the run with the state left at the last
/// successful checkpoint.
pub async fn run_harvest<S: AnnouncementSink>(
    config: &Config,
    sink: &S,
    store: &StateStore,
    page_limit: Option<u32>,
    no_resume: bool,
) -> Result<RunSummary> {
    let base_url = Url::parse(&config.portal.search_url)?;
    let client = PortalClient::open(config.portal.clone())?;

    let mut state = if no_resume {
        tracing::info!("Ignoring persisted state, starting at page 1");
        CrawlState::default()
    } else {
        store.load()
    };
    tracing::info!(
        "Starting harvest at page {} (limit: {:?})",
        state.current_page,
        page_limit
    );

    let mut summary = RunSummary {
        pages_processed: 0,
        records_seen: 0,
        records_inserted: 0,
        records_updated: 0,
        records_skipped: 0,
        stopped: StopReason::EndOfPagination,
    };
    let mut last_known_total: Option<u32> = None;

    loop {
        if let Some(limit) = page_limit {
            if summary.pages_processed >= limit {
                summary.stopped = StopReason::PageLimit;
                break;
            }
        }

        let page = state.current_page;

        // Refresh the token unconditionally before every page
        let search = client.fetch_search_page().await?;
        tracing::debug!("Fetched fresh page-state token for page {}", page);

        let html = if page == 1 {
            search.html
        } else {
            client.fetch_result_page(page, &search.prado_state).await?
        };

        let result = extract(&html, &base_url, page)?;

        if let Some(total) = result.total_pages {
            if page > total {
                tracing::warn!(
                    "Resume state points at page {} but the portal reports only {} pages, stopping",
                    page,
                    total
                );
                summary.stopped = StopReason::TotalPagesReached;
                break;
            }
        }

        tracing::info!(
            "Page {}: {} announcements extracted (total pages: {})",
            page,
            result.records.len(),
            result
                .total_pages
                .map_or_else(|| "unknown".to_string(), |t| t.to_string())
        );

        for record in &result.records {
            summary.records_seen += 1;
            match sink.upsert(record).await {
                Ok(UpsertOutcome::Inserted) => summary.records_inserted += 1,
                Ok(UpsertOutcome::Updated) => summary.records_updated += 1,
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Skipping record {}: {}", record.reference, e);
                    summary.records_skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Checkpoint only once the whole page has been stored
        state = CrawlState {
            current_page: page + 1,
            prado_state: Some(search.prado_state),
        };
        store.save(&state)?;
        summary.pages_processed += 1;

        let shrank = matches!(
            (last_known_total, result.total_pages),
            (Some(before), Some(now)) if now < before
        );
        if shrank {
            tracing::warn!(
                "Total page count shrank from {:?} to {:?} mid-run, stopping",
                last_known_total,
                result.total_pages
            );
            summary.stopped = StopReason::TotalShrank;
            break;
        }
        last_known_total = result.total_pages.or(last_known_total);

        if !result.has_next_page {
            summary.stopped = StopReason::EndOfPagination;
            break;
        }
        if let Some(total) = result.total_pages {
            if page >= total {
                summary.stopped = StopReason::TotalPagesReached;
                break;
            }
        }

        let more_allowed = page_limit.map_or(true, |limit| summary.pages_processed < limit);
        if more_allowed {
            tokio::time::sleep(Duration::from_millis(
                config.portal.delay_between_requests_ms,
            ))
            .await;
        }
    }

    tracing::info!(
        "Harvest done ({:?}): {} pages, {} records ({} inserted, {} updated, {} skipped)",
        summary.stopped,
        summary.pages_processed,
        summary.records_seen,
        summary.records_inserted,
        summary.records_updated,
        summary.records_skipped
    );
    Ok(summary)
}
