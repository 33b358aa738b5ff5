//! Crawl engine: fetching, extraction, and run orchestration
//!
//! This module contains the core harvesting logic:
//! - the PRADO session client and pagination postbacks
//! - HTML extraction into normalized announcement records
//! - the sequential page loop with per-page checkpointing

mod coordinator;
mod extractor;
mod fetcher;

pub use coordinator::{run_harvest, RunSummary, StopReason};
pub use extractor::{extract, normalize_popup_link, parse_date, parse_date_time};
pub use fetcher::{extract_prado_state, PortalClient, SearchPage};
