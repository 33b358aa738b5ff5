//! Durable crawl progress tracking
//!
//! The resume state records the next page to process and the last PRADO
//! token seen, and is rewritten atomically after every successfully
//! processed page so a crash at any point leaves a valid checkpoint behind.

mod resume;

pub use resume::{CrawlState, StateStore};
