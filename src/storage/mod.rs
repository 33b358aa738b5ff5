//! Storage sinks for harvested announcements
//!
//! The sink contract is a single idempotent upsert keyed by the natural
//! `reference` field: running the same page twice produces no duplicate
//! and no spurious change. The production backend is MongoDB; an
//! in-memory sink backs tests and dry runs.

mod memory;
mod mongo;
mod traits;

pub use memory::MemorySink;
pub use mongo::{AnnouncementQuery, MongoSink};
pub use traits::{AnnouncementSink, StorageError, StorageResult, UpsertOutcome};
