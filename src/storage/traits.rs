//! Sink trait and storage error types

use crate::records::AnnouncementRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// The two variants carry different blast radii: a `Write` failure concerns
/// one record and the orchestrator skips it; a `Connection` failure means
/// the backend is unreachable and aborts the page and the run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Connection(String),

    #[error("Failed to write record {reference}: {message}")]
    Write { reference: String, message: String },
}

impl StorageError {
    /// True when the whole run must stop rather than skip one record
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What an upsert did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No document carried this reference before
    Inserted,
    /// An existing document was replaced (possibly with identical content)
    Updated,
}

/// Idempotent record sink keyed by `reference`
#[async_trait]
pub trait AnnouncementSink: Send + Sync {
    /// Inserts the record, or replaces the existing document with the same
    /// `reference`. Safe to call twice with identical input.
    async fn upsert(&self, record: &AnnouncementRecord) -> StorageResult<UpsertOutcome>;
}
