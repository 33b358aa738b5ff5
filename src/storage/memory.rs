//! In-memory announcement sink
//!
//! Backs tests and dry runs with the same upsert contract as the MongoDB
//! sink. Failure injection hooks let orchestrator tests exercise the
//! per-record-skip and backend-outage paths.

use crate::records::AnnouncementRecord;
use crate::storage::traits::{AnnouncementSink, StorageError, StorageResult, UpsertOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemorySink {
    records: Mutex<HashMap<String, AnnouncementRecord>>,
    failing_references: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct references stored
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored record for a reference, if any
    pub fn get(&self, reference: &str) -> Option<AnnouncementRecord> {
        self.records.lock().unwrap().get(reference).cloned()
    }

    /// All stored records, sorted by reference for deterministic assertions
    pub fn snapshot(&self) -> Vec<AnnouncementRecord> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.reference.cmp(&b.reference));
        records
    }

    /// Makes future upserts of this reference fail with a `Write` error
    pub fn fail_writes_for(&self, reference: &str) {
        self.failing_references
            .lock()
            .unwrap()
            .insert(reference.to_string());
    }

    /// Simulates a backend outage: every upsert fails with `Connection`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnnouncementSink for MemorySink {
    async fn upsert(&self, record: &AnnouncementRecord) -> StorageResult<UpsertOutcome> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Connection(
                "memory sink marked unavailable".to_string(),
            ));
        }

        if self
            .failing_references
            .lock()
            .unwrap()
            .contains(&record.reference)
        {
            return Err(StorageError::Write {
                reference: record.reference.clone(),
                message: "injected write failure".to_string(),
            });
        }

        let mut records = self.records.lock().unwrap();
        match records.insert(record.reference.clone(), record.clone()) {
            None => Ok(UpsertOutcome::Inserted),
            Some(_) => Ok(UpsertOutcome::Updated),
        }
    }
}
