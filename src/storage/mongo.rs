//! MongoDB-backed announcement sink and query access
//!
//! One document per announcement, keyed by the natural `reference` field.
//! The upsert is a `replace_one` with `upsert: true`, so re-running a page
//! replaces documents with identical content instead of duplicating them.

use crate::config::StorageConfig;
use crate::records::AnnouncementRecord;
use crate::storage::traits::{AnnouncementSink, StorageError, StorageResult, UpsertOutcome};
use async_trait::async_trait;
use bson::{doc, Document};
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::error::ErrorKind;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};

/// Maps a driver error onto the sink's fatal/per-record split
fn classify(e: mongodb::error::Error, reference: &str) -> StorageError {
    match *e.kind {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Authentication { .. } => StorageError::Connection(e.to_string()),
        _ => StorageError::Write {
            reference: reference.to_string(),
            message: e.to_string(),
        },
    }
}

/// Filters accepted by the announcement query surface
///
/// `reference` matches exactly; `procedure`, `categorie` and
/// `acheteur_public` are case-insensitive substring matches (mirroring how
/// operators search the portal itself); the publication date range is
/// inclusive on both ends. Dates are stored as ISO-8601 strings, so string
/// comparison orders them correctly.
#[derive(Debug, Clone)]
pub struct AnnouncementQuery {
    pub reference: Option<String>,
    pub procedure: Option<String>,
    pub categorie: Option<String>,
    pub acheteur_public: Option<String>,
    pub date_publication_from: Option<NaiveDate>,
    pub date_publication_to: Option<NaiveDate>,
    pub limit: i64,
    pub skip: u64,
}

impl Default for AnnouncementQuery {
    fn default() -> Self {
        Self {
            reference: None,
            procedure: None,
            categorie: None,
            acheteur_public: None,
            date_publication_from: None,
            date_publication_to: None,
            limit: 20,
            skip: 0,
        }
    }
}

impl AnnouncementQuery {
    /// Builds the MongoDB filter document for this query
    pub fn filter_document(&self) -> Document {
        let mut filter = Document::new();

        if let Some(reference) = &self.reference {
            filter.insert("reference", reference);
        }

        for (field, value) in [
            ("procedure", &self.procedure),
            ("categorie", &self.categorie),
            ("acheteurPublic", &self.acheteur_public),
        ] {
            if let Some(value) = value {
                filter.insert(
                    field,
                    doc! { "$regex": regex::escape(value), "$options": "i" },
                );
            }
        }

        let mut range = Document::new();
        if let Some(from) = self.date_publication_from {
            range.insert("$gte", from.to_string());
        }
        if let Some(to) = self.date_publication_to {
            range.insert("$lte", to.to_string());
        }
        if !range.is_empty() {
            filter.insert("datePublication", range);
        }

        filter
    }
}

/// MongoDB sink for harvested announcements
#[derive(Clone)]
pub struct MongoSink {
    collection: Collection<AnnouncementRecord>,
}

impl MongoSink {
    /// Connects to MongoDB and ensures the collection indexes exist
    ///
    /// Unique index on `reference` (the upsert key), secondary indexes on
    /// `datePublication` and `procedure` for the query surface.
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let client = Client::with_uri_str(&config.mongo_uri)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let collection = client
            .database(&config.database)
            .collection::<AnnouncementRecord>(&config.collection);

        let sink = Self { collection };
        sink.ensure_indexes().await?;
        Ok(sink)
    }

    async fn ensure_indexes(&self) -> StorageResult<()> {
        let unique_reference = IndexModel::builder()
            .keys(doc! { "reference": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let by_publication = IndexModel::builder()
            .keys(doc! { "datePublication": -1 })
            .build();
        let by_procedure = IndexModel::builder()
            .keys(doc! { "procedure": 1 })
            .build();

        for index in [unique_reference, by_publication, by_procedure] {
            self.collection
                .create_index(index)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    /// Runs a filtered query, newest publications first
    pub async fn find(&self, query: &AnnouncementQuery) -> StorageResult<Vec<AnnouncementRecord>> {
        let cursor = self
            .collection
            .find(query.filter_document())
            .sort(doc! { "datePublication": -1 })
            .skip(query.skip)
            .limit(query.limit)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Looks up a single announcement by its reference
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> StorageResult<Option<AnnouncementRecord>> {
        self.collection
            .find_one(doc! { "reference": reference })
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl AnnouncementSink for MongoSink {
    async fn upsert(&self, record: &AnnouncementRecord) -> StorageResult<UpsertOutcome> {
        let result = self
            .collection
            .replace_one(doc! { "reference": &record.reference }, record)
            .upsert(true)
            .await
            .map_err(|e| classify(e, &record.reference))?;

        if result.upserted_id.is_some() {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_has_empty_filter() {
        let query = AnnouncementQuery::default();
        assert!(query.filter_document().is_empty());
    }

    #[test]
    fn test_reference_filter_is_exact() {
        let query = AnnouncementQuery {
            reference: Some("AO-42/2024".to_string()),
            ..Default::default()
        };
        let filter = query.filter_document();
        assert_eq!(filter.get_str("reference").unwrap(), "AO-42/2024");
    }

    #[test]
    fn test_text_filters_are_case_insensitive_substrings() {
        let query = AnnouncementQuery {
            acheteur_public: Some("santé".to_string()),
            ..Default::default()
        };
        let filter = query.filter_document();
        let regex = filter.get_document("acheteurPublic").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), "santé");
        assert_eq!(regex.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let query = AnnouncementQuery {
            procedure: Some("AO (ouvert)".to_string()),
            ..Default::default()
        };
        let filter = query.filter_document();
        let regex = filter.get_document("procedure").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), r"AO \(ouvert\)");
    }

    #[test]
    fn test_date_range_is_inclusive_both_ends() {
        let query = AnnouncementQuery {
            date_publication_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            date_publication_to: NaiveDate::from_ymd_opt(2024, 6, 30),
            ..Default::default()
        };
        let filter = query.filter_document();
        let range = filter.get_document("datePublication").unwrap();
        assert_eq!(range.get_str("$gte").unwrap(), "2024-01-01");
        assert_eq!(range.get_str("$lte").unwrap(), "2024-06-30");
    }

    #[test]
    fn test_half_open_date_range() {
        let query = AnnouncementQuery {
            date_publication_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let range = query.filter_document();
        let range = range.get_document("datePublication").unwrap();
        assert!(range.get_str("$gte").is_ok());
        assert!(range.get_str("$lte").is_err());
    }
}
