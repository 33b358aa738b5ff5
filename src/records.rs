//! Normalized announcement schema and per-page extraction results
//!
//! Field names serialize in the camelCase form used by the storage
//! collection (`datePublication`, `acheteurPublic`, ...), so the documents
//! written by the sink and the documents served by the query API share one
//! schema.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One line item of a multi-lot procurement notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub label: String,
}

/// An attachment linked from an announcement row (tender documents, PDFs)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub label: String,
    pub url: String,
}

/// A single normalized procurement announcement
///
/// `reference` is the natural unique key and the upsert key; every other
/// field is best-effort. A field the extractor cannot locate stays `None`
/// or empty, it is never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementRecord {
    pub reference: String,

    pub procedure: Option<String>,

    pub categorie: Option<String>,

    #[serde(rename = "datePublication")]
    pub date_publication: Option<NaiveDate>,

    pub objet: Option<String>,

    #[serde(rename = "acheteurPublic")]
    pub acheteur_public: Option<String>,

    #[serde(default)]
    pub lots: Vec<Lot>,

    #[serde(rename = "lieuExecution")]
    pub lieu_execution: Option<String>,

    #[serde(rename = "dateLimite")]
    pub date_limite: Option<NaiveDateTime>,

    #[serde(rename = "piecesJointes", default)]
    pub pieces_jointes: Vec<Attachment>,

    #[serde(rename = "lienDeConsultation")]
    pub lien_de_consultation: Option<String>,
}

impl AnnouncementRecord {
    /// Creates an empty record carrying only the reference key
    pub fn with_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            procedure: None,
            categorie: None,
            date_publication: None,
            objet: None,
            acheteur_public: None,
            lots: Vec::new(),
            lieu_execution: None,
            date_limite: None,
            pieces_jointes: Vec::new(),
            lien_de_consultation: None,
        }
    }
}

/// Everything extracted from one result page; consumed once, never persisted
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Records in the order they appear on the page
    pub records: Vec<AnnouncementRecord>,

    /// Page number reported by the page chrome (falls back to the requested
    /// page when the chrome does not carry one)
    pub current_page: u32,

    /// Total page count from the pager, when the chrome exposes it
    pub total_pages: Option<u32>,

    /// Whether a "next page" control is present. Read from the chrome, not
    /// inferred from the record count: a short page near the end of the
    /// result set is normal.
    pub has_next_page: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_field_names_match_collection_schema() {
        let mut record = AnnouncementRecord::with_reference("AO-2024/17");
        record.acheteur_public = Some("Ministère de la Santé".to_string());
        record.date_publication = NaiveDate::from_ymd_opt(2024, 3, 12);
        record.pieces_jointes.push(Attachment {
            label: "reglement.pdf".to_string(),
            url: "https://example.com/reglement.pdf".to_string(),
        });

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["reference"], "AO-2024/17");
        assert_eq!(json["acheteurPublic"], "Ministère de la Santé");
        assert_eq!(json["datePublication"], "2024-03-12");
        assert_eq!(json["piecesJointes"][0]["label"], "reglement.pdf");
        assert!(json["dateLimite"].is_null());
    }

    #[test]
    fn test_round_trip_preserves_optional_gaps() {
        let record = AnnouncementRecord::with_reference("REF-1");
        let json = serde_json::to_string(&record).unwrap();
        let back: AnnouncementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.lots.is_empty());
    }
}
