//! Read-only query surface over the harvested collection
//!
//! Served by the `serve` subcommand:
//! - `GET /health`
//! - `GET /announcements` with exact/substring/date-range filters
//! - `GET /announcements/{reference}`
//!
//! Announcements are addressed by their natural `reference` key, the same
//! key the sink upserts on.

use crate::config::ApiConfig;
use crate::storage::{AnnouncementQuery, MongoSink, StorageError};
use crate::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Query-string parameters of `GET /announcements`
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub reference: Option<String>,
    pub procedure: Option<String>,
    pub categorie: Option<String>,
    #[serde(rename = "acheteurPublic")]
    pub acheteur_public: Option<String>,
    #[serde(rename = "datePublication_from")]
    pub date_publication_from: Option<NaiveDate>,
    #[serde(rename = "datePublication_to")]
    pub date_publication_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

impl ListParams {
    /// Converts the request parameters into a storage query, clamping the
    /// page size to sane bounds
    pub fn into_query(self) -> AnnouncementQuery {
        AnnouncementQuery {
            reference: self.reference,
            procedure: self.procedure,
            categorie: self.categorie,
            acheteur_public: self.acheteur_public,
            date_publication_from: self.date_publication_from,
            date_publication_to: self.date_publication_to,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            skip: self.skip.unwrap_or(0),
        }
    }
}

enum ApiError {
    NotFound,
    Storage(StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "announcement not found" })),
            )
                .into_response(),
            ApiError::Storage(e) => {
                tracing::error!("Query failed: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "storage unavailable" })),
                )
                    .into_response()
            }
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_list(
    State(sink): State<MongoSink>,
    Query(params): Query<ListParams>,
) -> std::result::Result<Response, ApiError> {
    let records = sink
        .find(&params.into_query())
        .await
        .map_err(ApiError::Storage)?;
    Ok(Json(records).into_response())
}

async fn handle_get(
    State(sink): State<MongoSink>,
    Path(reference): Path<String>,
) -> std::result::Result<Response, ApiError> {
    let record = sink
        .find_by_reference(&reference)
        .await
        .map_err(ApiError::Storage)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(record).into_response())
}

/// Builds the API router over a connected sink
pub fn router(sink: MongoSink) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/announcements", get(handle_list))
        .route("/announcements/:reference", get(handle_get))
        .with_state(sink)
}

/// Binds the query server and runs it until the process stops
pub async fn serve(config: &ApiConfig, sink: MongoSink) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("Query API listening on {}", config.bind);

    axum::serve(listener, router(sink)).await?;
    Ok(())
}
