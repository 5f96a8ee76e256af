//! Statement ingestion and query endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lrs_common::time;

use crate::db::statements::{self, StatementFilter};
use crate::services::ingest_statements;
use crate::{ApiError, ApiResult, AppState};

/// Acknowledgment for POST /statements
#[derive(Debug, Serialize)]
pub struct PostStatementsResponse {
    /// Statement ids in submission order
    pub ids: Vec<String>,
}

/// GET /statements query parameters
#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    /// Actor key (as derived at ingestion)
    pub actor: String,
    pub activity: Option<String>,
    pub verb: Option<String>,
    pub registration: Option<String>,
    /// RFC 3339, inclusive
    pub since: Option<String>,
    /// RFC 3339, exclusive
    pub until: Option<String>,
    pub limit: Option<u32>,
}

/// POST /statements
///
/// **Request:** one statement object or an array of statement objects
/// **Response:** `{"ids": [...]}` once the batch is stored
///
/// **Errors:**
/// - 400 Bad Request: malformed statement (nothing stored)
/// - 409 Conflict: id reused with different content (nothing stored)
/// - 503 Service Unavailable: store busy after retries
pub async fn post_statements(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<PostStatementsResponse>> {
    let outcome = ingest_statements(&state, body).await?;
    Ok(Json(PostStatementsResponse { ids: outcome.ids }))
}

/// GET /statements?actor=...
///
/// Full stored statements of one learner, oldest first.
pub async fn get_statements(
    State(state): State<AppState>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    if query.actor.trim().is_empty() {
        return Err(ApiError::BadRequest("actor must not be empty".to_string()));
    }

    let filter = StatementFilter {
        activity_id: query.activity,
        course_activity_id: None,
        verb_id: query.verb,
        registration: query.registration,
        since: query.since.as_deref().map(time::parse_rfc3339).transpose()?,
        until: query.until.as_deref().map(time::parse_rfc3339).transpose()?,
        limit: query.limit,
    };

    let found = statements::query_by_actor(&state.db, &query.actor, &filter).await?;
    Ok(Json(found.into_iter().map(|stored| stored.payload).collect()))
}

/// GET /statements/{id}
pub async fn get_statement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    statements::get(&state.db, &id)
        .await?
        .map(|stored| Json(stored.payload))
        .ok_or_else(|| ApiError::NotFound(format!("statement {}", id)))
}

/// Build statement routes
pub fn statement_routes() -> Router<AppState> {
    Router::new()
        .route("/statements", get(get_statements).post(post_statements))
        .route("/statements/:id", get(get_statement))
}
