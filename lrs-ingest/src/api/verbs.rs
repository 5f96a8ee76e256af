//! Verb configuration endpoints
//!
//! Overrides take effect on the next ingestion or materialization; both
//! load the table fresh.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{VerbClassifier, VerbOverrides};
use crate::db::verbs;
use crate::models::{Classification, VerbConfiguration, VerbUsage};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct VerbIdQuery {
    pub verb_id: String,
}

/// GET /verbs/classify response
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub verb_id: String,
    #[serde(flatten)]
    pub classification: Classification,
}

/// GET /verbs
pub async fn list_verbs(State(state): State<AppState>) -> ApiResult<Json<Vec<VerbConfiguration>>> {
    Ok(Json(verbs::list(&state.db).await?))
}

/// PUT /verbs
///
/// **Request:** `{"verb_id": "...", "category": "custom", "action": "mark_completed", "description": "..."}`
pub async fn put_verb(
    State(state): State<AppState>,
    Json(config): Json<VerbConfiguration>,
) -> ApiResult<Json<VerbConfiguration>> {
    if config.verb_id.trim().is_empty() {
        return Err(ApiError::BadRequest("verb_id must not be empty".to_string()));
    }

    verbs::upsert(&state.db, &config).await?;
    info!(verb_id = %config.verb_id, action = %config.action, "Verb override saved");
    Ok(Json(config))
}

/// DELETE /verbs?verb_id=...
pub async fn delete_verb(
    State(state): State<AppState>,
    Query(query): Query<VerbIdQuery>,
) -> ApiResult<StatusCode> {
    if verbs::delete(&state.db, &query.verb_id).await? {
        info!(verb_id = %query.verb_id, "Verb override removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("verb override {}", query.verb_id)))
    }
}

/// GET /verbs/classify?verb_id=...
pub async fn classify_verb(
    State(state): State<AppState>,
    Query(query): Query<VerbIdQuery>,
) -> ApiResult<Json<ClassifyResponse>> {
    let classifier = VerbClassifier::new(VerbOverrides::new(verbs::list(&state.db).await?));
    let classification = classifier.classify(&query.verb_id);
    Ok(Json(ClassifyResponse {
        verb_id: query.verb_id,
        classification,
    }))
}

/// GET /verbs/stats
pub async fn verb_stats(State(state): State<AppState>) -> ApiResult<Json<Vec<VerbUsage>>> {
    Ok(Json(verbs::usage_stats(&state.db).await?))
}

/// Build verb routes
pub fn verb_routes() -> Router<AppState> {
    Router::new()
        .route("/verbs", get(list_verbs).put(put_verb).delete(delete_verb))
        .route("/verbs/classify", get(classify_verb))
        .route("/verbs/stats", get(verb_stats))
}
