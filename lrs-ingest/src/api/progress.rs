//! Progress query and re-materialization endpoints

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::progress;
use crate::models::Progress;
use crate::services::run_materialization;
use crate::{ApiError, ApiResult, AppState};

/// GET /progress query parameters
#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub actor: String,
    pub course_id: Option<String>,
}

/// POST /progress/materialize request body
#[derive(Debug, Deserialize)]
pub struct MaterializeRequest {
    pub actor: String,
    pub course_id: String,
}

/// GET /progress?actor=...[&course_id=...]
///
/// With `course_id`: the single record, or 404 if none has been materialized.
/// Without: every record of the actor.
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Response> {
    match query.course_id {
        Some(course_id) => {
            let record = progress::get(&state.db, &query.actor, &course_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("progress for {} in {}", query.actor, course_id))
                })?;
            Ok(Json(record).into_response())
        }
        None => {
            let records = progress::list_for_actor(&state.db, &query.actor).await?;
            Ok(Json(records).into_response())
        }
    }
}

/// POST /progress/materialize
///
/// Recompute synchronously. Returns the new record, or `null` when the pair
/// has no progress-relevant statements (nothing is written then).
pub async fn post_materialize(
    State(state): State<AppState>,
    Json(request): Json<MaterializeRequest>,
) -> ApiResult<Json<Option<Progress>>> {
    let record = run_materialization(&state, &request.actor, &request.course_id).await?;
    Ok(Json(record))
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(get_progress))
        .route("/progress/materialize", post(post_materialize))
}
