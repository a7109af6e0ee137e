// src/handlers/catalog.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{exam_attempt::AttemptFilter, exam_set::PublicExamSet, user::Role},
    services::{catalog::CatalogService, stats::compute_stats},
    state::AppState,
    utils::jwt::Claims,
};

/// Lists the exam sets open for attempts, without correct answers.
pub async fn list_exam_sets(
    State(catalog): State<CatalogService>,
) -> Result<impl IntoResponse, AppError> {
    let sets = catalog.list_active().await?;
    let public: Vec<PublicExamSet> = sets.iter().map(PublicExamSet::from).collect();
    Ok(Json(public))
}

/// Fetches one exam set.
///
/// Admins get the full record, inactive sets and answers included.
/// Students only see active sets, with answers stripped.
pub async fn get_exam_set(
    State(catalog): State<CatalogService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let response = match claims.role {
        Role::Admin => Json(catalog.get_exam_set(id).await?).into_response(),
        Role::Student => {
            let set = catalog.get_active_exam_set(id).await?;
            Json(PublicExamSet::from(&set)).into_response()
        }
    };
    Ok(response)
}

/// Summary statistics for one exam set.
pub async fn exam_set_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // 404 for unknown sets rather than silent zeros.
    state.catalog.get_exam_set(id).await?;
    let attempts = state
        .store
        .fetch_attempts(&AttemptFilter::for_exam_set(id))
        .await?;

    Ok(Json(compute_stats(&attempts, id)))
}
