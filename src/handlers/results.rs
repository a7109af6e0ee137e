// src/handlers/results.rs

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::{
    error::AppError,
    models::{exam_attempt::AttemptFilter, user::Role},
    services::stats::{results_by_exam_set, summarize_student},
    store::ExamStore,
    utils::jwt::Claims,
};

/// The caller's own attempts, newest first, with an overall summary and
/// a per-exam-set breakdown.
pub async fn my_results(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempts = store
        .fetch_attempts(&AttemptFilter::for_student(user_id))
        .await?;
    let exam_sets = store.fetch_exam_sets(false).await?;
    let summary = summarize_student(&attempts, user_id);
    let by_exam_set = results_by_exam_set(&attempts, user_id, &exam_sets);

    Ok(Json(json!({
        "summary": summary,
        "by_exam_set": by_exam_set,
        "attempts": attempts,
    })))
}

/// Attempt history: every attempt for admins, own attempts for students.
pub async fn list_attempts(
    State(store): State<Arc<dyn ExamStore>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let filter = match claims.role {
        Role::Admin => AttemptFilter::default(),
        Role::Student => AttemptFilter::for_student(claims.user_id()?),
    };
    let attempts = store.fetch_attempts(&filter).await?;
    Ok(Json(attempts))
}
