// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    error::AppError,
    models::{
        exam_attempt::{
            NavigateRequest, RecordAnswerRequest, StartAttemptRequest, SubmissionResponse,
        },
        user::Role,
    },
    services::sessions::SessionRegistry,
    utils::jwt::Claims,
};

/// Only students take exams.
fn student_id(claims: &Claims) -> Result<Uuid, AppError> {
    match claims.role {
        Role::Student => claims.user_id(),
        Role::Admin => Err(AppError::Forbidden(
            "Administrators cannot take exams".to_string(),
        )),
    }
}

/// Starts an attempt on an active exam set.
///
/// * 404 when the set does not exist.
/// * 409 when it is inactive.
/// * 422 when it has no questions; the client should go back to the catalog.
pub async fn start_attempt(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student = student_id(&claims)?;
    let view = sessions.start_attempt(student, req.exam_set_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current state of an open attempt.
pub async fn get_attempt(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions.view(attempt_id, student_id(&claims)?).await?;
    Ok(Json(view))
}

/// Records or replaces the answer to one question.
pub async fn record_answer(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .record_answer(
            attempt_id,
            student_id(&claims)?,
            req.question_id,
            req.selected_answer,
        )
        .await?;
    Ok(Json(view))
}

/// Moves the question cursor. Out-of-range targets are clamped.
pub async fn navigate(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = sessions
        .navigate(attempt_id, student_id(&claims)?, req)
        .await?;
    Ok(Json(view))
}

/// Scores and stores the attempt.
///
/// On a storage failure the answers and score are kept server side and
/// the same call can be repeated.
pub async fn submit_attempt(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let submission = sessions
        .submit(attempt_id, student_id(&claims)?)
        .await?;

    let percentage = submission.attempt.percentage().unwrap_or(0.0);
    Ok(Json(SubmissionResponse {
        percentage,
        passed: percentage >= PASSING_SCORE_PERCENTAGE,
        duplicate: submission.duplicate,
        attempt: submission.attempt,
    }))
}

/// Abandons an open attempt. Nothing is stored.
pub async fn abandon_attempt(
    State(sessions): State<SessionRegistry>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.abandon(attempt_id, student_id(&claims)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
