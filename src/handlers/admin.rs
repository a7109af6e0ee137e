// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam_set::{CreateExamSetRequest, UpdateExamSetRequest},
        question::{CreateQuestionRequest, UpdateQuestionRequest},
    },
    services::catalog::CatalogService,
    utils::jwt::Claims,
};

/// Lists all exam sets, inactive ones included.
/// Admin only.
pub async fn list_exam_sets(
    State(catalog): State<CatalogService>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.list_all().await?))
}

/// Creates a new exam set owned by the calling admin.
/// Admin only.
pub async fn create_exam_set(
    State(catalog): State<CatalogService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam_set = catalog
        .create_exam_set(claims.user_id()?, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(exam_set)))
}

/// Updates an exam set by ID and returns the stored result.
/// Admin only.
pub async fn update_exam_set(
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExamSetRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.update_exam_set(id, payload).await?))
}

/// Deletes an exam set with its questions and attempts.
/// Admin only.
pub async fn delete_exam_set(
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_exam_set(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Adds a question to an exam set and returns the updated set.
/// Admin only.
pub async fn create_question(
    State(catalog): State<CatalogService>,
    Path(exam_set_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exam_set = catalog.add_question(exam_set_id, payload).await?;
    Ok((StatusCode::CREATED, Json(exam_set)))
}

/// Updates a question by ID and returns the updated set.
/// Admin only.
pub async fn update_question(
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.update_question(id, payload).await?))
}

/// Deletes a question by ID and returns the updated set.
/// Admin only.
pub async fn delete_question(
    State(catalog): State<CatalogService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.delete_question(id).await?))
}
