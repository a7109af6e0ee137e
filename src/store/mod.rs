// src/store/mod.rs

//! Persistence gateway.
//!
//! Everything the services need from durable storage goes through
//! [`ExamStore`]. There are no transactions spanning collections: each call
//! is one request/response against the backing store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam_attempt::{AttemptFilter, ExamAttempt},
        exam_set::{ExamSet, NewExamSet},
        question::{NewQuestion, Question},
        user::{NewUser, User},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ExamStore: Send + Sync {
    /// Fails with `Conflict` when the username or email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Exam sets newest first, each with its questions sorted by order.
    async fn fetch_exam_sets(&self, active_only: bool) -> Result<Vec<ExamSet>, AppError>;

    async fn fetch_exam_set_by_id(&self, id: Uuid) -> Result<Option<ExamSet>, AppError>;

    async fn create_exam_set(&self, exam_set: NewExamSet) -> Result<ExamSet, AppError>;

    /// Overwrites the set's own columns. Questions are untouched.
    /// Returns `false` when no such set exists.
    async fn update_exam_set(&self, exam_set: &ExamSet) -> Result<bool, AppError>;

    /// Deletes the set together with its questions and attempts.
    async fn delete_exam_set(&self, id: Uuid) -> Result<bool, AppError>;

    /// Fails with `Conflict` when the order is already used inside the set.
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, AppError>;

    async fn fetch_question_by_id(&self, id: Uuid) -> Result<Option<Question>, AppError>;

    async fn update_question(&self, question: &Question) -> Result<bool, AppError>;

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError>;

    /// Persists a completed attempt under its own id.
    async fn insert_attempt(&self, attempt: &ExamAttempt) -> Result<Uuid, AppError>;

    async fn fetch_attempt_by_id(&self, id: Uuid) -> Result<Option<ExamAttempt>, AppError>;

    /// Attempts matching the filter, newest completion first.
    async fn fetch_attempts(&self, filter: &AttemptFilter) -> Result<Vec<ExamAttempt>, AppError>;
}
