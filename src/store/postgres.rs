// src/store/postgres.rs

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam_attempt::{AnswerRecord, AttemptFilter, ExamAttempt},
        exam_set::{ExamSet, NewExamSet},
        question::{NewQuestion, Question},
        user::{NewUser, User},
    },
    store::ExamStore,
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    name: String,
    password: String,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            name: row.name,
            password: row.password,
            role: row.role.parse().map_err(AppError::InternalServerError)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExamSetRow {
    id: Uuid,
    title: String,
    description: String,
    created_by: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
    is_active: bool,
    time_limit: Option<i32>,
}

impl ExamSetRow {
    fn into_exam_set(self, questions: Vec<Question>) -> ExamSet {
        ExamSet {
            id: self.id,
            title: self.title,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
            is_active: self.is_active,
            time_limit: self.time_limit,
            questions,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    exam_set_id: Uuid,
    question_text: String,
    image_url: Option<String>,
    options: Json<Vec<String>>,
    correct_answer: i32,
    order_num: i32,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            exam_set_id: row.exam_set_id,
            question_text: row.question_text,
            image_url: row.image_url,
            options: row.options.0,
            correct_answer: row.correct_answer,
            order: row.order_num,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    student_id: Uuid,
    exam_set_id: Uuid,
    answers: Json<Vec<AnswerRecord>>,
    score: i32,
    total_questions: i32,
    start_time: chrono::DateTime<chrono::Utc>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    is_completed: bool,
}

impl From<AttemptRow> for ExamAttempt {
    fn from(row: AttemptRow) -> Self {
        ExamAttempt {
            id: row.id,
            student_id: row.student_id,
            exam_set_id: row.exam_set_id,
            answers: row.answers.0,
            score: row.score,
            total_questions: row.total_questions,
            start_time: row.start_time,
            end_time: row.end_time,
            is_completed: row.is_completed,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, name, password, role, created_at";
const EXAM_SET_COLUMNS: &str =
    "id, title, description, created_by, created_at, is_active, time_limit";
const QUESTION_COLUMNS: &str =
    "id, exam_set_id, question_text, image_url, options, correct_answer, order_num";
const ATTEMPT_COLUMNS: &str = "id, student_id, exam_set_id, answers, score, total_questions, \
     start_time, end_time, is_completed";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_foreign_key_violation())
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with a bounded number of retries, for databases that come
    /// up after the service does.
    pub async fn connect(database_url: &str, max_retries: u32) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(AppError::Persistence(format!(
                            "Failed to connect to database after {} retries: {}",
                            max_retries, e
                        )));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {})",
                        retry_count
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Loads questions for several sets in one round trip.
    async fn questions_for(&self, set_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Question>>, AppError> {
        let rows: Vec<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM questions WHERE exam_set_id = ANY($1) ORDER BY exam_set_id, order_num",
            QUESTION_COLUMNS
        ))
        .bind(set_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions: {:?}", e);
            AppError::from(e)
        })?;

        let mut grouped: HashMap<Uuid, Vec<Question>> = HashMap::new();
        for row in rows {
            grouped.entry(row.exam_set_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl ExamStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (id, username, email, name, password, role) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Username '{}' or email already exists",
                    user.username
                ))
            } else {
                tracing::error!("Failed to insert user: {:?}", e);
                AppError::from(e)
            }
        })?;

        row.try_into()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn fetch_exam_sets(&self, active_only: bool) -> Result<Vec<ExamSet>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM exam_sets", EXAM_SET_COLUMNS));
        if active_only {
            builder.push(" WHERE is_active = TRUE");
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<ExamSetRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch exam sets: {:?}", e);
                AppError::from(e)
            })?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut questions = self.questions_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let qs = questions.remove(&row.id).unwrap_or_default();
                row.into_exam_set(qs)
            })
            .collect())
    }

    async fn fetch_exam_set_by_id(&self, id: Uuid) -> Result<Option<ExamSet>, AppError> {
        let row: Option<ExamSetRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exam_sets WHERE id = $1",
            EXAM_SET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut questions = self.questions_for(&[id]).await?;
        Ok(Some(row.into_exam_set(questions.remove(&id).unwrap_or_default())))
    }

    async fn create_exam_set(&self, exam_set: NewExamSet) -> Result<ExamSet, AppError> {
        let row: ExamSetRow = sqlx::query_as(&format!(
            "INSERT INTO exam_sets (id, title, description, created_by, is_active, time_limit) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            EXAM_SET_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&exam_set.title)
        .bind(&exam_set.description)
        .bind(exam_set.created_by)
        .bind(exam_set.is_active)
        .bind(exam_set.time_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create exam set: {:?}", e);
            AppError::from(e)
        })?;

        Ok(row.into_exam_set(Vec::new()))
    }

    async fn update_exam_set(&self, exam_set: &ExamSet) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE exam_sets SET title = $1, description = $2, is_active = $3, \
             time_limit = $4, updated_at = NOW() WHERE id = $5",
        )
        .bind(&exam_set.title)
        .bind(&exam_set.description)
        .bind(exam_set.is_active)
        .bind(exam_set.time_limit)
        .bind(exam_set.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update exam set: {:?}", e);
            AppError::from(e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_exam_set(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM exam_sets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete exam set: {:?}", e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let row: QuestionRow = sqlx::query_as(&format!(
            "INSERT INTO questions \
             (id, exam_set_id, question_text, image_url, options, correct_answer, order_num) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(question.exam_set_id)
        .bind(&question.question_text)
        .bind(&question.image_url)
        .bind(Json(&question.options))
        .bind(question.correct_answer)
        .bind(question.order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Order {} is already used in this exam set",
                    question.order
                ))
            } else {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn fetch_question_by_id(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let row: Option<QuestionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Question::from))
    }

    async fn update_question(&self, question: &Question) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE questions SET question_text = $1, image_url = $2, options = $3, \
             correct_answer = $4, order_num = $5, updated_at = NOW() WHERE id = $6",
        )
        .bind(&question.question_text)
        .bind(&question.image_url)
        .bind(Json(&question.options))
        .bind(question.correct_answer)
        .bind(question.order)
        .bind(question.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Order {} is already used in this exam set",
                    question.order
                ))
            } else {
                tracing::error!("Failed to update question: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete question: {:?}", e);
                AppError::from(e)
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_attempt(&self, attempt: &ExamAttempt) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO exam_attempts \
             (id, student_id, exam_set_id, answers, score, total_questions, \
              start_time, end_time, is_completed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(attempt.id)
        .bind(attempt.student_id)
        .bind(attempt.exam_set_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.total_questions)
        .bind(attempt.start_time)
        .bind(attempt.end_time)
        .bind(attempt.is_completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Attempt {} was already recorded", attempt.id))
            } else if is_foreign_key_violation(&e) {
                AppError::NotFound(format!(
                    "Exam set {} of attempt {} no longer exists",
                    attempt.exam_set_id, attempt.id
                ))
            } else {
                tracing::error!("Failed to insert exam attempt: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(id)
    }

    async fn fetch_attempt_by_id(&self, id: Uuid) -> Result<Option<ExamAttempt>, AppError> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {} FROM exam_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ExamAttempt::from))
    }

    async fn fetch_attempts(&self, filter: &AttemptFilter) -> Result<Vec<ExamAttempt>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM exam_attempts WHERE TRUE", ATTEMPT_COLUMNS));

        if let Some(student_id) = filter.student_id {
            builder.push(" AND student_id = ");
            builder.push_bind(student_id);
        }
        if let Some(exam_set_id) = filter.exam_set_id {
            builder.push(" AND exam_set_id = ");
            builder.push_bind(exam_set_id);
        }
        builder.push(" ORDER BY end_time DESC NULLS LAST");

        let rows: Vec<AttemptRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch exam attempts: {:?}", e);
                AppError::from(e)
            })?;

        Ok(rows.into_iter().map(ExamAttempt::from).collect())
    }
}
