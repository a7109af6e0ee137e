// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam_attempt::{AttemptFilter, ExamAttempt},
        exam_set::{ExamSet, NewExamSet},
        question::{NewQuestion, Question},
        user::{NewUser, User},
    },
    store::ExamStore,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Stored without questions; they are joined in on read.
    exam_sets: HashMap<Uuid, ExamSet>,
    questions: HashMap<Uuid, Question>,
    attempts: HashMap<Uuid, ExamAttempt>,
}

impl Tables {
    fn assemble(&self, set: &ExamSet) -> ExamSet {
        let mut full = set.clone();
        full.questions = self
            .questions
            .values()
            .filter(|q| q.exam_set_id == set.id)
            .cloned()
            .collect();
        full.sort_questions();
        full
    }

    fn order_taken(&self, exam_set_id: Uuid, order: i32, except: Option<Uuid>) -> bool {
        self.questions.values().any(|q| {
            q.exam_set_id == exam_set_id && q.order == order && Some(q.id) != except
        })
    }
}

/// Process-local store.
/// Used when no database is configured, and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::Conflict(format!(
                "Username '{}' or email already exists",
                user.username
            )));
        }

        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            name: user.name,
            password: user.password,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn fetch_exam_sets(&self, active_only: bool) -> Result<Vec<ExamSet>, AppError> {
        let tables = self.tables.read().await;
        let mut sets: Vec<ExamSet> = tables
            .exam_sets
            .values()
            .filter(|s| !active_only || s.is_active)
            .map(|s| tables.assemble(s))
            .collect();
        sets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sets)
    }

    async fn fetch_exam_set_by_id(&self, id: Uuid) -> Result<Option<ExamSet>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.exam_sets.get(&id).map(|s| tables.assemble(s)))
    }

    async fn create_exam_set(&self, exam_set: NewExamSet) -> Result<ExamSet, AppError> {
        let record = ExamSet {
            id: Uuid::new_v4(),
            title: exam_set.title,
            description: exam_set.description,
            created_by: exam_set.created_by,
            created_at: Utc::now(),
            is_active: exam_set.is_active,
            time_limit: exam_set.time_limit,
            questions: Vec::new(),
        };
        self.tables
            .write()
            .await
            .exam_sets
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_exam_set(&self, exam_set: &ExamSet) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.exam_sets.get_mut(&exam_set.id) {
            Some(stored) => {
                stored.title = exam_set.title.clone();
                stored.description = exam_set.description.clone();
                stored.is_active = exam_set.is_active;
                stored.time_limit = exam_set.time_limit;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_exam_set(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.exam_sets.remove(&id).is_none() {
            return Ok(false);
        }
        tables.questions.retain(|_, q| q.exam_set_id != id);
        tables.attempts.retain(|_, a| a.exam_set_id != id);
        Ok(true)
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.exam_sets.contains_key(&question.exam_set_id) {
            return Err(AppError::NotFound("Exam set not found".to_string()));
        }
        if tables.order_taken(question.exam_set_id, question.order, None) {
            return Err(AppError::Conflict(format!(
                "Order {} is already used in this exam set",
                question.order
            )));
        }

        let record = Question {
            id: Uuid::new_v4(),
            exam_set_id: question.exam_set_id,
            question_text: question.question_text,
            image_url: question.image_url,
            options: question.options,
            correct_answer: question.correct_answer,
            order: question.order,
        };
        tables.questions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn fetch_question_by_id(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn update_question(&self, question: &Question) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.questions.contains_key(&question.id) {
            return Ok(false);
        }
        if tables.order_taken(question.exam_set_id, question.order, Some(question.id)) {
            return Err(AppError::Conflict(format!(
                "Order {} is already used in this exam set",
                question.order
            )));
        }
        tables.questions.insert(question.id, question.clone());
        Ok(true)
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.write().await.questions.remove(&id).is_some())
    }

    async fn insert_attempt(&self, attempt: &ExamAttempt) -> Result<Uuid, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.exam_sets.contains_key(&attempt.exam_set_id) {
            return Err(AppError::NotFound(format!(
                "Exam set {} of attempt {} no longer exists",
                attempt.exam_set_id, attempt.id
            )));
        }
        if tables.attempts.contains_key(&attempt.id) {
            return Err(AppError::Conflict(format!(
                "Attempt {} was already recorded",
                attempt.id
            )));
        }
        tables.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt.id)
    }

    async fn fetch_attempt_by_id(&self, id: Uuid) -> Result<Option<ExamAttempt>, AppError> {
        Ok(self.tables.read().await.attempts.get(&id).cloned())
    }

    async fn fetch_attempts(&self, filter: &AttemptFilter) -> Result<Vec<ExamAttempt>, AppError> {
        let tables = self.tables.read().await;
        let mut attempts: Vec<ExamAttempt> = tables
            .attempts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            name: name.to_string(),
            password: "hash".to_string(),
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(new_user("alice")).await.unwrap();
        let err = store.insert_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_questions_are_joined_in_order() {
        let store = MemoryStore::new();
        let set = store
            .create_exam_set(NewExamSet {
                title: "Set".to_string(),
                description: String::new(),
                created_by: Uuid::new_v4(),
                is_active: true,
                time_limit: None,
            })
            .await
            .unwrap();

        for order in [2, 1] {
            store
                .insert_question(NewQuestion {
                    exam_set_id: set.id,
                    question_text: format!("Q{}", order),
                    image_url: None,
                    options: vec!["A".to_string(), "B".to_string()],
                    correct_answer: 0,
                    order,
                })
                .await
                .unwrap();
        }

        let fetched = store.fetch_exam_set_by_id(set.id).await.unwrap().unwrap();
        let texts: Vec<&str> = fetched
            .questions
            .iter()
            .map(|q| q.question_text.as_str())
            .collect();
        assert_eq!(texts, vec!["Q1", "Q2"]);

        let dup = store
            .insert_question(NewQuestion {
                exam_set_id: set.id,
                question_text: "dup".to_string(),
                image_url: None,
                options: vec!["A".to_string(), "B".to_string()],
                correct_answer: 0,
                order: 1,
            })
            .await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        assert!(store.delete_exam_set(set.id).await.unwrap());
        assert!(store.fetch_exam_set_by_id(set.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attempt_for_missing_exam_set_is_rejected() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let orphan = ExamAttempt {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            exam_set_id: Uuid::new_v4(),
            answers: Vec::new(),
            score: 0,
            total_questions: 1,
            start_time: now,
            end_time: Some(now),
            is_completed: true,
        };

        let err = store.insert_attempt(&orphan).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.fetch_attempt_by_id(orphan.id).await.unwrap().is_none());
    }
}
