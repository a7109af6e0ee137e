// src/models/exam_set.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::MAX_TIME_LIMIT_MINUTES;
use crate::models::question::{PublicQuestion, Question, double_option};

/// Represents the 'exam_sets' table, with its questions denormalized onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSet {
    pub id: Uuid,
    pub title: String,
    pub description: String,

    /// Admin who authored the set.
    pub created_by: Uuid,

    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Only active sets can be attempted by students.
    pub is_active: bool,

    /// Time limit in minutes. `None` means untimed.
    pub time_limit: Option<i32>,

    /// Sorted by `Question::order`.
    pub questions: Vec<Question>,
}

impl ExamSet {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Time limit converted to countdown seconds.
    pub fn time_limit_seconds(&self) -> Option<u32> {
        self.time_limit
            .filter(|minutes| *minutes > 0)
            .map(|minutes| minutes as u32 * 60)
    }

    pub fn sort_questions(&mut self) {
        self.questions.sort_by_key(|q| q.order);
    }

    /// Next free position when a question is appended.
    pub fn next_order(&self) -> i32 {
        self.questions.iter().map(|q| q.order).max().unwrap_or(0) + 1
    }
}

/// DTO for listing exam sets to students (correct answers stripped).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicExamSet {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub time_limit: Option<i32>,
    pub question_count: usize,
    pub questions: Vec<PublicQuestion>,
}

impl From<&ExamSet> for PublicExamSet {
    fn from(set: &ExamSet) -> Self {
        PublicExamSet {
            id: set.id,
            title: set.title.clone(),
            description: set.description.clone(),
            created_at: set.created_at,
            time_limit: set.time_limit,
            question_count: set.question_count(),
            questions: set.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// Insert payload for the store.
#[derive(Debug, Clone)]
pub struct NewExamSet {
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub is_active: bool,
    pub time_limit: Option<i32>,
}

/// DTO for creating a new exam set.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamSetRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[validate(range(min = 1, max = MAX_TIME_LIMIT_MINUTES))]
    pub time_limit: Option<i32>,
}

/// DTO for updating an exam set. Fields are optional.
/// `time_limit: null` removes the limit, an absent field keeps it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateExamSetRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_limit: Option<Option<i32>>,
}

impl UpdateExamSetRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.time_limit.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(order: i32) -> Question {
        Question {
            id: Uuid::new_v4(),
            exam_set_id: Uuid::nil(),
            question_text: format!("Question {}", order),
            image_url: None,
            options: vec!["A".to_string(), "B".to_string()],
            correct_answer: 1,
            order,
        }
    }

    fn exam_set(orders: &[i32]) -> ExamSet {
        ExamSet {
            id: Uuid::nil(),
            title: "Algebra".to_string(),
            description: String::new(),
            created_by: Uuid::nil(),
            created_at: chrono::Utc::now(),
            is_active: true,
            time_limit: Some(2),
            questions: orders.iter().map(|o| question(*o)).collect(),
        }
    }

    #[test]
    fn test_sort_and_next_order() {
        let mut set = exam_set(&[3, 1, 7]);
        set.sort_questions();
        let orders: Vec<i32> = set.questions.iter().map(|q| q.order).collect();
        assert_eq!(orders, vec![1, 3, 7]);
        assert_eq!(set.next_order(), 8);
        assert_eq!(exam_set(&[]).next_order(), 1);
    }

    #[test]
    fn test_time_limit_seconds() {
        assert_eq!(exam_set(&[1]).time_limit_seconds(), Some(120));
        let mut untimed = exam_set(&[1]);
        untimed.time_limit = None;
        assert_eq!(untimed.time_limit_seconds(), None);
    }

    #[test]
    fn test_public_view_hides_answers() {
        let set = exam_set(&[1, 2]);
        let public = serde_json::to_value(PublicExamSet::from(&set)).unwrap();
        assert_eq!(public["question_count"], 2);
        assert!(public["questions"][0].get("correct_answer").is_none());
    }

    #[test]
    fn test_create_time_limit_bounds() {
        let req = CreateExamSetRequest {
            title: "Quiz".to_string(),
            description: None,
            is_active: None,
            time_limit: Some(0),
        };
        assert!(req.validate().is_err());
    }
}
