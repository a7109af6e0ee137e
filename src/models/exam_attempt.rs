// src/models/exam_attempt.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::PublicQuestion;

/// One recorded answer. `selected_answer` is an option index or `NO_ANSWER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: Uuid,
    pub selected_answer: i32,
}

/// Represents the 'exam_attempts' table in the database.
/// Mutable only while its session is in progress; immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub exam_set_id: Uuid,
    pub answers: Vec<AnswerRecord>,
    pub score: i32,
    pub total_questions: i32,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub is_completed: bool,
}

impl ExamAttempt {
    /// Score as a percentage of `total_questions`.
    /// `None` when the attempt has no questions to divide by.
    pub fn percentage(&self) -> Option<f64> {
        if self.total_questions <= 0 {
            return None;
        }
        Some(100.0 * self.score as f64 / self.total_questions as f64)
    }
}

/// Query filter for listing attempts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttemptFilter {
    pub student_id: Option<Uuid>,
    pub exam_set_id: Option<Uuid>,
}

impl AttemptFilter {
    pub fn for_student(student_id: Uuid) -> Self {
        Self {
            student_id: Some(student_id),
            exam_set_id: None,
        }
    }

    pub fn for_exam_set(exam_set_id: Uuid) -> Self {
        Self {
            student_id: None,
            exam_set_id: Some(exam_set_id),
        }
    }

    pub fn matches(&self, attempt: &ExamAttempt) -> bool {
        self.student_id.is_none_or(|id| id == attempt.student_id)
            && self.exam_set_id.is_none_or(|id| id == attempt.exam_set_id)
    }
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub exam_set_id: Uuid,
}

/// DTO for recording an answer.
#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub question_id: Uuid,
    pub selected_answer: i32,
}

/// DTO for moving the question cursor.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NavigateRequest {
    Next,
    Previous,
    Goto { index: i64 },
}

/// Snapshot of a live attempt session, as shown to its student.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptView {
    pub attempt_id: Uuid,
    pub exam_set_id: Uuid,
    pub exam_title: String,
    pub state: String,
    pub question_count: usize,
    pub current_index: usize,
    pub current_question: PublicQuestion,
    pub answers: Vec<AnswerRecord>,
    pub remaining_seconds: Option<u32>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

/// Result of a submit call.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub attempt: ExamAttempt,
    pub percentage: f64,
    pub passed: bool,
    /// True when the attempt had already been submitted before this call.
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(score: i32, total: i32) -> ExamAttempt {
        ExamAttempt {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            exam_set_id: Uuid::new_v4(),
            answers: Vec::new(),
            score,
            total_questions: total,
            start_time: chrono::Utc::now(),
            end_time: None,
            is_completed: true,
        }
    }

    #[test]
    fn test_percentage() {
        assert_eq!(attempt(1, 2).percentage(), Some(50.0));
        assert_eq!(attempt(0, 0).percentage(), None);
    }

    #[test]
    fn test_filter_matches() {
        let a = attempt(1, 2);
        assert!(AttemptFilter::default().matches(&a));
        assert!(AttemptFilter::for_student(a.student_id).matches(&a));
        assert!(!AttemptFilter::for_student(Uuid::new_v4()).matches(&a));
        assert!(AttemptFilter::for_exam_set(a.exam_set_id).matches(&a));
    }

    #[test]
    fn test_navigate_request_shape() {
        let goto: NavigateRequest =
            serde_json::from_str(r#"{"action": "goto", "index": 4}"#).unwrap();
        assert!(matches!(goto, NavigateRequest::Goto { index: 4 }));
        let next: NavigateRequest = serde_json::from_str(r#"{"action": "next"}"#).unwrap();
        assert!(matches!(next, NavigateRequest::Next));
    }
}
