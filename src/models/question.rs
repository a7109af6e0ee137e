// src/models/question.rs

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use crate::config::{MAX_OPTIONS, MIN_OPTIONS};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,

    pub exam_set_id: Uuid,

    pub question_text: String,

    pub image_url: Option<String>,

    /// Between 2 and 6 options, stored as a JSON array.
    pub options: Vec<String>,

    /// Index into `options`.
    pub correct_answer: i32,

    /// Display position inside the exam set, starting at 1.
    pub order: i32,
}

impl Question {
    /// Binary correctness. Out-of-range selections and the sentinel never match.
    pub fn is_correct(&self, selected_answer: i32) -> bool {
        selected_answer == self.correct_answer
    }
}

/// DTO for sending question to a student (excludes the correct answer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub image_url: Option<String>,
    pub options: Vec<String>,
    pub order: i32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text.clone(),
            image_url: q.image_url.clone(),
            options: q.options.clone(),
            order: q.order,
        }
    }
}

/// Insert payload for the store.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub exam_set_id: Uuid,
    pub question_text: String,
    pub image_url: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub order: i32,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub image_url: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: i32,
    /// Appended after the last question when omitted.
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

/// DTO for updating a question. Fields are optional.
/// `image_url: null` clears the image, an absent field keeps it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question_text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
    #[validate(range(min = 1))]
    pub order: Option<i32>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.question_text.is_none()
            && self.image_url.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.order.is_none()
    }
}

/// Distinguishes an explicit `null` from an absent field.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// An image URL must parse and fit in 500 characters.
pub fn image_url_is_valid(url: &str) -> bool {
    url.len() <= 500 && Url::parse(url).is_ok()
}

/// Checks that `correct_answer` indexes into `options`.
pub fn answer_index_in_range(correct_answer: i32, option_count: usize) -> bool {
    correct_answer >= 0 && (correct_answer as usize) < option_count
}
