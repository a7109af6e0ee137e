// src/services/catalog.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam_set::{CreateExamSetRequest, ExamSet, NewExamSet, UpdateExamSetRequest},
        question::{
            CreateQuestionRequest, NewQuestion, Question, UpdateQuestionRequest,
            answer_index_in_range, image_url_is_valid,
        },
    },
    store::ExamStore,
    utils::html::clean_html,
};

/// Exam set and question management.
///
/// Every mutation answers with the canonical exam set as stored after the
/// change, so callers merge one record instead of reloading the catalog.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ExamStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    /// Sets open for attempts, with ordered questions.
    pub async fn list_active(&self) -> Result<Vec<ExamSet>, AppError> {
        self.store.fetch_exam_sets(true).await
    }

    /// Every set, including inactive ones.
    pub async fn list_all(&self) -> Result<Vec<ExamSet>, AppError> {
        self.store.fetch_exam_sets(false).await
    }

    pub async fn get_exam_set(&self, id: Uuid) -> Result<ExamSet, AppError> {
        self.store
            .fetch_exam_set_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam set {} not found", id)))
    }

    /// Like `get_exam_set`, but closed sets are rejected.
    pub async fn get_active_exam_set(&self, id: Uuid) -> Result<ExamSet, AppError> {
        let exam_set = self.get_exam_set(id).await?;
        if !exam_set.is_active {
            return Err(AppError::InactiveExam(format!(
                "Exam set '{}' is not open for attempts",
                exam_set.title
            )));
        }
        Ok(exam_set)
    }

    pub async fn create_exam_set(
        &self,
        admin_id: Uuid,
        req: CreateExamSetRequest,
    ) -> Result<ExamSet, AppError> {
        req.validate()?;

        let exam_set = self
            .store
            .create_exam_set(NewExamSet {
                title: clean_html(&req.title),
                description: req.description.as_deref().map(clean_html).unwrap_or_default(),
                created_by: admin_id,
                is_active: req.is_active.unwrap_or(true),
                time_limit: req.time_limit,
            })
            .await?;

        tracing::info!("Exam set {} created by {}", exam_set.id, admin_id);
        Ok(exam_set)
    }

    pub async fn update_exam_set(
        &self,
        id: Uuid,
        req: UpdateExamSetRequest,
    ) -> Result<ExamSet, AppError> {
        req.validate()?;
        if let Some(Some(minutes)) = req.time_limit {
            validate_time_limit(minutes)?;
        }

        let mut exam_set = self.get_exam_set(id).await?;
        if req.is_empty() {
            return Ok(exam_set);
        }

        if let Some(title) = req.title {
            exam_set.title = clean_html(&title);
        }
        if let Some(description) = req.description {
            exam_set.description = clean_html(&description);
        }
        if let Some(is_active) = req.is_active {
            exam_set.is_active = is_active;
        }
        if let Some(time_limit) = req.time_limit {
            exam_set.time_limit = time_limit;
        }

        if !self.store.update_exam_set(&exam_set).await? {
            return Err(AppError::NotFound(format!("Exam set {} not found", id)));
        }
        Ok(exam_set)
    }

    pub async fn delete_exam_set(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_exam_set(id).await? {
            return Err(AppError::NotFound(format!("Exam set {} not found", id)));
        }
        tracing::info!("Exam set {} deleted", id);
        Ok(())
    }

    /// Adds a question and returns the updated set.
    pub async fn add_question(
        &self,
        exam_set_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<ExamSet, AppError> {
        req.validate()?;
        validate_answer_index(req.correct_answer, req.options.len())?;

        let mut exam_set = self.get_exam_set(exam_set_id).await?;
        let order = req.order.unwrap_or_else(|| exam_set.next_order());
        if exam_set.questions.iter().any(|q| q.order == order) {
            return Err(AppError::Conflict(format!(
                "Order {} is already used in this exam set",
                order
            )));
        }

        let question = self
            .store
            .insert_question(NewQuestion {
                exam_set_id,
                question_text: clean_html(&req.question_text),
                image_url: req.image_url,
                options: req.options,
                correct_answer: req.correct_answer,
                order,
            })
            .await?;

        exam_set.questions.push(question);
        exam_set.sort_questions();
        Ok(exam_set)
    }

    /// Applies a partial update and returns the updated owning set.
    pub async fn update_question(
        &self,
        id: Uuid,
        req: UpdateQuestionRequest,
    ) -> Result<ExamSet, AppError> {
        req.validate()?;

        let mut question = self.get_question(id).await?;
        if !req.is_empty() {
            apply_question_update(&mut question, req)?;
            if !self.store.update_question(&question).await? {
                return Err(AppError::NotFound(format!("Question {} not found", id)));
            }
        }

        let mut exam_set = self.get_exam_set(question.exam_set_id).await?;
        merge_question(&mut exam_set, question);
        Ok(exam_set)
    }

    /// Removes a question and returns the updated owning set.
    pub async fn delete_question(&self, id: Uuid) -> Result<ExamSet, AppError> {
        let question = self.get_question(id).await?;
        if !self.store.delete_question(id).await? {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }

        let mut exam_set = self.get_exam_set(question.exam_set_id).await?;
        exam_set.questions.retain(|q| q.id != id);
        Ok(exam_set)
    }

    async fn get_question(&self, id: Uuid) -> Result<Question, AppError> {
        self.store
            .fetch_question_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
    }
}

fn validate_time_limit(minutes: i32) -> Result<(), AppError> {
    if !(1..=crate::config::MAX_TIME_LIMIT_MINUTES).contains(&minutes) {
        return Err(AppError::BadRequest(format!(
            "Time limit must be between 1 and {} minutes",
            crate::config::MAX_TIME_LIMIT_MINUTES
        )));
    }
    Ok(())
}

fn validate_answer_index(correct_answer: i32, option_count: usize) -> Result<(), AppError> {
    if !answer_index_in_range(correct_answer, option_count) {
        return Err(AppError::BadRequest(format!(
            "correct_answer {} must index one of the {} options",
            correct_answer, option_count
        )));
    }
    Ok(())
}

fn validate_image_url(url: &str) -> Result<(), AppError> {
    if !image_url_is_valid(url) {
        return Err(AppError::BadRequest(format!(
            "image_url '{}' is not a valid URL",
            url
        )));
    }
    Ok(())
}

/// Merges a partial update into `question`, re-checking the answer index
/// against the resulting option list.
fn apply_question_update(
    question: &mut Question,
    req: UpdateQuestionRequest,
) -> Result<(), AppError> {
    if let Some(text) = req.question_text {
        question.question_text = clean_html(&text);
    }
    if let Some(image_url) = req.image_url {
        if let Some(url) = &image_url {
            validate_image_url(url)?;
        }
        question.image_url = image_url;
    }
    if let Some(options) = req.options {
        question.options = options;
    }
    if let Some(correct_answer) = req.correct_answer {
        question.correct_answer = correct_answer;
    }
    if let Some(order) = req.order {
        question.order = order;
    }
    validate_answer_index(question.correct_answer, question.options.len())
}

/// Replaces the stored copy of `question` inside its set, keeping order.
fn merge_question(exam_set: &mut ExamSet, question: Question) {
    match exam_set.questions.iter_mut().find(|q| q.id == question.id) {
        Some(slot) => *slot = question,
        None => exam_set.questions.push(question),
    }
    exam_set.sort_questions();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryStore::new()))
    }

    fn set_request(title: &str) -> CreateExamSetRequest {
        CreateExamSetRequest {
            title: title.to_string(),
            description: Some("<b>Basics</b><script>alert(1)</script>".to_string()),
            is_active: None,
            time_limit: Some(30),
        }
    }

    fn question_request(order: Option<i32>, correct_answer: i32) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: "2 + 2 = ?".to_string(),
            image_url: None,
            options: vec!["3".to_string(), "4".to_string(), "5".to_string()],
            correct_answer,
            order,
        }
    }

    #[tokio::test]
    async fn test_create_sanitizes_and_defaults_active() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Arithmetic"))
            .await
            .unwrap();

        assert!(set.is_active);
        assert!(!set.description.contains("script"));
        assert!(set.description.contains("<b>Basics</b>"));
    }

    #[tokio::test]
    async fn test_questions_append_in_order() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Arithmetic"))
            .await
            .unwrap();

        catalog.add_question(set.id, question_request(None, 1)).await.unwrap();
        catalog.add_question(set.id, question_request(Some(5), 1)).await.unwrap();
        let updated = catalog.add_question(set.id, question_request(None, 1)).await.unwrap();

        let orders: Vec<i32> = updated.questions.iter().map(|q| q.order).collect();
        assert_eq!(orders, vec![1, 5, 6]);

        let dup = catalog.add_question(set.id, question_request(Some(5), 1)).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_answer() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Arithmetic"))
            .await
            .unwrap();

        let err = catalog
            .add_question(set.id, question_request(None, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_question_rechecks_answer_against_new_options() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Arithmetic"))
            .await
            .unwrap();
        let set = catalog.add_question(set.id, question_request(None, 2)).await.unwrap();
        let question_id = set.questions[0].id;

        let shrink = UpdateQuestionRequest {
            options: Some(vec!["yes".to_string(), "no".to_string()]),
            ..Default::default()
        };
        let err = catalog.update_question(question_id, shrink).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let fix = UpdateQuestionRequest {
            options: Some(vec!["yes".to_string(), "no".to_string()]),
            correct_answer: Some(0),
            ..Default::default()
        };
        let updated = catalog.update_question(question_id, fix).await.unwrap();
        assert_eq!(updated.questions[0].options, vec!["yes", "no"]);
        assert_eq!(updated.questions[0].correct_answer, 0);
    }

    #[tokio::test]
    async fn test_update_question_checks_image_url() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Pictures"))
            .await
            .unwrap();
        let set = catalog.add_question(set.id, question_request(None, 1)).await.unwrap();
        let question_id = set.questions[0].id;

        let bad: UpdateQuestionRequest =
            serde_json::from_str(r#"{"image_url": "not a url"}"#).unwrap();
        let err = catalog.update_question(question_id, bad).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let stored = catalog.get_exam_set(set.id).await.unwrap();
        assert_eq!(stored.questions[0].image_url, None);

        let good: UpdateQuestionRequest =
            serde_json::from_str(r#"{"image_url": "https://cdn.example.com/map.png"}"#).unwrap();
        let updated = catalog.update_question(question_id, good).await.unwrap();
        assert_eq!(
            updated.questions[0].image_url.as_deref(),
            Some("https://cdn.example.com/map.png")
        );

        let cleared: UpdateQuestionRequest =
            serde_json::from_str(r#"{"image_url": null}"#).unwrap();
        let updated = catalog.update_question(question_id, cleared).await.unwrap();
        assert_eq!(updated.questions[0].image_url, None);
    }

    #[tokio::test]
    async fn test_inactive_and_missing_sets() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Closed"))
            .await
            .unwrap();
        let closed = UpdateExamSetRequest {
            is_active: Some(false),
            ..Default::default()
        };
        catalog.update_exam_set(set.id, closed).await.unwrap();

        assert!(matches!(
            catalog.get_active_exam_set(set.id).await,
            Err(AppError::InactiveExam(_))
        ));
        assert!(matches!(
            catalog.get_active_exam_set(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(catalog.list_active().await.unwrap().is_empty());
        assert_eq!(catalog.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_time_limit_and_delete_question() {
        let catalog = service();
        let set = catalog
            .create_exam_set(Uuid::new_v4(), set_request("Timed"))
            .await
            .unwrap();
        let cleared = catalog
            .update_exam_set(
                set.id,
                UpdateExamSetRequest {
                    time_limit: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.time_limit, None);

        let with_q = catalog.add_question(set.id, question_request(None, 1)).await.unwrap();
        let after = catalog.delete_question(with_q.questions[0].id).await.unwrap();
        assert!(after.questions.is_empty());
    }
}
