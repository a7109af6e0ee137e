// src/services/attempt.rs

//! Exam attempt lifecycle.
//!
//! An [`AttemptSession`] drives one student through one exam set:
//!
//! ```text
//! start ──> InProgress ──submit──> Submitting ──ok──> Completed
//!               │                    │    ▲
//!               │                err │    │ submit (same record)
//!               │                    ▼    │
//!               │                 SubmitFailed
//!               └──abandon──> Abandoned
//! ```
//!
//! There is no `NotStarted` value: a session only exists once `start`
//! has accepted the exam set.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::NO_ANSWER,
    error::AppError,
    models::{
        exam_attempt::{AnswerRecord, AttemptView, ExamAttempt, NavigateRequest},
        exam_set::ExamSet,
        question::{PublicQuestion, Question},
    },
    store::ExamStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    InProgress,
    /// A write to the store is in flight.
    Submitting,
    /// The write failed. The scored record is kept for a retry.
    SubmitFailed,
    Completed,
    Abandoned,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::InProgress => "in_progress",
            AttemptState::Submitting => "submitting",
            AttemptState::SubmitFailed => "submit_failed",
            AttemptState::Completed => "completed",
            AttemptState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one countdown step.
#[derive(Debug)]
pub enum Tick {
    /// Untimed attempt, or the attempt is no longer in progress.
    Idle,
    Running { remaining_seconds: u32 },
    /// Time ran out and the attempt was submitted.
    Expired(Submission),
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt: ExamAttempt,
    /// The attempt had already been persisted before this call.
    pub duplicate: bool,
}

/// Counts questions whose recorded answer equals the correct option.
/// Questions without a record are compared against `NO_ANSWER`.
pub fn score_answers(questions: &[Question], answers: &[AnswerRecord]) -> i32 {
    let recorded: HashMap<Uuid, i32> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_answer))
        .collect();

    questions
        .iter()
        .filter(|q| q.is_correct(recorded.get(&q.id).copied().unwrap_or(NO_ANSWER)))
        .count() as i32
}

/// One student's run through one exam set.
#[derive(Debug)]
pub struct AttemptSession {
    /// Question list as it was when the attempt started.
    exam: ExamSet,
    attempt: ExamAttempt,
    student_id: Option<Uuid>,
    state: AttemptState,
    cursor: usize,
    remaining_seconds: Option<u32>,
    /// Scored record waiting to be written.
    pending: Option<ExamAttempt>,
    /// Record confirmed by the store.
    completed: Option<ExamAttempt>,
}

impl AttemptSession {
    /// Opens an attempt on `exam`.
    ///
    /// The exam must be active and hold at least one question. A missing
    /// `student_id` is only detected at submit time.
    pub fn start(mut exam: ExamSet, student_id: Option<Uuid>) -> Result<Self, AppError> {
        if !exam.is_active {
            return Err(AppError::InactiveExam(format!(
                "Exam set '{}' is not open for attempts",
                exam.title
            )));
        }
        if exam.questions.is_empty() {
            return Err(AppError::EmptyExam(format!(
                "Exam set '{}' has no questions yet",
                exam.title
            )));
        }
        exam.sort_questions();

        let attempt = ExamAttempt {
            id: Uuid::new_v4(),
            student_id: student_id.unwrap_or_default(),
            exam_set_id: exam.id,
            answers: Vec::new(),
            score: 0,
            total_questions: exam.question_count() as i32,
            start_time: Utc::now(),
            end_time: None,
            is_completed: false,
        };

        Ok(Self {
            remaining_seconds: exam.time_limit_seconds(),
            exam,
            attempt,
            student_id,
            state: AttemptState::InProgress,
            cursor: 0,
            pending: None,
            completed: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.attempt.id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn exam(&self) -> &ExamSet {
        &self.exam
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.attempt.answers
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    pub fn is_timed(&self) -> bool {
        self.remaining_seconds.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining_seconds == Some(0)
    }

    pub fn current_question(&self) -> &Question {
        &self.exam.questions[self.cursor]
    }

    fn ensure_in_progress(&self, operation: &str) -> Result<(), AppError> {
        if self.state != AttemptState::InProgress || self.is_expired() {
            return Err(AppError::InvalidState(format!(
                "Cannot {} while the attempt is {}",
                operation,
                if self.is_expired() { "expired" } else { self.state.as_str() }
            )));
        }
        Ok(())
    }

    /// Upserts the answer for `question_id`.
    ///
    /// The option index is stored as given; an out-of-range value simply
    /// never matches the correct answer.
    pub fn record_answer(&mut self, question_id: Uuid, selected_answer: i32) -> Result<(), AppError> {
        self.ensure_in_progress("record an answer")?;

        match self
            .attempt
            .answers
            .iter_mut()
            .find(|a| a.question_id == question_id)
        {
            Some(existing) => existing.selected_answer = selected_answer,
            None => self.attempt.answers.push(AnswerRecord {
                question_id,
                selected_answer,
            }),
        }
        Ok(())
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.cursor as i64 + 1)
    }

    pub fn previous(&mut self) -> usize {
        self.go_to(self.cursor as i64 - 1)
    }

    /// Moves the cursor, clamping to the first or last question.
    pub fn go_to(&mut self, index: i64) -> usize {
        let last = self.exam.question_count().saturating_sub(1) as i64;
        self.cursor = index.clamp(0, last) as usize;
        self.cursor
    }

    pub fn navigate(&mut self, request: NavigateRequest) -> usize {
        match request {
            NavigateRequest::Next => self.next(),
            NavigateRequest::Previous => self.previous(),
            NavigateRequest::Goto { index } => self.go_to(index),
        }
    }

    /// Advances the countdown by one second. Reaching zero submits.
    pub async fn tick(&mut self, store: &dyn ExamStore) -> Result<Tick, AppError> {
        if self.state != AttemptState::InProgress {
            return Ok(Tick::Idle);
        }
        let Some(remaining) = self.remaining_seconds else {
            return Ok(Tick::Idle);
        };

        let remaining = remaining.saturating_sub(1);
        self.remaining_seconds = Some(remaining);
        if remaining > 0 {
            return Ok(Tick::Running {
                remaining_seconds: remaining,
            });
        }

        tracing::info!("Attempt {} ran out of time, submitting", self.attempt.id);
        let submission = self.submit(store).await?;
        Ok(Tick::Expired(submission))
    }

    /// Scores the attempt and writes it to the store.
    ///
    /// Scoring happens once; a retry after a failed write re-sends the same
    /// record. Calling this on a completed attempt returns the stored record
    /// with `duplicate` set and writes nothing.
    pub async fn submit(&mut self, store: &dyn ExamStore) -> Result<Submission, AppError> {
        match self.state {
            AttemptState::Completed => {
                let attempt = self.completed.clone().ok_or_else(|| {
                    AppError::InternalServerError("completed attempt lost its record".to_string())
                })?;
                tracing::warn!("Duplicate submit for attempt {} ignored", attempt.id);
                return Ok(Submission {
                    attempt,
                    duplicate: true,
                });
            }
            AttemptState::Abandoned => {
                return Err(AppError::InvalidState(
                    "Cannot submit an abandoned attempt".to_string(),
                ));
            }
            AttemptState::InProgress => {
                let student_id = self.student_id.ok_or_else(|| {
                    AppError::AuthenticationRequired(
                        "A signed-in student is required to submit".to_string(),
                    )
                })?;
                self.pending = Some(self.finalize(student_id));
            }
            // A previous write failed or was interrupted: resend the same record.
            AttemptState::Submitting | AttemptState::SubmitFailed => {}
        }

        let record = self.pending.clone().ok_or_else(|| {
            AppError::InternalServerError("no scored record to submit".to_string())
        })?;
        self.state = AttemptState::Submitting;

        match store.insert_attempt(&record).await {
            Ok(_) => self.mark_completed(record),
            // The record already landed, e.g. a write that timed out client side.
            Err(AppError::Conflict(_)) => {
                tracing::warn!("Attempt {} was already stored", record.id);
                self.mark_completed(record)
            }
            Err(e) => {
                self.state = AttemptState::SubmitFailed;
                tracing::warn!("Submitting attempt {} failed: {}", record.id, e);
                Err(e)
            }
        }
    }

    fn mark_completed(&mut self, record: ExamAttempt) -> Result<Submission, AppError> {
        self.attempt = record.clone();
        self.completed = Some(record.clone());
        self.pending = None;
        self.state = AttemptState::Completed;
        tracing::info!(
            "Attempt {} completed with score {}/{}",
            record.id,
            record.score,
            record.total_questions
        );
        Ok(Submission {
            attempt: record,
            duplicate: false,
        })
    }

    /// Builds the completed record from the current answers.
    /// Every question gets an entry, `NO_ANSWER` where nothing was chosen.
    fn finalize(&self, student_id: Uuid) -> ExamAttempt {
        let recorded: HashMap<Uuid, i32> = self
            .attempt
            .answers
            .iter()
            .map(|a| (a.question_id, a.selected_answer))
            .collect();
        let answers: Vec<AnswerRecord> = self
            .exam
            .questions
            .iter()
            .map(|q| AnswerRecord {
                question_id: q.id,
                selected_answer: recorded.get(&q.id).copied().unwrap_or(NO_ANSWER),
            })
            .collect();

        let end_time = Utc::now().max(self.attempt.start_time);
        ExamAttempt {
            id: self.attempt.id,
            student_id,
            exam_set_id: self.exam.id,
            score: score_answers(&self.exam.questions, &answers),
            answers,
            total_questions: self.exam.question_count() as i32,
            start_time: self.attempt.start_time,
            end_time: Some(end_time),
            is_completed: true,
        }
    }

    /// Gives up on the attempt. Nothing is persisted.
    pub fn abandon(&mut self) -> Result<(), AppError> {
        match self.state {
            AttemptState::InProgress | AttemptState::SubmitFailed => {
                self.state = AttemptState::Abandoned;
                self.pending = None;
                tracing::info!("Attempt {} abandoned", self.attempt.id);
                Ok(())
            }
            other => Err(AppError::InvalidState(format!(
                "Cannot abandon an attempt that is {}",
                other
            ))),
        }
    }

    pub fn view(&self) -> AttemptView {
        AttemptView {
            attempt_id: self.attempt.id,
            exam_set_id: self.exam.id,
            exam_title: self.exam.title.clone(),
            state: self.state.to_string(),
            question_count: self.exam.question_count(),
            current_index: self.cursor,
            current_question: PublicQuestion::from(self.current_question()),
            answers: self.attempt.answers.clone(),
            remaining_seconds: self.remaining_seconds,
            start_time: self.attempt.start_time,
        }
    }
}
