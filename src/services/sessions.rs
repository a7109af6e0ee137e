// src/services/sessions.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::{sync::Mutex, task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::{
    config::DEFAULT_SESSION_MAX_AGE_SECS,
    error::AppError,
    models::{
        exam_attempt::{AttemptView, NavigateRequest},
        exam_set::ExamSet,
    },
    services::attempt::{AttemptSession, Submission, Tick},
    store::ExamStore,
};

/// Countdown task of one timed attempt. Dropping it stops the task.
struct Countdown(JoinHandle<()>);

impl Drop for Countdown {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct SessionEntry {
    owner: Uuid,
    opened_at: Instant,
    session: Arc<Mutex<AttemptSession>>,
    _countdown: Option<Countdown>,
}

/// Live attempt sessions, keyed by attempt id.
///
/// Each session sits behind its own async mutex: answers, ticks and submits
/// on one attempt run one at a time, and a submit holds the lock for the
/// whole store write. Sessions are removed once their attempt is stored or
/// abandoned, which also cancels their countdown.
///
/// A student has at most one open session: starting a new attempt drops the
/// previous one. Sessions older than `max_age` are dropped on the next start.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<StdMutex<HashMap<Uuid, SessionEntry>>>,
    store: Arc<dyn ExamStore>,
    tick_interval: Duration,
    max_age: Duration,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ExamStore>, tick_interval: Duration) -> Self {
        Self {
            sessions: Arc::new(StdMutex::new(HashMap::new())),
            store,
            tick_interval,
            max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_SECS),
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn active_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Looks up the exam set and opens a session on it.
    pub async fn start_attempt(
        &self,
        student_id: Uuid,
        exam_set_id: Uuid,
    ) -> Result<AttemptView, AppError> {
        let exam_set = self
            .store
            .fetch_exam_set_by_id(exam_set_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam set {} not found", exam_set_id)))?;
        self.start(student_id, exam_set)
    }

    /// Opens a session for `student_id` on an already loaded exam set.
    pub fn start(&self, student_id: Uuid, exam_set: ExamSet) -> Result<AttemptView, AppError> {
        let session = AttemptSession::start(exam_set, Some(student_id))?;
        let attempt_id = session.id();
        let timed = session.is_timed();
        let view = session.view();
        let session = Arc::new(Mutex::new(session));

        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        let max_age = self.max_age;
        sessions.retain(|_, entry| {
            entry.owner != student_id && entry.opened_at.elapsed() < max_age
        });
        let dropped = before - sessions.len();

        // The countdown cannot discard the entry before it is inserted:
        // it needs this lock first.
        let countdown = timed.then(|| self.spawn_countdown(attempt_id, session.clone()));
        sessions.insert(
            attempt_id,
            SessionEntry {
                owner: student_id,
                opened_at: Instant::now(),
                session,
                _countdown: countdown,
            },
        );
        drop(sessions);

        if dropped > 0 {
            tracing::info!("Dropped {} replaced or stale attempt sessions", dropped);
        }

        tracing::info!(
            "Attempt {} started by {} on exam set {}",
            attempt_id,
            student_id,
            view.exam_set_id
        );
        Ok(view)
    }

    /// The caller's session. Sessions of other students are reported as missing.
    fn session_for(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<Arc<Mutex<AttemptSession>>, AppError> {
        let sessions = self.lock_sessions();
        match sessions.get(&attempt_id) {
            Some(entry) if entry.owner == student_id => Ok(entry.session.clone()),
            _ => Err(AppError::NotFound(format!(
                "No open attempt {} for this student",
                attempt_id
            ))),
        }
    }

    fn discard(&self, attempt_id: Uuid) {
        self.lock_sessions().remove(&attempt_id);
    }

    pub async fn view(&self, attempt_id: Uuid, student_id: Uuid) -> Result<AttemptView, AppError> {
        let session = self.session_for(attempt_id, student_id)?;
        let session = session.lock().await;
        Ok(session.view())
    }

    pub async fn record_answer(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
        question_id: Uuid,
        selected_answer: i32,
    ) -> Result<AttemptView, AppError> {
        let session = self.session_for(attempt_id, student_id)?;
        let mut session = session.lock().await;
        session.record_answer(question_id, selected_answer)?;
        Ok(session.view())
    }

    pub async fn navigate(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
        request: NavigateRequest,
    ) -> Result<AttemptView, AppError> {
        let session = self.session_for(attempt_id, student_id)?;
        let mut session = session.lock().await;
        session.navigate(request);
        Ok(session.view())
    }

    /// Submits the attempt.
    ///
    /// Once the session is gone, a repeated submit is answered from the
    /// store with `duplicate` set.
    pub async fn submit(&self, attempt_id: Uuid, student_id: Uuid) -> Result<Submission, AppError> {
        let session = match self.session_for(attempt_id, student_id) {
            Ok(session) => session,
            Err(not_found) => return self.stored_submission(attempt_id, student_id, not_found).await,
        };

        let submission = {
            let mut session = session.lock().await;
            session.submit(self.store.as_ref()).await
        };
        match submission {
            Ok(submission) => {
                self.discard(attempt_id);
                Ok(submission)
            }
            // The exam set went away mid-attempt; a retry cannot succeed.
            Err(e @ AppError::NotFound(_)) => {
                tracing::warn!("Dropping attempt {}: {}", attempt_id, e);
                self.discard(attempt_id);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn stored_submission(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
        not_found: AppError,
    ) -> Result<Submission, AppError> {
        match self.store.fetch_attempt_by_id(attempt_id).await? {
            Some(attempt) if attempt.student_id == student_id => Ok(Submission {
                attempt,
                duplicate: true,
            }),
            _ => Err(not_found),
        }
    }

    /// Drops the attempt without storing anything.
    pub async fn abandon(&self, attempt_id: Uuid, student_id: Uuid) -> Result<(), AppError> {
        let session = self.session_for(attempt_id, student_id)?;
        session.lock().await.abandon()?;
        self.discard(attempt_id);
        Ok(())
    }

    fn spawn_countdown(&self, attempt_id: Uuid, session: Arc<Mutex<AttemptSession>>) -> Countdown {
        let registry = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.tick_interval);
            // The first tick of an interval fires immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let outcome = {
                    let mut session = session.lock().await;
                    session.tick(registry.store.as_ref()).await
                };

                match outcome {
                    Ok(Tick::Running { .. }) => continue,
                    Ok(Tick::Expired(submission)) => {
                        tracing::info!(
                            "Attempt {} auto-submitted with score {}/{}",
                            attempt_id,
                            submission.attempt.score,
                            submission.attempt.total_questions
                        );
                        registry.discard(attempt_id);
                        break;
                    }
                    Ok(Tick::Idle) => break,
                    Err(e @ AppError::NotFound(_)) => {
                        tracing::warn!("Dropping attempt {}: {}", attempt_id, e);
                        registry.discard(attempt_id);
                        break;
                    }
                    Err(e) => {
                        // The session keeps its scored record; the student can retry the submit.
                        tracing::error!("Auto-submit of attempt {} failed: {}", attempt_id, e);
                        break;
                    }
                }
            }
        });
        Countdown(handle)
    }
}
