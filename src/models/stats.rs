// src/models/stats.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary statistics for one exam set. Derived on demand, never stored.
/// All score fields are percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamStats {
    pub total_attempts: usize,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    /// Share of attempts at or above the passing threshold.
    pub pass_rate: f64,
}

/// Overview shown on a student's results page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub total_attempts: usize,
    pub average_score: f64,
    pub best_score: f64,
}

/// One student's attempts on one exam set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSetResult {
    pub exam_set_id: Uuid,
    /// `None` when the set is no longer in the catalog.
    pub exam_title: Option<String>,
    pub attempts: usize,
    pub best_score: f64,
    /// Percentage of the most recently finished attempt.
    pub latest_score: f64,
    pub latest_end_time: Option<chrono::DateTime<chrono::Utc>>,
}
