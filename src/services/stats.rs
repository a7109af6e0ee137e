// src/services/stats.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    models::{
        exam_attempt::ExamAttempt,
        exam_set::ExamSet,
        stats::{ExamSetResult, ExamStats, StudentSummary},
    },
};

/// Percentages of the completed attempts, sorted ascending.
///
/// Attempts without questions are skipped.
fn sorted_percentages<'a>(attempts: impl Iterator<Item = &'a ExamAttempt>) -> Vec<f64> {
    let mut percentages: Vec<f64> = attempts
        .filter(|a| a.is_completed)
        .filter_map(ExamAttempt::percentage)
        .collect();
    // Fixed summation order: results do not depend on input order.
    percentages.sort_by(f64::total_cmp);
    percentages
}

fn mean(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

/// Summary statistics for one exam set over a snapshot of attempts.
///
/// Returns all zeros when the set has no completed attempts.
pub fn compute_stats(attempts: &[ExamAttempt], exam_set_id: Uuid) -> ExamStats {
    let percentages = sorted_percentages(attempts.iter().filter(|a| a.exam_set_id == exam_set_id));
    if percentages.is_empty() {
        return ExamStats::default();
    }

    let passed = percentages
        .iter()
        .filter(|p| **p >= PASSING_SCORE_PERCENTAGE)
        .count();

    ExamStats {
        total_attempts: percentages.len(),
        average_score: mean(&percentages),
        highest_score: percentages[percentages.len() - 1],
        lowest_score: percentages[0],
        pass_rate: 100.0 * passed as f64 / percentages.len() as f64,
    }
}

/// Totals over one student's attempts, across all exam sets.
pub fn summarize_student(attempts: &[ExamAttempt], student_id: Uuid) -> StudentSummary {
    let percentages = sorted_percentages(attempts.iter().filter(|a| a.student_id == student_id));

    StudentSummary {
        total_attempts: percentages.len(),
        average_score: mean(&percentages),
        best_score: percentages.last().copied().unwrap_or(0.0),
    }
}

/// One student's results grouped by exam set, most recently taken set first.
///
/// `exam_sets` supplies titles; sets missing from it keep `exam_title: None`.
pub fn results_by_exam_set(
    attempts: &[ExamAttempt],
    student_id: Uuid,
    exam_sets: &[ExamSet],
) -> Vec<ExamSetResult> {
    let mut grouped: HashMap<Uuid, Vec<&ExamAttempt>> = HashMap::new();
    for attempt in attempts
        .iter()
        .filter(|a| a.student_id == student_id && a.is_completed && a.total_questions > 0)
    {
        grouped.entry(attempt.exam_set_id).or_default().push(attempt);
    }

    let mut results: Vec<ExamSetResult> = grouped
        .into_iter()
        .map(|(exam_set_id, mut group)| {
            // Newest first; ties broken by id so the pick is stable.
            group.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(a.id.cmp(&b.id)));
            let percentages = sorted_percentages(group.iter().copied());
            let latest = group[0];

            ExamSetResult {
                exam_set_id,
                exam_title: exam_sets
                    .iter()
                    .find(|s| s.id == exam_set_id)
                    .map(|s| s.title.clone()),
                attempts: group.len(),
                best_score: percentages.last().copied().unwrap_or(0.0),
                latest_score: latest.percentage().unwrap_or(0.0),
                latest_end_time: latest.end_time,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.latest_end_time
            .cmp(&a.latest_end_time)
            .then(a.exam_set_id.cmp(&b.exam_set_id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(exam_set_id: Uuid, score: i32, total: i32) -> ExamAttempt {
        let now = chrono::Utc::now();
        ExamAttempt {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            exam_set_id,
            answers: Vec::new(),
            score,
            total_questions: total,
            start_time: now,
            end_time: Some(now),
            is_completed: true,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_no_attempts_is_all_zero() {
        let stats = compute_stats(&[], Uuid::new_v4());
        assert_eq!(stats, ExamStats::default());
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.pass_rate, 0.0);
    }

    #[test]
    fn test_other_exam_sets_are_ignored() {
        let ours = Uuid::new_v4();
        let attempts = vec![attempt(Uuid::new_v4(), 5, 5)];
        assert_eq!(compute_stats(&attempts, ours).total_attempts, 0);
    }

    #[test]
    fn test_three_attempts() {
        let set = Uuid::new_v4();
        let attempts = vec![attempt(set, 10, 10), attempt(set, 5, 10), attempt(set, 7, 10)];

        let stats = compute_stats(&attempts, set);

        assert_eq!(stats.total_attempts, 3);
        assert!(approx(stats.average_score, 73.33));
        assert_eq!(stats.highest_score, 100.0);
        assert_eq!(stats.lowest_score, 50.0);
        assert!(approx(stats.pass_rate, 66.67));
    }

    #[test]
    fn test_order_does_not_matter() {
        let set = Uuid::new_v4();
        let mut attempts = vec![
            attempt(set, 1, 3),
            attempt(set, 2, 3),
            attempt(set, 7, 9),
            attempt(set, 0, 4),
            attempt(set, 11, 13),
        ];
        let forward = compute_stats(&attempts, set);
        attempts.reverse();
        let backward = compute_stats(&attempts, set);
        attempts.swap(0, 3);
        let shuffled = compute_stats(&attempts, set);

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let set = Uuid::new_v4();
        let attempts = vec![attempt(set, 3, 5), attempt(set, 2, 5)];
        let stats = compute_stats(&attempts, set);
        assert_eq!(stats.pass_rate, 50.0);
    }

    #[test]
    fn test_zero_question_attempts_are_skipped() {
        let set = Uuid::new_v4();
        let attempts = vec![attempt(set, 0, 0), attempt(set, 4, 4)];
        let stats = compute_stats(&attempts, set);
        assert_eq!(stats.total_attempts, 1);
        assert_eq!(stats.lowest_score, 100.0);
    }

    #[test]
    fn test_student_summary() {
        let student = Uuid::nil();
        let attempts = vec![
            attempt(Uuid::new_v4(), 1, 2),
            attempt(Uuid::new_v4(), 4, 4),
        ];
        let summary = summarize_student(&attempts, student);
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.average_score, 75.0);
        assert_eq!(summary.best_score, 100.0);

        let nobody = summarize_student(&attempts, Uuid::new_v4());
        assert_eq!(nobody, StudentSummary::default());
    }

    #[test]
    fn test_results_grouped_by_exam_set() {
        let student = Uuid::nil();
        let (algebra, history) = (Uuid::new_v4(), Uuid::new_v4());
        let start = chrono::Utc::now();
        let finished = |set: Uuid, score: i32, minutes: i64| {
            let mut a = attempt(set, score, 10);
            a.end_time = Some(start + chrono::Duration::minutes(minutes));
            a
        };
        let attempts = vec![
            finished(algebra, 9, 1),
            finished(algebra, 4, 5),
            finished(history, 6, 3),
        ];
        let sets = vec![ExamSet {
            id: algebra,
            title: "Algebra".to_string(),
            description: String::new(),
            created_by: Uuid::new_v4(),
            created_at: start,
            is_active: true,
            time_limit: None,
            questions: Vec::new(),
        }];

        let results = results_by_exam_set(&attempts, student, &sets);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].exam_set_id, algebra);
        assert_eq!(results[0].exam_title.as_deref(), Some("Algebra"));
        assert_eq!(results[0].attempts, 2);
        assert_eq!(results[0].best_score, 90.0);
        assert_eq!(results[0].latest_score, 40.0);
        assert_eq!(results[1].exam_set_id, history);
        assert_eq!(results[1].exam_title, None);
        assert_eq!(results[1].best_score, 60.0);

        assert!(results_by_exam_set(&attempts, Uuid::new_v4(), &sets).is_empty());
    }
}
