//! Attempt records emitted for persistence and analytics.

use serde::{Deserialize, Serialize};

use super::evaluation::{EvaluationResult, PointsBreakdown, SessionMode};

/// One submitted attempt at a case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    /// Unique attempt ID
    pub attempt_id: String,
    /// Case the attempt belongs to
    pub case_id: String,
    /// Learner who made the attempt
    pub user_id: String,
    /// 1 for the first attempt, incremented on each retry
    pub attempt_number: u32,
    /// Selected imaging option ids (sorted)
    pub selection: Vec<String>,
    pub effective_acr_rating: u8,
    pub is_correct: bool,
    pub score: u8,
    pub points: PointsBreakdown,
    pub mode: SessionMode,
    pub hints_used: u32,
    pub elapsed_seconds: u64,
    /// Submitted by the quiz countdown rather than the learner
    pub time_up: bool,
    /// Submission timestamp (RFC 3339)
    pub timestamp: String,
}

impl AttemptRecord {
    /// Build a record from an evaluation and its points.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        case_id: &str,
        user_id: &str,
        attempt_number: u32,
        evaluation: &EvaluationResult,
        points: PointsBreakdown,
        elapsed_seconds: u64,
        time_up: bool,
        timestamp: String,
    ) -> Self {
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            user_id: user_id.to_string(),
            attempt_number,
            selection: evaluation.selected_ids.iter().cloned().collect(),
            effective_acr_rating: evaluation.effective_acr_rating,
            is_correct: evaluation.is_correct,
            score: evaluation.score,
            points,
            mode: evaluation.mode,
            hints_used: evaluation.hints_used,
            elapsed_seconds,
            time_up,
            timestamp,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
