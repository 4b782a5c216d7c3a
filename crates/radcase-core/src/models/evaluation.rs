//! Evaluation and reward models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::scoring::RatingCategory;

/// Session mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Hints available, hint penalty applies, no timer
    Learning,
    /// Timed, no hints
    Quiz,
}

impl_str_enum!(SessionMode { Learning => "learning", Quiz => "quiz" });

/// Outcome of comparing a learner's selection to the ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    /// Ids the learner selected
    pub selected_ids: BTreeSet<String>,
    /// Rating credited for the selection
    pub effective_acr_rating: u8,
    /// Band of the effective rating
    pub rating_category: RatingCategory,
    /// Effective rating is usually appropriate
    pub is_correct: bool,
    /// Score (0–100)
    pub score: u8,
    /// Mode the selection was made in
    pub mode: SessionMode,
    /// Hints revealed before submitting
    pub hints_used: u32,
    /// Id of the optimal option in the ranking, if any
    pub optimal_imaging_id: Option<String>,
}

/// Points awarded for a submission.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointsBreakdown {
    /// Rating × 10
    pub base: u32,
    /// Up to 30% of base, 1% per streak day
    pub streak_bonus: u32,
    /// 10% of base when solved in under two minutes
    pub speed_bonus: u32,
    /// 10% of base when no hints were used
    pub no_hints_bonus: u32,
    /// Sum of all components
    pub total: u32,
}

/// Cost/radiation comparison between the learner's choice and the optimal one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BetterChoice {
    /// Optimal option id
    pub imaging_option_id: String,
    /// Optimal option display name
    pub name: String,
    /// Optimal option rating
    pub acr_rating: u8,
    /// Why the optimal option is rated as it is
    pub rationale: String,
    /// Selected cost minus optimal cost (USD)
    pub cost_delta_usd: f64,
    /// Selected radiation minus optimal radiation (mSv)
    pub radiation_delta_msv: f64,
}
