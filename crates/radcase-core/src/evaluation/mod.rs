//! Evaluation of a learner's imaging order against the ranking.
//!
//! Scoring:
//! - Effective rating: best rated selected option (no-imaging is exclusive)
//! - Correct: effective rating ≥ 7
//! - Score: round(rating / 9 × 100), minus 5 per hint in learning mode

mod comparison;

pub use comparison::*;

use std::collections::BTreeSet;

use crate::models::{
    EvaluationResult, RatingCategory, ScoringResult, SessionMode, APPROPRIATE_THRESHOLD,
    MAX_ACR_RATING, MIN_ACR_RATING, NO_IMAGING_ID,
};

/// Points deducted per revealed hint in learning mode.
pub const HINT_PENALTY: u32 = 5;

/// Session facts the evaluation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub mode: SessionMode,
    pub hints_used: u32,
}

impl EvaluationContext {
    pub fn learning(hints_used: u32) -> Self {
        Self {
            mode: SessionMode::Learning,
            hints_used,
        }
    }

    pub fn quiz() -> Self {
        Self {
            mode: SessionMode::Quiz,
            hints_used: 0,
        }
    }
}

/// Whether an id denotes "no imaging" in this ranking.
pub fn is_no_imaging_id(id: &str, ranking: &[ScoringResult]) -> bool {
    id == NO_IMAGING_ID
        || ranking
            .iter()
            .any(|r| r.is_no_imaging() && r.imaging_option_id == id)
}

/// Rating credited for a selection.
///
/// A selection containing the no-imaging id is judged on that option alone.
/// An empty selection, or one matching nothing in the ranking, earns 1.
pub fn effective_rating(selection: &BTreeSet<String>, ranking: &[ScoringResult]) -> u8 {
    let no_imaging_selected = selection.iter().any(|id| is_no_imaging_id(id, ranking));

    let credited = if no_imaging_selected {
        ranking
            .iter()
            .find(|r| r.is_no_imaging())
            .map(|r| r.acr_rating)
    } else {
        ranking
            .iter()
            .filter(|r| selection.contains(&r.imaging_option_id))
            .map(|r| r.acr_rating)
            .max()
    };

    credited.unwrap_or(MIN_ACR_RATING)
}

/// Score (0–100) for an effective rating.
pub fn score_for(effective_acr_rating: u8, context: EvaluationContext) -> u8 {
    let rating = effective_acr_rating.clamp(MIN_ACR_RATING, MAX_ACR_RATING) as f64;
    let raw = (rating / MAX_ACR_RATING as f64 * 100.0).round() as u32;

    let penalty = match context.mode {
        SessionMode::Learning => HINT_PENALTY.saturating_mul(context.hints_used),
        SessionMode::Quiz => 0,
    };

    raw.saturating_sub(penalty) as u8
}

/// Compare a selection to the ranking.
pub fn evaluate(
    selection: &BTreeSet<String>,
    ranking: &[ScoringResult],
    context: EvaluationContext,
) -> EvaluationResult {
    let effective_acr_rating = effective_rating(selection, ranking);

    EvaluationResult {
        selected_ids: selection.clone(),
        effective_acr_rating,
        rating_category: RatingCategory::from_rating(effective_acr_rating),
        is_correct: effective_acr_rating >= APPROPRIATE_THRESHOLD,
        score: score_for(effective_acr_rating, context),
        mode: context.mode,
        hints_used: context.hints_used,
        optimal_imaging_id: ranking
            .iter()
            .find(|r| r.is_optimal)
            .map(|r| r.imaging_option_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Modality;

    fn result(id: &str, modality: Modality, rating: u8, optimal: bool) -> ScoringResult {
        ScoringResult {
            imaging_option_id: id.into(),
            modality,
            acr_rating: rating,
            rationale: format!("{} rated {}", id, rating),
            is_optimal: optimal,
            applied_rules: vec![],
        }
    }

    fn ranking() -> Vec<ScoringResult> {
        vec![
            result("mri", Modality::Mri, 9, true),
            result("ct", Modality::Ct, 6, false),
            result("xray", Modality::Xray, 3, false),
            result(NO_IMAGING_ID, Modality::NoImaging, 1, false),
        ]
    }

    fn select(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scenario_a_full_score() {
        let eval = evaluate(&select(&["mri"]), &ranking(), EvaluationContext::learning(0));
        assert_eq!(eval.effective_acr_rating, 9);
        assert_eq!(eval.score, 100);
        assert!(eval.is_correct);
        assert_eq!(eval.optimal_imaging_id.as_deref(), Some("mri"));
    }

    #[test]
    fn test_scenario_b_hint_penalty() {
        let eval = evaluate(&select(&["mri"]), &ranking(), EvaluationContext::learning(2));
        assert_eq!(eval.score, 90);
    }

    #[test]
    fn test_scenario_c_incorrect() {
        for context in [EvaluationContext::learning(0), EvaluationContext::quiz()] {
            let eval = evaluate(&select(&["xray"]), &ranking(), context);
            assert_eq!(eval.effective_acr_rating, 3);
            assert!(!eval.is_correct);
            assert_eq!(eval.rating_category.as_str(), "usually-not-appropriate");
        }
    }

    #[test]
    fn test_quiz_has_no_hint_penalty() {
        let context = EvaluationContext {
            mode: SessionMode::Quiz,
            hints_used: 3,
        };
        assert_eq!(score_for(9, context), 100);
    }

    #[test]
    fn test_penalty_floors_at_zero() {
        assert_eq!(score_for(1, EvaluationContext::learning(3)), 0);
        assert_eq!(score_for(2, EvaluationContext::learning(40)), 0);
    }

    #[test]
    fn test_score_table() {
        let expected = [11, 22, 33, 44, 56, 67, 78, 89, 100];
        for (rating, score) in (1..=9).zip(expected) {
            assert_eq!(score_for(rating, EvaluationContext::quiz()), score);
        }
    }

    #[test]
    fn test_best_selected_rating_counts() {
        let eval = evaluate(&select(&["xray", "ct"]), &ranking(), EvaluationContext::quiz());
        assert_eq!(eval.effective_acr_rating, 6);
        assert_eq!(eval.rating_category, RatingCategory::MayBeAppropriate);
    }

    #[test]
    fn test_no_imaging_is_exclusive() {
        let eval = evaluate(
            &select(&["mri", NO_IMAGING_ID]),
            &ranking(),
            EvaluationContext::quiz(),
        );
        assert_eq!(eval.effective_acr_rating, 1);
        assert!(!eval.is_correct);
    }

    #[test]
    fn test_catalog_none_id_is_sentinel() {
        let ranking = vec![
            result("conservative", Modality::NoImaging, 9, true),
            result("mri", Modality::Mri, 2, false),
        ];
        assert!(is_no_imaging_id("conservative", &ranking));
        assert!(is_no_imaging_id(NO_IMAGING_ID, &ranking));
        assert!(!is_no_imaging_id("mri", &ranking));

        let eval = evaluate(&select(&["conservative", "mri"]), &ranking, EvaluationContext::quiz());
        assert_eq!(eval.effective_acr_rating, 9);
    }

    #[test]
    fn test_empty_or_unknown_selection_earns_one() {
        let eval = evaluate(&BTreeSet::new(), &ranking(), EvaluationContext::quiz());
        assert_eq!(eval.effective_acr_rating, 1);
        assert_eq!(eval.score, 11);

        let eval = evaluate(&select(&["pet"]), &ranking(), EvaluationContext::quiz());
        assert_eq!(eval.effective_acr_rating, 1);

        let eval = evaluate(&select(&[NO_IMAGING_ID]), &[], EvaluationContext::quiz());
        assert_eq!(eval.effective_acr_rating, 1);
        assert_eq!(eval.optimal_imaging_id, None);
    }
}
