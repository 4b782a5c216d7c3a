//! Points awarded for a submitted case.
//!
//! - Base: rating × 10
//! - Streak: +1% of base per streak day, capped at 30%
//! - Speed: +10% of base when solved in under two minutes
//! - No hints: +10% of base
//!
//! Percentages are applied in integer arithmetic, rounding halves up.

use crate::models::{clamp_rating, PointsBreakdown};

/// Base points per rating step.
pub const POINTS_PER_RATING: u32 = 10;

/// Streak bonus percent per day.
pub const STREAK_PERCENT_PER_DAY: u32 = 1;

/// Streak bonus cap, percent of base.
pub const MAX_STREAK_PERCENT: u32 = 30;

/// Submissions faster than this earn the speed bonus.
pub const SPEED_BONUS_SECONDS: u64 = 120;

pub const SPEED_BONUS_PERCENT: u32 = 10;

pub const NO_HINTS_BONUS_PERCENT: u32 = 10;

/// `round(base × percent / 100)`.
fn percent_of(base: u32, percent: u32) -> u32 {
    (base * percent + 50) / 100
}

/// Compute the points breakdown for a submission.
pub fn compute_points(
    effective_acr_rating: u8,
    current_streak_days: u32,
    time_spent_seconds: u64,
    hints_used: u32,
) -> PointsBreakdown {
    let base = clamp_rating(effective_acr_rating as i32) as u32 * POINTS_PER_RATING;

    let streak_percent = current_streak_days
        .saturating_mul(STREAK_PERCENT_PER_DAY)
        .min(MAX_STREAK_PERCENT);
    let streak_bonus = percent_of(base, streak_percent);

    let speed_bonus = if time_spent_seconds < SPEED_BONUS_SECONDS {
        percent_of(base, SPEED_BONUS_PERCENT)
    } else {
        0
    };

    let no_hints_bonus = if hints_used == 0 {
        percent_of(base, NO_HINTS_BONUS_PERCENT)
    } else {
        0
    };

    PointsBreakdown {
        base,
        streak_bonus,
        speed_bonus,
        no_hints_bonus,
        total: base + streak_bonus + speed_bonus + no_hints_bonus,
    }
}
