//! Ranking output models.

use serde::{Deserialize, Serialize};

use super::imaging::Modality;

/// Lowest ACR appropriateness rating.
pub const MIN_ACR_RATING: u8 = 1;

/// Highest ACR appropriateness rating.
pub const MAX_ACR_RATING: u8 = 9;

/// Lowest rating counted as "usually appropriate" (and therefore correct).
pub const APPROPRIATE_THRESHOLD: u8 = 7;

/// Lowest rating counted as "may be appropriate".
pub const MAY_BE_APPROPRIATE_THRESHOLD: u8 = 4;

/// Clamp any integer rating onto the 1–9 scale.
pub fn clamp_rating(rating: i32) -> u8 {
    rating.clamp(MIN_ACR_RATING as i32, MAX_ACR_RATING as i32) as u8
}

/// ACR rating bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RatingCategory {
    /// Ratings 1–3
    UsuallyNotAppropriate,
    /// Ratings 4–6
    MayBeAppropriate,
    /// Ratings 7–9
    UsuallyAppropriate,
}

impl_str_enum!(RatingCategory {
    UsuallyNotAppropriate => "usually-not-appropriate",
    MayBeAppropriate => "may-be-appropriate",
    UsuallyAppropriate => "usually-appropriate",
});

impl RatingCategory {
    /// Category for a rating. Out-of-range ratings are clamped first.
    pub fn from_rating(rating: u8) -> Self {
        match clamp_rating(rating as i32) {
            r if r >= APPROPRIATE_THRESHOLD => RatingCategory::UsuallyAppropriate,
            r if r >= MAY_BE_APPROPRIATE_THRESHOLD => RatingCategory::MayBeAppropriate,
            _ => RatingCategory::UsuallyNotAppropriate,
        }
    }
}

/// Appropriateness of one imaging option for a presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringResult {
    /// Id of the rated imaging option
    pub imaging_option_id: String,
    /// Technique of the rated option
    pub modality: Modality,
    /// ACR rating (1–9)
    pub acr_rating: u8,
    /// Which rule(s) drove the rating
    pub rationale: String,
    /// The single best option for this ranking call
    pub is_optimal: bool,
    /// Ids of the rules that adjusted this option
    #[serde(default)]
    pub applied_rules: Vec<String>,
}

impl ScoringResult {
    pub fn category(&self) -> RatingCategory {
        RatingCategory::from_rating(self.acr_rating)
    }

    pub fn is_no_imaging(&self) -> bool {
        self.modality == Modality::NoImaging
    }
}
