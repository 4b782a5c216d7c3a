//! Appropriateness ranking engine.
//!
//! Pipeline: Validation → Rule evaluation per option → No-imaging rule → Tie-break
//!
//! Ratings are baseline + sum of matching rule adjustments, clamped to 1–9.
//! Results are ordered best first; ties go to the lower radiation dose, then
//! the lower cost, then the earlier catalog position. Only the first result is
//! marked optimal.

mod cache;
mod rules;

pub use cache::*;
pub use rules::*;

use std::cmp::Ordering;

use thiserror::Error;
use tracing::debug;

use crate::models::{
    clamp_rating, ClinicalInput, ImagingOption, Modality, ScoringResult, APPROPRIATE_THRESHOLD,
    MAX_ACR_RATING, MIN_ACR_RATING,
};
use crate::validator::{InputError, Validator};

/// Ranking errors.
#[derive(Error, Debug)]
pub enum RankingError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Invalid rule table: {0}")]
    InvalidRuleTable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RankingResult<T> = Result<T, RankingError>;

/// A result plus the keys used to order it.
struct Ranked {
    result: ScoringResult,
    radiation_msv: f64,
    cost_usd: f64,
    position: usize,
}

/// Rule-based ranking engine.
pub struct RankingEngine {
    rules: RuleTable,
    validator: Validator,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new(RuleTable::default())
    }
}

impl RankingEngine {
    /// Create an engine for a rule table. The validator is built from the
    /// table's red-flag vocabulary.
    pub fn new(rules: RuleTable) -> Self {
        let validator = Validator::new(rules.red_flag_vocabulary());
        Self { rules, validator }
    }

    /// Rank imaging options for a presentation.
    ///
    /// Returns an empty list for an empty catalog. Otherwise every catalog
    /// option plus the no-imaging option is rated, best first.
    pub fn rank(
        &self,
        input: &ClinicalInput,
        modalities: &[ImagingOption],
    ) -> RankingResult<Vec<ScoringResult>> {
        let input = self.validator.validate(input)?;
        self.validator.validate_catalog(modalities)?;
        self.rules.validate()?;

        if modalities.is_empty() {
            return Ok(Vec::new());
        }

        let fired: Vec<&Rule> = self
            .rules
            .rules
            .iter()
            .filter(|rule| rule.when.matches(&input))
            .collect();
        debug!(
            rules = ?fired.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "rules matched presentation"
        );

        // Step 1: Rate each imaging option
        let mut ranked = Vec::with_capacity(modalities.len() + 1);
        for (position, option) in modalities.iter().enumerate() {
            if option.is_no_imaging() {
                continue;
            }
            ranked.push(Ranked {
                result: self.score_option(option, &fired)?,
                radiation_msv: option.radiation_msv,
                cost_usd: option.cost_usd,
                position,
            });
        }

        // Step 2: Rate "no imaging" independently of the loop above
        let synthetic = ImagingOption::no_imaging();
        let (no_imaging, position) = modalities
            .iter()
            .enumerate()
            .find(|(_, o)| o.is_no_imaging())
            .map(|(i, o)| (o, i))
            .unwrap_or((&synthetic, modalities.len()));
        let no_imaging_result = self.score_no_imaging(no_imaging, &fired)?;
        ranked.push(Ranked {
            result: no_imaging_result,
            radiation_msv: 0.0,
            cost_usd: 0.0,
            position,
        });

        // Step 3: Order and pick the optimal option
        ranked.sort_by(compare_ranked);
        let mut results: Vec<ScoringResult> = ranked.into_iter().map(|r| r.result).collect();
        if let Some(first) = results.first_mut() {
            first.is_optimal = true;
            debug!(
                option = %first.imaging_option_id,
                rating = first.acr_rating,
                "optimal imaging selected"
            );
        }

        Ok(results)
    }

    /// Rate one imaging option.
    fn score_option(&self, option: &ImagingOption, fired: &[&Rule]) -> RankingResult<ScoringResult> {
        let baseline = self.rules.baseline(option.modality)?;

        // (rule, delta) pairs that moved this option, strongest first
        let mut drivers: Vec<(&Rule, i32)> = fired
            .iter()
            .map(|rule| (*rule, rule.delta_for(option)))
            .filter(|(_, delta)| *delta != 0)
            .collect();
        drivers.sort_by(|a, b| b.1.abs().cmp(&a.1.abs()));

        let raw: i32 = baseline + drivers.iter().map(|(_, d)| d).sum::<i32>();
        let acr_rating = clamp_rating(raw);

        let label = if option.name.is_empty() {
            option.modality.display_name().to_string()
        } else {
            option.name.clone()
        };
        let rationale = if drivers.is_empty() {
            format!("{}: no clinical rule modified its baseline rating", label)
        } else {
            let fragments: Vec<&str> = drivers.iter().map(|(r, _)| r.rationale.as_str()).collect();
            format!("{}: {}", label, fragments.join("; "))
        };

        Ok(ScoringResult {
            imaging_option_id: option.id.clone(),
            modality: option.modality,
            acr_rating,
            rationale,
            is_optimal: false,
            applied_rules: drivers.iter().map(|(r, _)| r.id.clone()).collect(),
        })
    }

    /// Rate "no imaging": appropriate only when no imaging technique, with or
    /// without contrast, would reach an appropriate rating for this presentation.
    ///
    /// Every technique the table has a baseline for is considered, not just the
    /// ones in the case catalog.
    fn score_no_imaging(&self, option: &ImagingOption, fired: &[&Rule]) -> RankingResult<ScoringResult> {
        let mut best: Option<(ImagingOption, u8)> = None;
        for modality in Modality::IMAGING {
            if !self.rules.baselines.contains_key(&modality) {
                continue;
            }
            for contrast in [false, true] {
                let mut candidate = ImagingOption::new(modality.as_str(), modality, 0.0, 0.0);
                candidate.contrast = contrast;
                let rating = self.score_option(&candidate, fired)?.acr_rating;
                if best.as_ref().map_or(true, |(_, b)| rating > *b) {
                    best = Some((candidate, rating));
                }
            }
        }

        let best_rating = best.as_ref().map(|(_, rating)| *rating);
        debug!(best = ?best_rating, "best imaging rating for no-imaging");

        let mut applied_rules = Vec::new();
        let (acr_rating, rationale) = match &best {
            Some((candidate, rating)) if *rating >= APPROPRIATE_THRESHOLD => {
                let indications: Vec<&Rule> = fired.iter().copied().filter(|r| r.warrants_imaging).collect();
                applied_rules = indications.iter().map(|r| r.id.clone()).collect();
                let rationale = if indications.is_empty() {
                    format!(
                        "No imaging: {} is rated {} for this presentation",
                        technique_label(candidate),
                        rating
                    )
                } else {
                    let fragments: Vec<&str> = indications.iter().map(|r| r.rationale.as_str()).collect();
                    format!("No imaging: imaging is indicated because {}", fragments.join("; "))
                };
                (MIN_ACR_RATING, rationale)
            }
            _ => (
                MAX_ACR_RATING,
                "No imaging: no imaging study reaches an appropriate rating; conservative management is appropriate"
                    .to_string(),
            ),
        };

        Ok(ScoringResult {
            imaging_option_id: option.id.clone(),
            modality: option.modality,
            acr_rating,
            rationale,
            is_optimal: false,
            applied_rules,
        })
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }
}

fn technique_label(option: &ImagingOption) -> String {
    if option.contrast {
        format!("{} with contrast", option.modality.display_name())
    } else {
        option.modality.display_name().to_string()
    }
}

/// Best first: higher rating, lower radiation, lower cost, earlier position.
fn compare_ranked(a: &Ranked, b: &Ranked) -> Ordering {
    b.result
        .acr_rating
        .cmp(&a.result.acr_rating)
        .then_with(|| a.radiation_msv.total_cmp(&b.radiation_msv))
        .then_with(|| a.cost_usd.total_cmp(&b.cost_usd))
        .then_with(|| a.position.cmp(&b.position))
}
