//! "Better choice" comparison shown after a non-optimal submission.

use std::collections::BTreeSet;

use crate::models::{BetterChoice, ImagingOption, ScoringResult};

use super::is_no_imaging_id;

/// Find a catalog option, falling back to the synthetic no-imaging option.
fn lookup<'a>(
    id: &str,
    catalog: &'a [ImagingOption],
    ranking: &[ScoringResult],
    synthetic: &'a ImagingOption,
) -> Option<&'a ImagingOption> {
    catalog
        .iter()
        .find(|o| o.id == id)
        .or_else(|| is_no_imaging_id(id, ranking).then_some(synthetic))
}

/// The result the selection is credited with, if any.
fn credited<'a>(selection: &BTreeSet<String>, ranking: &'a [ScoringResult]) -> Option<&'a ScoringResult> {
    if selection.iter().any(|id| is_no_imaging_id(id, ranking)) {
        return ranking.iter().find(|r| r.is_no_imaging());
    }

    // Ranking is ordered best first, so the first hit is the best selected
    ranking
        .iter()
        .find(|r| selection.contains(&r.imaging_option_id))
}

/// Compare the selection with the optimal option.
///
/// Returns `None` when the selection is credited with the optimal option or the
/// ranking is empty. An empty selection is compared as if nothing was ordered.
pub fn better_choice(
    selection: &BTreeSet<String>,
    ranking: &[ScoringResult],
    catalog: &[ImagingOption],
) -> Option<BetterChoice> {
    let optimal = ranking.iter().find(|r| r.is_optimal)?;
    let chosen = credited(selection, ranking);

    if chosen.map(|c| c.imaging_option_id == optimal.imaging_option_id) == Some(true) {
        return None;
    }

    let synthetic = ImagingOption::no_imaging();
    let optimal_option = lookup(&optimal.imaging_option_id, catalog, ranking, &synthetic)?;
    let (chosen_cost, chosen_radiation) = chosen
        .and_then(|c| lookup(&c.imaging_option_id, catalog, ranking, &synthetic))
        .map(|o| (o.cost_usd, o.radiation_msv))
        .unwrap_or((0.0, 0.0));

    let name = if optimal_option.name.is_empty() {
        optimal.modality.display_name().to_string()
    } else {
        optimal_option.name.clone()
    };

    Some(BetterChoice {
        imaging_option_id: optimal.imaging_option_id.clone(),
        name,
        acr_rating: optimal.acr_rating,
        rationale: optimal.rationale.clone(),
        cost_delta_usd: chosen_cost - optimal_option.cost_usd,
        radiation_delta_msv: chosen_radiation - optimal_option.radiation_msv,
    })
}
