//! Case records supplied by the case repository.

use serde::{Deserialize, Serialize};

use super::clinical::ClinicalInput;
use super::imaging::ImagingOption;

/// A teaching case: the presentation, the imaging catalog and its teaching material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    /// Unique case ID
    pub case_id: String,
    /// Structured presentation
    pub clinical_input: ClinicalInput,
    /// Imaging options offered to the learner
    pub imaging_catalog: Vec<ImagingOption>,
    /// Curated optimal option ids (for display; ranking is authoritative)
    #[serde(default)]
    pub optimal_imaging_ids: Vec<String>,
    /// Hints, revealed in order
    #[serde(default)]
    pub hints: Vec<String>,
    /// Post-submission explanation
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub teaching_points: Vec<String>,
}

impl CaseRecord {
    /// Parse a case from the repository's JSON payload.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a catalog option by id.
    pub fn option(&self, id: &str) -> Option<&ImagingOption> {
        self.imaging_catalog.iter().find(|o| o.id == id)
    }
}
