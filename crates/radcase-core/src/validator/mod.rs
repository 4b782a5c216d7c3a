//! Clinical input validation.
//!
//! Runs before ranking: rejects malformed presentations and catalogs, and
//! returns a normalized copy of the presentation so that rule predicates can
//! match on canonical strings.

mod red_flags;

pub use red_flags::*;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ClinicalInput, ImagingOption, Modality, NO_IMAGING_ID};

/// Input errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Age must be non-negative, got {0}")]
    NegativeAge(i32),

    #[error("Patient sex is required")]
    MissingSex,

    #[error("Imaging catalog is empty")]
    EmptyCatalog,

    #[error("Duplicate imaging option id: {0}")]
    DuplicateOption(String),

    #[error("Invalid imaging option {id}: {reason}")]
    InvalidOption { id: String, reason: String },
}

pub type InputResult<T> = Result<T, InputError>;

/// Validator for presentations and imaging catalogs.
#[derive(Default)]
pub struct Validator {
    red_flags: RedFlagNormalizer,
}

impl Validator {
    /// Create a validator that canonicalizes red flags onto `vocabulary`.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            red_flags: RedFlagNormalizer::new(vocabulary),
        }
    }

    /// Validate a presentation and return its normalized form.
    pub fn validate(&self, input: &ClinicalInput) -> InputResult<ClinicalInput> {
        if input.age < 0 {
            return Err(InputError::NegativeAge(input.age));
        }
        if input.sex.is_none() {
            return Err(InputError::MissingSex);
        }

        let mut normalized = input.clone();
        normalized.chief_complaint = clean_text(&input.chief_complaint);

        normalized.red_flags = input
            .red_flags
            .iter()
            .filter(|raw| !clean_text(raw).is_empty())
            .map(|raw| {
                let matched = self.red_flags.canonicalize(raw);
                match &matched {
                    FlagMatch::Unrecognized(flag) => {
                        warn!(flag = %flag, "unrecognized red flag kept verbatim")
                    }
                    FlagMatch::Fuzzy(flag, score) => {
                        debug!(raw = %raw, flag = %flag, score, "red flag spelling corrected")
                    }
                    _ => {}
                }
                matched.canonical().to_string()
            })
            .collect();

        normalized.prior_imaging = clean_list(&input.prior_imaging)
            .into_iter()
            .map(|study| canonical_study(&study))
            .collect();
        normalized.labs_available = clean_list(&input.labs_available);
        normalized.physical_exam_findings = clean_list(&input.physical_exam_findings);

        Ok(normalized)
    }

    /// Validate every option of a catalog. An empty catalog is accepted.
    ///
    /// The no-imaging id is reserved for the no-imaging option, and a catalog
    /// may supply at most one option with modality `none`.
    pub fn validate_catalog(&self, options: &[ImagingOption]) -> InputResult<()> {
        let mut seen = HashSet::new();
        let mut no_imaging: Option<&str> = None;

        for option in options {
            if option.id.trim().is_empty() {
                return Err(InputError::InvalidOption {
                    id: option.id.clone(),
                    reason: "id must not be empty".into(),
                });
            }
            if !seen.insert(option.id.as_str()) {
                return Err(InputError::DuplicateOption(option.id.clone()));
            }
            if option.is_no_imaging() {
                if let Some(first) = no_imaging {
                    return Err(InputError::InvalidOption {
                        id: option.id.clone(),
                        reason: format!("catalog already has a no-imaging option ({})", first),
                    });
                }
                no_imaging = Some(option.id.as_str());
            } else if option.id == NO_IMAGING_ID {
                return Err(InputError::InvalidOption {
                    id: option.id.clone(),
                    reason: format!("id {} is reserved for the no-imaging option", NO_IMAGING_ID),
                });
            }
            if !option.cost_usd.is_finite() || option.cost_usd < 0.0 {
                return Err(InputError::InvalidOption {
                    id: option.id.clone(),
                    reason: format!("cost must be non-negative, got {}", option.cost_usd),
                });
            }
            if !option.radiation_msv.is_finite() || option.radiation_msv < 0.0 {
                return Err(InputError::InvalidOption {
                    id: option.id.clone(),
                    reason: format!("radiation must be non-negative, got {}", option.radiation_msv),
                });
            }
            if option.is_no_imaging() && (option.cost_usd != 0.0 || option.radiation_msv != 0.0) {
                return Err(InputError::InvalidOption {
                    id: option.id.clone(),
                    reason: "no-imaging option must have zero cost and radiation".into(),
                });
            }
        }

        Ok(())
    }

    /// Validate a catalog that must offer at least one option.
    pub fn require_catalog(&self, options: &[ImagingOption]) -> InputResult<()> {
        if options.is_empty() {
            return Err(InputError::EmptyCatalog);
        }
        self.validate_catalog(options)
    }

    pub fn red_flags(&self) -> &RedFlagNormalizer {
        &self.red_flags
    }
}

/// Clean each entry and drop the empty ones.
fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| clean_text(s))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Rewrite a prior study's leading technique onto its wire name ("x-ray lumbar" → "xray lumbar").
fn canonical_study(study: &str) -> String {
    let (head, rest) = match study.split_once(' ') {
        Some((head, rest)) => (head, Some(rest)),
        None => (study, None),
    };
    let compact: String = head.chars().filter(|c| *c != '-').collect();

    match compact.parse::<Modality>() {
        Ok(modality) => match rest {
            Some(rest) => format!("{} {}", modality.as_str(), rest),
            None => modality.as_str().to_string(),
        },
        Err(_) => study.to_string(),
    }
}
