//! Structured patient presentation models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Patient sex as recorded in the case vignette.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// How long the presenting symptoms have been present.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SymptomDuration {
    /// Under ~4 weeks
    Acute,
    /// ~4 to 12 weeks
    Subacute,
    /// Over ~12 weeks
    Chronic,
}

/// Clinical severity of the presentation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

/// A structured patient presentation, as loaded from the case repository.
///
/// `sex` is optional only so that a missing value can be reported by the
/// validator instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalInput {
    /// Age in years (validated to be non-negative)
    pub age: i32,
    /// Patient sex (required)
    pub sex: Option<Sex>,
    /// Chief complaint, e.g. "low back pain"
    pub chief_complaint: String,
    /// Symptom duration bucket
    pub duration: SymptomDuration,
    /// Severity bucket
    pub severity: Severity,
    /// Red-flag findings (may be empty)
    #[serde(default)]
    pub red_flags: BTreeSet<String>,
    /// History of malignancy
    #[serde(default)]
    pub cancer_history: bool,
    /// Immunocompromised host
    #[serde(default)]
    pub immunocompromised: bool,
    /// Recent trauma
    #[serde(default)]
    pub recent_trauma: bool,
    /// Focal neurologic deficit on exam
    #[serde(default)]
    pub neurologic_deficit: bool,
    /// Symptoms progressing despite treatment
    #[serde(default)]
    pub progressive_symptoms: bool,
    /// Imaging already performed, e.g. "xray"
    #[serde(default)]
    pub prior_imaging: Vec<String>,
    /// Laboratory results available, e.g. "elevated esr"
    #[serde(default)]
    pub labs_available: Vec<String>,
    /// Physical exam findings, e.g. "midline tenderness"
    #[serde(default)]
    pub physical_exam_findings: Vec<String>,
}

impl ClinicalInput {
    /// Create a presentation with required fields and no findings.
    pub fn new(
        age: i32,
        sex: Sex,
        chief_complaint: impl Into<String>,
        duration: SymptomDuration,
        severity: Severity,
    ) -> Self {
        Self {
            age,
            sex: Some(sex),
            chief_complaint: chief_complaint.into(),
            duration,
            severity,
            red_flags: BTreeSet::new(),
            cancer_history: false,
            immunocompromised: false,
            recent_trauma: false,
            neurologic_deficit: false,
            progressive_symptoms: false,
            prior_imaging: Vec::new(),
            labs_available: Vec::new(),
            physical_exam_findings: Vec::new(),
        }
    }

    /// Add a red flag (builder style).
    pub fn with_red_flag(mut self, flag: impl Into<String>) -> Self {
        self.red_flags.insert(flag.into());
        self
    }

    pub fn has_red_flag(&self, flag: &str) -> bool {
        self.red_flags.contains(flag)
    }

    pub fn has_lab(&self, lab: &str) -> bool {
        self.labs_available.iter().any(|l| l == lab)
    }

    pub fn has_exam_finding(&self, finding: &str) -> bool {
        self.physical_exam_findings.iter().any(|f| f == finding)
    }

    pub fn has_prior_imaging(&self, study: &str) -> bool {
        self.prior_imaging.iter().any(|p| p == study)
    }
}

impl_str_enum!(Sex { Male => "male", Female => "female", Other => "other" });
impl_str_enum!(SymptomDuration { Acute => "acute", Subacute => "subacute", Chronic => "chronic" });
impl_str_enum!(Severity { Mild => "mild", Moderate => "moderate", Severe => "severe" });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enums() {
        assert_eq!("Female".parse::<Sex>(), Ok(Sex::Female));
        assert_eq!(" chronic ".parse::<SymptomDuration>(), Ok(SymptomDuration::Chronic));
        assert_eq!("severe".parse::<Severity>(), Ok(Severity::Severe));
        assert!("sideways".parse::<Severity>().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{
            "age": 42,
            "sex": "male",
            "chief_complaint": "low back pain",
            "duration": "acute",
            "severity": "mild"
        }"#;
        let input: ClinicalInput = serde_json::from_str(json).unwrap();

        assert_eq!(input.sex, Some(Sex::Male));
        assert!(input.red_flags.is_empty());
        assert!(!input.cancer_history);
        assert!(input.prior_imaging.is_empty());
    }

    #[test]
    fn test_missing_sex_deserializes_as_none() {
        let json = r#"{
            "age": 42,
            "chief_complaint": "headache",
            "duration": "acute",
            "severity": "mild"
        }"#;
        let input: ClinicalInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.sex, None);
    }
}
