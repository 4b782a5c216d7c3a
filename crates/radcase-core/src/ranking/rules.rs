//! Declarative appropriateness rule table.
//!
//! A rule is a predicate over a normalized [`ClinicalInput`], a list of rating
//! adjustments per modality, and the rationale fragment shown to the learner
//! when it applies. Rules never reference each other; adding one does not
//! change how the others evaluate.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{
    ClinicalInput, ImagingOption, Modality, Severity, Sex, SymptomDuration, MAX_ACR_RATING,
    MIN_ACR_RATING,
};

use super::{RankingError, RankingResult};

/// Largest single adjustment a rule may apply.
const MAX_ADJUSTMENT: i32 = 8;

/// A condition over a normalized presentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// A specific (canonical) red flag is present
    RedFlag(String),
    /// At least one red flag is present
    AnyRedFlag,
    Duration(SymptomDuration),
    Severity(Severity),
    CancerHistory,
    Immunocompromised,
    RecentTrauma,
    NeurologicDeficit,
    ProgressiveSymptoms,
    /// A prior study of this technique was performed
    PriorImaging(Modality),
    /// Any lab result is available
    AnyLabs,
    /// A specific lab result is available
    Lab(String),
    /// A specific physical exam finding is present
    ExamFinding(String),
    /// Age in years is at least this value
    AgeAtLeast(i32),
    /// Age in years is below this value
    AgeBelow(i32),
    Sex(Sex),
    /// Every inner predicate holds
    All(Vec<Predicate>),
    /// At least one inner predicate holds
    Any(Vec<Predicate>),
    /// The inner predicate does not hold
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against a normalized presentation.
    pub fn matches(&self, input: &ClinicalInput) -> bool {
        match self {
            Predicate::RedFlag(flag) => input.has_red_flag(flag),
            Predicate::AnyRedFlag => !input.red_flags.is_empty(),
            Predicate::Duration(d) => input.duration == *d,
            Predicate::Severity(s) => input.severity == *s,
            Predicate::CancerHistory => input.cancer_history,
            Predicate::Immunocompromised => input.immunocompromised,
            Predicate::RecentTrauma => input.recent_trauma,
            Predicate::NeurologicDeficit => input.neurologic_deficit,
            Predicate::ProgressiveSymptoms => input.progressive_symptoms,
            Predicate::PriorImaging(modality) => {
                let name = modality.as_str();
                input
                    .prior_imaging
                    .iter()
                    .any(|study| study == name || study.starts_with(&format!("{} ", name)))
            }
            Predicate::AnyLabs => !input.labs_available.is_empty(),
            Predicate::Lab(lab) => input.has_lab(lab),
            Predicate::ExamFinding(finding) => input.has_exam_finding(finding),
            Predicate::AgeAtLeast(age) => input.age >= *age,
            Predicate::AgeBelow(age) => input.age < *age,
            Predicate::Sex(sex) => input.sex == Some(*sex),
            Predicate::All(inner) => inner.iter().all(|p| p.matches(input)),
            Predicate::Any(inner) => inner.iter().any(|p| p.matches(input)),
            Predicate::Not(inner) => !inner.matches(input),
        }
    }

    /// Collect every red flag this predicate names.
    fn red_flags<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Predicate::RedFlag(flag) => {
                out.insert(flag.as_str());
            }
            Predicate::All(inner) | Predicate::Any(inner) => {
                inner.iter().for_each(|p| p.red_flags(out));
            }
            Predicate::Not(inner) => inner.red_flags(out),
            _ => {}
        }
    }
}

/// A rating change applied to matching options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adjustment {
    pub modality: Modality,
    /// Restrict to contrast (`true`) or non-contrast (`false`) studies
    #[serde(default)]
    pub contrast: Option<bool>,
    /// Signed rating change
    pub delta: i32,
}

impl Adjustment {
    pub fn new(modality: Modality, delta: i32) -> Self {
        Self {
            modality,
            contrast: None,
            delta,
        }
    }

    pub fn contrast(modality: Modality, delta: i32) -> Self {
        Self {
            modality,
            contrast: Some(true),
            delta,
        }
    }

    pub fn applies_to(&self, option: &ImagingOption) -> bool {
        self.modality == option.modality && self.contrast.map_or(true, |c| c == option.contrast)
    }
}

/// One clinical rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Stable identifier (reported in results)
    pub id: String,
    /// When the rule applies
    pub when: Predicate,
    /// Rating changes when it applies
    pub adjustments: Vec<Adjustment>,
    /// Rationale fragment shown to the learner
    pub rationale: String,
    /// Cited as an imaging indication in the no-imaging rationale
    #[serde(default)]
    pub warrants_imaging: bool,
}

impl Rule {
    pub fn new(id: &str, when: Predicate, rationale: &str) -> Self {
        Self {
            id: id.into(),
            when,
            adjustments: Vec::new(),
            rationale: rationale.into(),
            warrants_imaging: false,
        }
    }

    /// Add an adjustment (builder style).
    pub fn adjust(mut self, modality: Modality, delta: i32) -> Self {
        self.adjustments.push(Adjustment::new(modality, delta));
        self
    }

    /// Add an adjustment limited to contrast studies (builder style).
    pub fn adjust_contrast(mut self, modality: Modality, delta: i32) -> Self {
        self.adjustments.push(Adjustment::contrast(modality, delta));
        self
    }

    /// Cite the rule as an imaging indication (builder style).
    pub fn warrants_imaging(mut self) -> Self {
        self.warrants_imaging = true;
        self
    }

    /// Net change this rule applies to an option.
    pub fn delta_for(&self, option: &ImagingOption) -> i32 {
        self.adjustments
            .iter()
            .filter(|a| a.applies_to(option))
            .map(|a| a.delta)
            .sum()
    }
}

/// Baseline ratings plus the ordered rule list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleTable {
    /// Rating of each technique before any rule applies
    pub baselines: BTreeMap<Modality, i32>,
    pub rules: Vec<Rule>,
}

impl RuleTable {
    /// Load a table from JSON and check it.
    pub fn from_json(json: &str) -> RankingResult<Self> {
        let table: RuleTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn to_json(&self) -> RankingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency of the table.
    pub fn validate(&self) -> RankingResult<()> {
        for (modality, baseline) in &self.baselines {
            if *modality == Modality::NoImaging {
                return Err(invalid("baseline defined for \"none\"; no-imaging is rated separately"));
            }
            if !(MIN_ACR_RATING as i32..=MAX_ACR_RATING as i32).contains(baseline) {
                return Err(invalid(format!(
                    "baseline for {} out of range: {}",
                    modality, baseline
                )));
            }
        }

        let mut ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(invalid("rule with empty id"));
            }
            if !ids.insert(rule.id.as_str()) {
                return Err(invalid(format!("duplicate rule id: {}", rule.id)));
            }
            if rule.rationale.trim().is_empty() {
                return Err(invalid(format!("rule {} has an empty rationale", rule.id)));
            }
            if rule.adjustments.is_empty() && !rule.warrants_imaging {
                return Err(invalid(format!("rule {} has no effect", rule.id)));
            }
            for adjustment in &rule.adjustments {
                if adjustment.modality == Modality::NoImaging {
                    return Err(invalid(format!("rule {} adjusts \"none\"", rule.id)));
                }
                if adjustment.delta == 0 || adjustment.delta.abs() > MAX_ADJUSTMENT {
                    return Err(invalid(format!(
                        "rule {} has an invalid adjustment for {}: {}",
                        rule.id, adjustment.modality, adjustment.delta
                    )));
                }
            }
        }

        Ok(())
    }

    /// Baseline for a technique, failing when the table does not cover it.
    pub fn baseline(&self, modality: Modality) -> RankingResult<i32> {
        self.baselines
            .get(&modality)
            .copied()
            .ok_or_else(|| invalid(format!("no baseline rating for {}", modality)))
    }

    /// Every canonical red flag named by a rule.
    pub fn red_flag_vocabulary(&self) -> BTreeSet<String> {
        let mut flags = BTreeSet::new();
        for rule in &self.rules {
            rule.when.red_flags(&mut flags);
        }
        flags.into_iter().map(str::to_string).collect()
    }

    /// Add a rule (builder style).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

impl Default for RuleTable {
    /// Built-in table for adult and pediatric outpatient/ED presentations.
    fn default() -> Self {
        use Modality::*;

        let baselines = BTreeMap::from([
            (Xray, 4),
            (Ct, 3),
            (Mri, 3),
            (Ultrasound, 3),
            (Nuclear, 2),
            (Fluoroscopy, 2),
            (Mammography, 2),
            (Pet, 1),
        ]);

        let rules = vec![
            // Neurologic
            Rule::new(
                "neurologic-deficit",
                Predicate::NeurologicDeficit,
                "focal neurologic deficit favors MRI",
            )
            .adjust(Mri, 5)
            .adjust(Ct, 2)
            .warrants_imaging(),
            Rule::new(
                "progressive-symptoms",
                Predicate::ProgressiveSymptoms,
                "progressive symptoms warrant cross-sectional imaging",
            )
            .adjust(Mri, 2)
            .adjust(Ct, 1)
            .warrants_imaging(),
            Rule::new(
                "cauda-equina",
                Predicate::Any(vec![
                    Predicate::RedFlag("cauda equina".into()),
                    Predicate::RedFlag("saddle anesthesia".into()),
                    Predicate::RedFlag("bowel or bladder dysfunction".into()),
                ]),
                "suspected cauda equina syndrome requires emergent MRI",
            )
            .adjust(Mri, 5)
            .adjust(Xray, -2)
            .warrants_imaging(),
            Rule::new(
                "thunderclap-headache",
                Predicate::RedFlag("thunderclap headache".into()),
                "thunderclap headache requires non-contrast CT to exclude hemorrhage",
            )
            .adjust(Ct, 5)
            .adjust(Xray, -3)
            .warrants_imaging(),
            Rule::new(
                "papilledema",
                Predicate::RedFlag("papilledema".into()),
                "papilledema suggests raised intracranial pressure",
            )
            .adjust(Mri, 3)
            .adjust(Ct, 3)
            .warrants_imaging(),
            // Oncologic and infectious
            Rule::new(
                "cancer-history",
                Predicate::CancerHistory,
                "cancer history raises concern for metastasis, favoring contrast-enhanced imaging",
            )
            .adjust_contrast(Mri, 3)
            .adjust_contrast(Ct, 1)
            .adjust(Nuclear, 2)
            .adjust(Pet, 3)
            .warrants_imaging(),
            Rule::new(
                "unexplained-weight-loss",
                Predicate::RedFlag("unexplained weight loss".into()),
                "unexplained weight loss raises concern for malignancy",
            )
            .adjust(Mri, 1)
            .adjust(Ct, 1)
            .warrants_imaging(),
            Rule::new(
                "infection-risk",
                Predicate::Any(vec![
                    Predicate::Immunocompromised,
                    Predicate::RedFlag("fever".into()),
                    Predicate::RedFlag("intravenous drug use".into()),
                ]),
                "infection risk (fever, immunosuppression or IV drug use) favors contrast-enhanced MRI",
            )
            .adjust_contrast(Mri, 3)
            .adjust_contrast(Ct, 1)
            .warrants_imaging(),
            Rule::new(
                "inflammatory-markers",
                Predicate::Any(vec![
                    Predicate::Lab("elevated esr".into()),
                    Predicate::Lab("elevated crp".into()),
                ]),
                "elevated inflammatory markers support imaging for infection",
            )
            .adjust_contrast(Mri, 1)
            .warrants_imaging(),
            // Trauma
            Rule::new(
                "recent-trauma",
                Predicate::RecentTrauma,
                "recent trauma favors CT and radiographs to evaluate for fracture",
            )
            .adjust(Ct, 4)
            .adjust(Xray, 3)
            .warrants_imaging(),
            Rule::new(
                "fracture-risk-age",
                Predicate::All(vec![Predicate::RecentTrauma, Predicate::AgeAtLeast(65)]),
                "older age increases fracture risk after trauma",
            )
            .adjust(Ct, 1),
            Rule::new(
                "midline-tenderness",
                Predicate::ExamFinding("midline tenderness".into()),
                "focal midline tenderness supports radiographs",
            )
            .adjust(Xray, 1),
            // Masses
            Rule::new(
                "breast-mass",
                Predicate::RedFlag("palpable breast mass".into()),
                "palpable breast mass is evaluated with diagnostic mammography and ultrasound",
            )
            .adjust(Mammography, 7)
            .adjust(Ultrasound, 5)
            .warrants_imaging(),
            Rule::new(
                "breast-mass-young",
                Predicate::All(vec![
                    Predicate::RedFlag("palpable breast mass".into()),
                    Predicate::AgeBelow(30),
                ]),
                "under 30, ultrasound is the first study for a breast mass",
            )
            .adjust(Ultrasound, 2)
            .adjust(Mammography, -2),
            Rule::new(
                "pulsatile-abdominal-mass",
                Predicate::RedFlag("pulsatile abdominal mass".into()),
                "pulsatile abdominal mass is screened for aneurysm with ultrasound",
            )
            .adjust(Ultrasound, 6)
            .adjust(Ct, 2)
            .warrants_imaging(),
            Rule::new(
                "unclassified-red-flag",
                Predicate::AnyRedFlag,
                "red-flag findings favor imaging over watchful waiting",
            )
            .adjust(Mri, 1)
            .adjust(Ct, 1)
            .warrants_imaging(),
            // Presentation
            Rule::new(
                "severe-presentation",
                Predicate::Severity(Severity::Severe),
                "severe presentation favors cross-sectional imaging",
            )
            .adjust(Ct, 2)
            .adjust(Mri, 1)
            .warrants_imaging(),
            Rule::new(
                "uncomplicated-acute",
                Predicate::All(vec![
                    Predicate::Duration(SymptomDuration::Acute),
                    Predicate::Not(Box::new(Predicate::Severity(Severity::Severe))),
                ]),
                "uncomplicated acute symptoms usually resolve without imaging",
            )
            .adjust(Xray, -2)
            .adjust(Ct, -1)
            .adjust(Mri, -1),
            Rule::new(
                "chronic-symptoms",
                Predicate::Duration(SymptomDuration::Chronic),
                "chronic symptoms justify initial radiographs",
            )
            .adjust(Xray, 2)
            .adjust(Mri, 1),
            Rule::new(
                "prior-radiographs",
                Predicate::PriorImaging(Xray),
                "prior radiographs already obtained; advanced imaging is the next step",
            )
            .adjust(Xray, -2)
            .adjust(Mri, 1),
            // Radiation sensitivity
            Rule::new(
                "pediatric",
                Predicate::AgeBelow(18),
                "pediatric patients favor non-ionizing imaging",
            )
            .adjust(Ultrasound, 2)
            .adjust(Ct, -2)
            .adjust(Nuclear, -1)
            .adjust(Pet, -1),
            Rule::new(
                "reproductive-age-female",
                Predicate::All(vec![
                    Predicate::Sex(Sex::Female),
                    Predicate::AgeAtLeast(12),
                    Predicate::AgeBelow(50),
                ]),
                "reproductive-age female favors limiting pelvic radiation",
            )
            .adjust(Ultrasound, 1)
            .adjust(Fluoroscopy, -1),
        ];

        Self { baselines, rules }
    }
}

fn invalid(reason: impl Into<String>) -> RankingError {
    RankingError::InvalidRuleTable(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_input() -> ClinicalInput {
        ClinicalInput::new(45, Sex::Male, "back pain", SymptomDuration::Acute, Severity::Mild)
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = RuleTable::default();
        assert!(table.validate().is_ok());
        for modality in Modality::IMAGING {
            assert!(table.baseline(modality).is_ok(), "missing baseline for {}", modality);
        }
    }

    #[test]
    fn test_predicates() {
        let mut input = make_input().with_red_flag("fever");
        input.prior_imaging = vec!["xray lumbar".into()];
        input.labs_available = vec!["elevated esr".into()];

        assert!(Predicate::RedFlag("fever".into()).matches(&input));
        assert!(!Predicate::RedFlag("cauda equina".into()).matches(&input));
        assert!(Predicate::AnyRedFlag.matches(&input));
        assert!(Predicate::PriorImaging(Modality::Xray).matches(&input));
        assert!(!Predicate::PriorImaging(Modality::Mri).matches(&input));
        assert!(Predicate::Lab("elevated esr".into()).matches(&input));
        assert!(Predicate::AgeAtLeast(45).matches(&input));
        assert!(!Predicate::AgeBelow(45).matches(&input));
        assert!(Predicate::All(vec![Predicate::AnyLabs, Predicate::Sex(Sex::Male)]).matches(&input));
        assert!(Predicate::Not(Box::new(Predicate::CancerHistory)).matches(&input));
        assert!(!Predicate::Any(vec![]).matches(&input));
    }

    #[test]
    fn test_contrast_adjustment() {
        let rule = Rule::new("r", Predicate::CancerHistory, "x")
            .adjust_contrast(Modality::Mri, 2)
            .adjust(Modality::Mri, 1);

        let plain = ImagingOption::new("mri", Modality::Mri, 1000.0, 0.0);
        let contrast = ImagingOption::new("mri-c", Modality::Mri, 1500.0, 0.0).with_contrast();
        let ct = ImagingOption::new("ct", Modality::Ct, 500.0, 7.0);

        assert_eq!(rule.delta_for(&plain), 1);
        assert_eq!(rule.delta_for(&contrast), 3);
        assert_eq!(rule.delta_for(&ct), 0);
    }

    #[test]
    fn test_invalid_tables_rejected() {
        let dup = RuleTable::default()
            .with_rule(Rule::new("pediatric", Predicate::AnyLabs, "dup").adjust(Modality::Ct, 1));
        assert!(matches!(dup.validate(), Err(RankingError::InvalidRuleTable(_))));

        let empty_rationale =
            RuleTable::default().with_rule(Rule::new("new", Predicate::AnyLabs, " ").adjust(Modality::Ct, 1));
        assert!(empty_rationale.validate().is_err());

        let adjusts_none = RuleTable::default()
            .with_rule(Rule::new("new", Predicate::AnyLabs, "x").adjust(Modality::NoImaging, 1));
        assert!(adjusts_none.validate().is_err());

        let zero = RuleTable::default().with_rule(Rule::new("new", Predicate::AnyLabs, "x").adjust(Modality::Ct, 0));
        assert!(zero.validate().is_err());

        let mut bad_baseline = RuleTable::default();
        bad_baseline.baselines.insert(Modality::Ct, 12);
        assert!(bad_baseline.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_table() {
        let table = RuleTable::default();
        let json = table.to_json().unwrap();
        let loaded = RuleTable::from_json(&json).unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        assert!(matches!(RuleTable::from_json("{"), Err(RankingError::Json(_))));

        let missing_rationale = r#"{
            "baselines": {"xray": 4},
            "rules": [{"id": "r", "when": {"kind": "any_red_flag"}, "adjustments": [], "rationale": "", "warrants_imaging": true}]
        }"#;
        assert!(matches!(
            RuleTable::from_json(missing_rationale),
            Err(RankingError::InvalidRuleTable(_))
        ));
    }

    #[test]
    fn test_red_flag_vocabulary() {
        let vocab = RuleTable::default().red_flag_vocabulary();
        assert!(vocab.contains("cauda equina"));
        assert!(vocab.contains("saddle anesthesia"));
        assert!(vocab.contains("fever"));
        assert!(vocab.contains("palpable breast mass"));
    }
}
