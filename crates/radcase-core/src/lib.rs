//! Radcase Core Library
//!
//! Imaging appropriateness decision engine for clinical teaching cases.
//!
//! # Architecture
//!
//! ```text
//! Case Repository → CaseRecord
//!                       │
//!                       ▼
//!        Validator (normalize, canonicalize red flags)
//!                       │
//!                       ▼
//!        Ranking Engine (rule table → 1–9 per option + no imaging)
//!                       │
//!                [ranking cache, keyed by case]
//!                       │
//!                       ▼
//!  ┌────────────── Session State Machine ──────────────┐
//!  │ start → hints / selection / ticks → submit        │
//!  │                                 │                 │
//!  │             Evaluation Coordinator + Scorer       │
//!  │                                 │                 │
//!  │                review / retry / close             │
//!  └─────────────────────────────────┬─────────────────┘
//!                                    │
//!                                    ▼
//!                         AttemptRecord → AttemptSink
//! ```
//!
//! # Core Principle
//!
//! **Ranking is pure.** The same presentation and catalog always produce the
//! same ordered ratings; sessions only read them.
//!
//! # Modules
//!
//! - [`models`]: Domain types (ClinicalInput, ImagingOption, ScoringResult, etc.)
//! - [`validator`]: Input validation and red-flag canonicalization
//! - [`ranking`]: Rule table, ranking engine and cache
//! - [`evaluation`]: Selection evaluation and better-choice comparison
//! - [`gamification`]: Points breakdown
//! - [`session`]: Session state machine
//! - [`repository`]: Case repository and attempt sink seams

#[macro_use]
pub mod models;

pub mod evaluation;
pub mod gamification;
pub mod ranking;
pub mod repository;
pub mod session;
pub mod validator;

// Re-export commonly used types
pub use evaluation::{better_choice, evaluate, EvaluationContext};
pub use gamification::compute_points;
pub use models::{
    AttemptRecord, BetterChoice, CaseRecord, ClinicalInput, EvaluationResult, ImagingOption,
    Modality, PointsBreakdown, RatingCategory, ScoringResult, SessionMode,
};
pub use ranking::{RankingCache, RankingEngine, RankingError, RuleTable};
pub use repository::{AttemptSink, CaseRepository, InMemoryAttemptSink, InMemoryCaseRepository};
pub use session::{Denial, Learner, SessionConfig, SessionMachine, SubmissionReport, TickOutcome};
pub use validator::{InputError, Validator};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum RadcaseError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ranking error: {0}")]
    Ranking(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation denied: {0}")]
    Denied(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<InputError> for RadcaseError {
    fn from(e: InputError) -> Self {
        RadcaseError::InvalidInput(e.to_string())
    }
}

impl From<RankingError> for RadcaseError {
    fn from(e: RankingError) -> Self {
        match e {
            RankingError::Input(input) => input.into(),
            RankingError::Json(json) => json.into(),
            other => RadcaseError::Ranking(other.to_string()),
        }
    }
}

impl From<repository::RepositoryError> for RadcaseError {
    fn from(e: repository::RepositoryError) -> Self {
        match e {
            repository::RepositoryError::NotFound(id) => RadcaseError::NotFound(id),
            repository::RepositoryError::Json(json) => json.into(),
        }
    }
}

impl From<Denial> for RadcaseError {
    fn from(e: Denial) -> Self {
        RadcaseError::Denied(e.to_string())
    }
}

impl From<serde_json::Error> for RadcaseError {
    fn from(e: serde_json::Error) -> Self {
        RadcaseError::Serialization(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RadcaseError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        RadcaseError::Lock(format!("Lock poisoned: {}", e))
    }
}

/// Parse a wire name into an enum.
fn parse<T: FromStr<Err = String>>(value: &str) -> Result<T, RadcaseError> {
    value.parse().map_err(RadcaseError::InvalidInput)
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Create a core with the built-in rule table.
#[uniffi::export]
pub fn new_core() -> Arc<RadcaseCore> {
    Arc::new(RadcaseCore::with_engine(RankingEngine::default()))
}

/// Create a core with a rule table loaded from JSON.
#[uniffi::export]
pub fn new_core_with_rules(rules_json: String) -> Result<Arc<RadcaseCore>, RadcaseError> {
    let rules = RuleTable::from_json(&rules_json)?;
    Ok(Arc::new(RadcaseCore::with_engine(RankingEngine::new(rules))))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine, case store and attempt log for FFI.
#[derive(uniffi::Object)]
pub struct RadcaseCore {
    engine: Arc<RankingEngine>,
    cases: Arc<Mutex<InMemoryCaseRepository>>,
    cache: Arc<Mutex<RankingCache>>,
    attempts: Arc<InMemoryAttemptSink>,
    config: SessionConfig,
}

impl RadcaseCore {
    fn with_engine(engine: RankingEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            cases: Arc::new(Mutex::new(InMemoryCaseRepository::new())),
            cache: Arc::new(Mutex::new(RankingCache::new())),
            attempts: Arc::new(InMemoryAttemptSink::new()),
            config: SessionConfig::default(),
        }
    }
}

#[uniffi::export]
impl RadcaseCore {
    // =========================================================================
    // Case Operations
    // =========================================================================

    /// Add or replace a case from its JSON payload. Returns the case id.
    pub fn add_case_json(&self, json: String) -> Result<String, RadcaseError> {
        let mut cases = self.cases.lock()?;
        let case_id = cases.insert_json(&json)?;
        self.cache.lock()?.invalidate(&case_id);
        Ok(case_id)
    }

    /// Ranking for a stored case.
    pub fn rank_case(&self, case_id: String) -> Result<Vec<FfiScoringResult>, RadcaseError> {
        let case = self.cases.lock()?.get_case(&case_id)?;
        let mut cache = self.cache.lock()?;
        let ranking = cache.get_or_rank(
            &case.case_id,
            &self.engine,
            &case.clinical_input,
            &case.imaging_catalog,
        )?;
        Ok(ranking.iter().cloned().map(Into::into).collect())
    }

    // =========================================================================
    // Stateless Operations
    // =========================================================================

    /// Rank imaging options for a presentation.
    pub fn rank(
        &self,
        input: FfiClinicalInput,
        catalog: Vec<FfiImagingOption>,
    ) -> Result<Vec<FfiScoringResult>, RadcaseError> {
        let input = ClinicalInput::try_from(input)?;
        let catalog = catalog
            .into_iter()
            .map(ImagingOption::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ranking = self.engine.rank(&input, &catalog)?;
        Ok(ranking.into_iter().map(Into::into).collect())
    }

    /// Evaluate a selection against a ranking.
    pub fn evaluate(
        &self,
        selection: Vec<String>,
        ranking: Vec<FfiScoringResult>,
        mode: String,
        hints_used: u32,
    ) -> Result<FfiEvaluationResult, RadcaseError> {
        let mode: SessionMode = parse(&mode)?;
        let ranking = ranking
            .into_iter()
            .map(ScoringResult::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let selection: BTreeSet<String> = selection.into_iter().collect();
        let context = match mode {
            SessionMode::Learning => EvaluationContext::learning(hints_used),
            SessionMode::Quiz => EvaluationContext::quiz(),
        };
        Ok(evaluate(&selection, &ranking, context).into())
    }

    /// Points for a submission.
    pub fn compute_points(
        &self,
        effective_acr_rating: u8,
        current_streak_days: u32,
        time_spent_seconds: u64,
        hints_used: u32,
    ) -> FfiPointsBreakdown {
        compute_points(
            effective_acr_rating,
            current_streak_days,
            time_spent_seconds,
            hints_used,
        )
        .into()
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Open a session on a stored case.
    pub fn open_session(
        &self,
        case_id: String,
        user_id: String,
        streak_days: u32,
        mode: String,
    ) -> Result<Arc<CaseSession>, RadcaseError> {
        let mode: SessionMode = parse(&mode)?;
        let case = self.cases.lock()?.get_case(&case_id)?;
        let mut cache = self.cache.lock()?;
        let machine = SessionMachine::open_cached(
            &case,
            &self.engine,
            &mut cache,
            Learner::new(user_id, streak_days),
            mode,
            self.config,
        )?
        .with_sink(self.attempts.clone());

        Ok(Arc::new(CaseSession {
            machine: Arc::new(Mutex::new(machine)),
        }))
    }

    /// Attempts recorded by sessions opened on this core, oldest first.
    pub fn recorded_attempts(&self) -> Vec<FfiAttemptRecord> {
        self.attempts.attempts().into_iter().map(Into::into).collect()
    }
}

/// Thread-safe session wrapper for FFI.
#[derive(uniffi::Object)]
pub struct CaseSession {
    machine: Arc<Mutex<SessionMachine>>,
}

#[uniffi::export]
impl CaseSession {
    pub fn start(&self) -> Result<(), RadcaseError> {
        Ok(self.machine.lock()?.start()?)
    }

    pub fn set_mode(&self, mode: String) -> Result<(), RadcaseError> {
        let mode: SessionMode = parse(&mode)?;
        Ok(self.machine.lock()?.set_mode(mode)?)
    }

    /// Reveal a hint and return its text.
    pub fn reveal_hint(&self, index: u32) -> Result<String, RadcaseError> {
        Ok(self.machine.lock()?.reveal_hint(index)?)
    }

    /// Toggle an option; returns the new selection.
    pub fn update_selection(&self, option_id: String) -> Result<Vec<String>, RadcaseError> {
        let mut machine = self.machine.lock()?;
        let selection = machine.update_selection(&option_id)?;
        Ok(selection.iter().cloned().collect())
    }

    pub fn tick(&self) -> Result<FfiTickOutcome, RadcaseError> {
        Ok(self.machine.lock()?.tick().into())
    }

    pub fn submit(&self) -> Result<FfiSubmissionReport, RadcaseError> {
        Ok(self.machine.lock()?.submit()?.into())
    }

    pub fn review(&self) -> Result<(), RadcaseError> {
        Ok(self.machine.lock()?.review()?)
    }

    pub fn retry(&self) -> Result<(), RadcaseError> {
        Ok(self.machine.lock()?.retry()?)
    }

    pub fn close(&self) -> Result<(), RadcaseError> {
        self.machine.lock()?.close();
        Ok(())
    }

    pub fn state(&self) -> Result<FfiSessionState, RadcaseError> {
        let machine = self.machine.lock()?;
        let state = machine.state();
        Ok(FfiSessionState {
            phase: state.phase.to_string(),
            mode: state.mode.to_string(),
            hints_revealed: state.hints_revealed,
            selection: state.selection.iter().cloned().collect(),
            elapsed_seconds: state.elapsed_seconds,
            quiz_remaining_seconds: state.quiz_remaining_seconds,
            attempt_number: state.attempt_number,
            can_retry: state.can_retry(),
            no_imaging_id: machine.no_imaging_id().to_string(),
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe clinical presentation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClinicalInput {
    pub age: i32,
    pub sex: Option<String>,
    pub chief_complaint: String,
    pub duration: String,
    pub severity: String,
    pub red_flags: Vec<String>,
    pub cancer_history: bool,
    pub immunocompromised: bool,
    pub recent_trauma: bool,
    pub neurologic_deficit: bool,
    pub progressive_symptoms: bool,
    pub prior_imaging: Vec<String>,
    pub labs_available: Vec<String>,
    pub physical_exam_findings: Vec<String>,
}

impl TryFrom<FfiClinicalInput> for ClinicalInput {
    type Error = RadcaseError;

    fn try_from(input: FfiClinicalInput) -> Result<Self, Self::Error> {
        Ok(ClinicalInput {
            age: input.age,
            sex: input.sex.as_deref().map(parse).transpose()?,
            chief_complaint: input.chief_complaint,
            duration: parse(&input.duration)?,
            severity: parse(&input.severity)?,
            red_flags: input.red_flags.into_iter().collect(),
            cancer_history: input.cancer_history,
            immunocompromised: input.immunocompromised,
            recent_trauma: input.recent_trauma,
            neurologic_deficit: input.neurologic_deficit,
            progressive_symptoms: input.progressive_symptoms,
            prior_imaging: input.prior_imaging,
            labs_available: input.labs_available,
            physical_exam_findings: input.physical_exam_findings,
        })
    }
}

/// FFI-safe imaging option.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImagingOption {
    pub id: String,
    pub name: String,
    pub modality: String,
    pub contrast: bool,
    pub cost_usd: f64,
    pub radiation_msv: f64,
}

impl TryFrom<FfiImagingOption> for ImagingOption {
    type Error = RadcaseError;

    fn try_from(option: FfiImagingOption) -> Result<Self, Self::Error> {
        Ok(ImagingOption {
            id: option.id,
            name: option.name,
            modality: parse(&option.modality)?,
            contrast: option.contrast,
            cost_usd: option.cost_usd,
            radiation_msv: option.radiation_msv,
        })
    }
}

/// FFI-safe scoring result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiScoringResult {
    pub imaging_option_id: String,
    pub modality: String,
    pub acr_rating: u8,
    pub rating_category: String,
    pub rationale: String,
    pub is_optimal: bool,
    pub applied_rules: Vec<String>,
}

impl From<ScoringResult> for FfiScoringResult {
    fn from(result: ScoringResult) -> Self {
        Self {
            rating_category: result.category().to_string(),
            imaging_option_id: result.imaging_option_id,
            modality: result.modality.to_string(),
            acr_rating: result.acr_rating,
            rationale: result.rationale,
            is_optimal: result.is_optimal,
            applied_rules: result.applied_rules,
        }
    }
}

impl TryFrom<FfiScoringResult> for ScoringResult {
    type Error = RadcaseError;

    fn try_from(result: FfiScoringResult) -> Result<Self, Self::Error> {
        Ok(ScoringResult {
            imaging_option_id: result.imaging_option_id,
            modality: parse(&result.modality)?,
            acr_rating: result.acr_rating,
            rationale: result.rationale,
            is_optimal: result.is_optimal,
            applied_rules: result.applied_rules,
        })
    }
}

/// FFI-safe evaluation result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEvaluationResult {
    pub selected_ids: Vec<String>,
    pub effective_acr_rating: u8,
    pub rating_category: String,
    pub is_correct: bool,
    pub score: u8,
    pub mode: String,
    pub hints_used: u32,
    pub optimal_imaging_id: Option<String>,
}

impl From<EvaluationResult> for FfiEvaluationResult {
    fn from(eval: EvaluationResult) -> Self {
        Self {
            selected_ids: eval.selected_ids.into_iter().collect(),
            effective_acr_rating: eval.effective_acr_rating,
            rating_category: eval.rating_category.to_string(),
            is_correct: eval.is_correct,
            score: eval.score,
            mode: eval.mode.to_string(),
            hints_used: eval.hints_used,
            optimal_imaging_id: eval.optimal_imaging_id,
        }
    }
}

/// FFI-safe points breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct FfiPointsBreakdown {
    pub base: u32,
    pub streak_bonus: u32,
    pub speed_bonus: u32,
    pub no_hints_bonus: u32,
    pub total: u32,
}

impl From<PointsBreakdown> for FfiPointsBreakdown {
    fn from(points: PointsBreakdown) -> Self {
        Self {
            base: points.base,
            streak_bonus: points.streak_bonus,
            speed_bonus: points.speed_bonus,
            no_hints_bonus: points.no_hints_bonus,
            total: points.total,
        }
    }
}

/// FFI-safe better-choice comparison.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBetterChoice {
    pub imaging_option_id: String,
    pub name: String,
    pub acr_rating: u8,
    pub rationale: String,
    pub cost_delta_usd: f64,
    pub radiation_delta_msv: f64,
}

impl From<BetterChoice> for FfiBetterChoice {
    fn from(better: BetterChoice) -> Self {
        Self {
            imaging_option_id: better.imaging_option_id,
            name: better.name,
            acr_rating: better.acr_rating,
            rationale: better.rationale,
            cost_delta_usd: better.cost_delta_usd,
            radiation_delta_msv: better.radiation_delta_msv,
        }
    }
}

/// FFI-safe attempt record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAttemptRecord {
    pub attempt_id: String,
    pub case_id: String,
    pub user_id: String,
    pub attempt_number: u32,
    pub selection: Vec<String>,
    pub effective_acr_rating: u8,
    pub is_correct: bool,
    pub score: u8,
    pub points: FfiPointsBreakdown,
    pub mode: String,
    pub hints_used: u32,
    pub elapsed_seconds: u64,
    pub time_up: bool,
    pub timestamp: String,
}

impl From<AttemptRecord> for FfiAttemptRecord {
    fn from(attempt: AttemptRecord) -> Self {
        Self {
            attempt_id: attempt.attempt_id,
            case_id: attempt.case_id,
            user_id: attempt.user_id,
            attempt_number: attempt.attempt_number,
            selection: attempt.selection,
            effective_acr_rating: attempt.effective_acr_rating,
            is_correct: attempt.is_correct,
            score: attempt.score,
            points: attempt.points.into(),
            mode: attempt.mode.to_string(),
            hints_used: attempt.hints_used,
            elapsed_seconds: attempt.elapsed_seconds,
            time_up: attempt.time_up,
            timestamp: attempt.timestamp,
        }
    }
}

/// FFI-safe submission report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubmissionReport {
    pub evaluation: FfiEvaluationResult,
    pub points: FfiPointsBreakdown,
    pub better_choice: Option<FfiBetterChoice>,
    pub attempt: FfiAttemptRecord,
}

impl From<SubmissionReport> for FfiSubmissionReport {
    fn from(report: SubmissionReport) -> Self {
        Self {
            evaluation: report.evaluation.into(),
            points: report.points.into(),
            better_choice: report.better_choice.map(Into::into),
            attempt: report.attempt.into(),
        }
    }
}

/// FFI-safe tick outcome.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiTickOutcome {
    Idle,
    Running {
        elapsed_seconds: u64,
        remaining: Option<u64>,
    },
    TimeUp {
        report: FfiSubmissionReport,
    },
}

impl From<TickOutcome> for FfiTickOutcome {
    fn from(outcome: TickOutcome) -> Self {
        match outcome {
            TickOutcome::Idle => FfiTickOutcome::Idle,
            TickOutcome::Running {
                elapsed_seconds,
                remaining,
            } => FfiTickOutcome::Running {
                elapsed_seconds,
                remaining,
            },
            TickOutcome::TimeUp(report) => FfiTickOutcome::TimeUp {
                report: report.into(),
            },
        }
    }
}

/// FFI-safe session snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionState {
    pub phase: String,
    pub mode: String,
    pub hints_revealed: u32,
    pub selection: Vec<String>,
    pub elapsed_seconds: u64,
    pub quiz_remaining_seconds: Option<u64>,
    pub attempt_number: u32,
    pub can_retry: bool,
    pub no_imaging_id: String,
}
