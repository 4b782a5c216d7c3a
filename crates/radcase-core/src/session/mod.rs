//! Case session driver.
//!
//! Lifecycle:
//! 1. Open: rank the case (or reuse a cached ranking)
//! 2. Start, switch mode, reveal hints, toggle the selection
//! 3. Submit manually, or let the quiz countdown submit at zero
//! 4. Evaluate, award points, emit the attempt record
//! 5. Review, retry (learning mode, incorrect only) or close
//!
//! Transitions are decided by [`reduce`]; this module performs their effects.

mod clock;
mod state;

pub use clock::*;
pub use state::*;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::evaluation::{better_choice, evaluate, EvaluationContext};
use crate::gamification::compute_points;
use crate::models::{
    AttemptRecord, BetterChoice, CaseRecord, EvaluationResult, ImagingOption, PointsBreakdown,
    ScoringResult, SessionMode, NO_IMAGING_ID,
};
use crate::ranking::{RankingCache, RankingEngine, RankingResult};
use crate::repository::AttemptSink;

/// Who is working the case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    pub user_id: String,
    /// Consecutive active days, used for the streak bonus
    pub streak_days: u32,
}

impl Learner {
    pub fn new(user_id: impl Into<String>, streak_days: u32) -> Self {
        Self {
            user_id: user_id.into(),
            streak_days,
        }
    }
}

/// Everything produced by one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    pub evaluation: EvaluationResult,
    pub points: PointsBreakdown,
    /// Present when the selection was not credited with the optimal option
    pub better_choice: Option<BetterChoice>,
    pub attempt: AttemptRecord,
}

/// Result of one clock tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session not in progress; nothing happened
    Idle,
    /// Time advanced; `remaining` is the quiz countdown, if any
    Running {
        elapsed_seconds: u64,
        remaining: Option<u64>,
    },
    /// The countdown reached zero and the attempt was submitted
    TimeUp(SubmissionReport),
}

/// One learner working one case.
pub struct SessionMachine {
    case_id: String,
    learner: Learner,
    ranking: Arc<Vec<ScoringResult>>,
    catalog: Vec<ImagingOption>,
    hints: Vec<String>,
    context: CaseContext,
    state: SessionState,
    last_report: Option<SubmissionReport>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn AttemptSink>>,
}

impl SessionMachine {
    /// Open a session on a case, ranking it with `engine`.
    pub fn open(
        case: &CaseRecord,
        engine: &RankingEngine,
        learner: Learner,
        mode: SessionMode,
        config: SessionConfig,
    ) -> RankingResult<Self> {
        engine.validator().require_catalog(&case.imaging_catalog)?;
        let ranking = Arc::new(engine.rank(&case.clinical_input, &case.imaging_catalog)?);
        Ok(Self::with_ranking(case, ranking, learner, mode, config))
    }

    /// Open a session using the ranking cache.
    pub fn open_cached(
        case: &CaseRecord,
        engine: &RankingEngine,
        cache: &mut RankingCache,
        learner: Learner,
        mode: SessionMode,
        config: SessionConfig,
    ) -> RankingResult<Self> {
        engine.validator().require_catalog(&case.imaging_catalog)?;
        let ranking = cache.get_or_rank(
            &case.case_id,
            engine,
            &case.clinical_input,
            &case.imaging_catalog,
        )?;
        Ok(Self::with_ranking(case, ranking, learner, mode, config))
    }

    /// Open a session on an already computed ranking.
    pub fn with_ranking(
        case: &CaseRecord,
        ranking: Arc<Vec<ScoringResult>>,
        learner: Learner,
        mode: SessionMode,
        config: SessionConfig,
    ) -> Self {
        let no_imaging_id = ranking
            .iter()
            .find(|r| r.is_no_imaging())
            .map(|r| r.imaging_option_id.clone())
            .unwrap_or_else(|| NO_IMAGING_ID.to_string());

        let context = CaseContext {
            config,
            hints_in_case: case.hints.len() as u32,
            option_ids: ranking.iter().map(|r| r.imaging_option_id.clone()).collect(),
            no_imaging_id,
        };

        Self {
            case_id: case.case_id.clone(),
            learner,
            ranking,
            catalog: case.imaging_catalog.clone(),
            hints: case.hints.clone(),
            context,
            state: SessionState::new(mode),
            last_report: None,
            clock: Arc::new(SystemClock),
            sink: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ranking(&self) -> &[ScoringResult] {
        &self.ranking
    }

    /// Id that means "no imaging" in this session.
    pub fn no_imaging_id(&self) -> &str {
        &self.context.no_imaging_id
    }

    /// Hints revealed so far, in order.
    pub fn revealed_hints(&self) -> &[String] {
        let revealed = (self.state.hints_revealed as usize).min(self.hints.len());
        &self.hints[..revealed]
    }

    pub fn last_report(&self) -> Option<&SubmissionReport> {
        self.last_report.as_ref()
    }

    pub fn start(&mut self) -> Result<(), Denial> {
        self.apply(SessionEvent::Start).map(|_| ())
    }

    pub fn set_mode(&mut self, mode: SessionMode) -> Result<(), Denial> {
        self.apply(SessionEvent::SetMode(mode)).map(|_| ())
    }

    /// Reveal the hint at `index` and return its text.
    pub fn reveal_hint(&mut self, index: u32) -> Result<String, Denial> {
        self.apply(SessionEvent::RevealHint(index))?;
        Ok(self.hints.get(index as usize).cloned().unwrap_or_default())
    }

    /// Reveal the next hint in order.
    pub fn reveal_next_hint(&mut self) -> Result<String, Denial> {
        self.reveal_hint(self.state.hints_revealed)
    }

    /// Toggle an option and return the new selection.
    pub fn update_selection(&mut self, option_id: &str) -> Result<&BTreeSet<String>, Denial> {
        self.apply(SessionEvent::ToggleSelection(option_id.to_string()))?;
        Ok(&self.state.selection)
    }

    /// Advance the logical clock by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.phase != SessionPhase::InProgress {
            return TickOutcome::Idle;
        }

        match self.apply(SessionEvent::Tick) {
            Ok(Some(report)) => TickOutcome::TimeUp(report),
            Ok(None) => TickOutcome::Running {
                elapsed_seconds: self.state.elapsed_seconds,
                remaining: self.state.quiz_remaining_seconds,
            },
            Err(_) => TickOutcome::Idle,
        }
    }

    /// Submit the current selection.
    pub fn submit(&mut self) -> Result<SubmissionReport, Denial> {
        match self.apply(SessionEvent::Submit)? {
            Some(report) => Ok(report),
            // Submit always evaluates when accepted
            None => Err(Denial::IncompleteSelection),
        }
    }

    pub fn review(&mut self) -> Result<(), Denial> {
        self.apply(SessionEvent::Review).map(|_| ())
    }

    pub fn retry(&mut self) -> Result<(), Denial> {
        self.apply(SessionEvent::Retry)?;
        self.last_report = None;
        Ok(())
    }

    pub fn close(&mut self) {
        // Close is accepted from every phase
        let _ = self.apply(SessionEvent::Close);
    }

    /// Run an event through the reducer and perform its effect.
    fn apply(&mut self, event: SessionEvent) -> Result<Option<SubmissionReport>, Denial> {
        let (next, effect) = match reduce(&self.state, &event, &self.context) {
            Ok(transition) => transition,
            Err(denial) => {
                debug!(case_id = %self.case_id, ?event, %denial, "operation denied");
                return Err(denial);
            }
        };
        self.state = next;

        match effect {
            Effect::None => Ok(None),
            Effect::Evaluate { time_up } => Ok(Some(self.finish(time_up))),
        }
    }

    /// Evaluate the frozen selection, award points and emit the attempt.
    fn finish(&mut self, time_up: bool) -> SubmissionReport {
        let state = &self.state;
        let context = match state.mode {
            SessionMode::Learning => EvaluationContext::learning(state.hints_revealed),
            SessionMode::Quiz => EvaluationContext::quiz(),
        };

        let evaluation = evaluate(&state.selection, &self.ranking, context);
        let points = compute_points(
            evaluation.effective_acr_rating,
            self.learner.streak_days,
            state.elapsed_seconds,
            state.hints_revealed,
        );
        let better_choice = better_choice(&state.selection, &self.ranking, &self.catalog);

        let attempt = AttemptRecord::new(
            &self.case_id,
            &self.learner.user_id,
            state.attempt_number,
            &evaluation,
            points,
            state.elapsed_seconds,
            time_up,
            self.clock.now().to_rfc3339(),
        );

        info!(
            case_id = %self.case_id,
            user_id = %self.learner.user_id,
            attempt = attempt.attempt_number,
            rating = evaluation.effective_acr_rating,
            correct = evaluation.is_correct,
            score = evaluation.score,
            points = points.total,
            time_up,
            "attempt submitted"
        );

        if let Some(sink) = &self.sink {
            sink.record(&attempt);
            info!(attempt_id = %attempt.attempt_id, "attempt emitted");
        }

        self.state.last_correct = Some(evaluation.is_correct);
        let report = SubmissionReport {
            evaluation,
            points,
            better_choice,
            attempt,
        };
        self.last_report = Some(report.clone());
        report
    }
}
