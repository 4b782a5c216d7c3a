//! Session state and its transition function.
//!
//! [`reduce`] is pure: it takes the current state and an event and returns
//! either the next state plus the side effect the driver must perform, or a
//! [`Denial`]. A denied event leaves the caller's state untouched.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SessionMode;

/// Default number of hints a learner may reveal.
pub const DEFAULT_MAX_HINTS: u32 = 3;

/// Default quiz countdown.
pub const DEFAULT_QUIZ_DURATION_SECONDS: u64 = 300;

/// Session tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default = "default_max_hints")]
    pub max_hints: u32,
    #[serde(default = "default_quiz_duration")]
    pub quiz_duration_seconds: u64,
}

fn default_max_hints() -> u32 {
    DEFAULT_MAX_HINTS
}

fn default_quiz_duration() -> u64 {
    DEFAULT_QUIZ_DURATION_SECONDS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_hints: DEFAULT_MAX_HINTS,
            quiz_duration_seconds: DEFAULT_QUIZ_DURATION_SECONDS,
        }
    }
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Case opened, not yet started
    NotStarted,
    /// Learner is working on the case
    InProgress,
    /// Attempt submitted and evaluated
    Submitted,
    /// Learner is reading the explanation
    Reviewing,
    /// Learner left the case
    Closed,
}

impl_str_enum!(SessionPhase {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Submitted => "submitted",
    Reviewing => "reviewing",
    Closed => "closed",
});

/// Case facts the transitions check against.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseContext {
    pub config: SessionConfig,
    /// Hints the case provides
    pub hints_in_case: u32,
    /// Selectable option ids (the ranking's ids)
    pub option_ids: BTreeSet<String>,
    /// Id that means "no imaging"
    pub no_imaging_id: String,
}

impl CaseContext {
    /// Hints that can actually be revealed.
    pub fn hint_limit(&self) -> u32 {
        self.config.max_hints.min(self.hints_in_case)
    }
}

/// Per-attempt mutable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub mode: SessionMode,
    pub hints_revealed: u32,
    pub selection: BTreeSet<String>,
    pub elapsed_seconds: u64,
    /// Countdown, present only while a quiz timer exists
    pub quiz_remaining_seconds: Option<u64>,
    /// 1 for the first attempt
    pub attempt_number: u32,
    /// Correctness of the last submission, if any
    pub last_correct: Option<bool>,
}

impl SessionState {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            mode,
            hints_revealed: 0,
            selection: BTreeSet::new(),
            elapsed_seconds: 0,
            quiz_remaining_seconds: None,
            attempt_number: 1,
            last_correct: None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.phase, SessionPhase::Submitted | SessionPhase::Reviewing)
    }

    /// Whether `retry` would currently be accepted.
    pub fn can_retry(&self) -> bool {
        self.is_submitted() && self.mode == SessionMode::Learning && self.last_correct == Some(false)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    SetMode(SessionMode),
    /// Reveal the hint at this index
    RevealHint(u32),
    /// Toggle an option in the selection
    ToggleSelection(String),
    /// One logical second elapsed
    Tick,
    /// Manual submission
    Submit,
    Review,
    Retry,
    Close,
}

/// Side effect the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Evaluate and record the attempt
    Evaluate { time_up: bool },
}

/// Operations that can be denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Start,
    SetMode,
    RevealHint,
    UpdateSelection,
    Submit,
    Review,
    Retry,
}

impl_str_enum!(Operation {
    Start => "start",
    SetMode => "set_mode",
    RevealHint => "reveal_hint",
    UpdateSelection => "update_selection",
    Submit => "submit",
    Review => "review",
    Retry => "retry",
});

/// Why an operation was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotStarted,
    AlreadyStarted,
    AlreadySubmitted,
    NotSubmitted,
    SessionClosed,
    HintsUnavailableInQuiz,
    HintLimitReached,
    HintAlreadyRevealed,
    HintOutOfOrder,
    UnknownOption,
    RetryUnavailableInQuiz,
    /// The last attempt was correct
    RetryNotOffered,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DenialReason::NotStarted => "session has not started",
            DenialReason::AlreadyStarted => "session already started",
            DenialReason::AlreadySubmitted => "attempt already submitted",
            DenialReason::NotSubmitted => "attempt not submitted yet",
            DenialReason::SessionClosed => "session is closed",
            DenialReason::HintsUnavailableInQuiz => "hints are unavailable in quiz mode",
            DenialReason::HintLimitReached => "no more hints available",
            DenialReason::HintAlreadyRevealed => "hint already revealed",
            DenialReason::HintOutOfOrder => "earlier hints must be revealed first",
            DenialReason::UnknownOption => "option is not part of this case",
            DenialReason::RetryUnavailableInQuiz => "retry is unavailable in quiz mode",
            DenialReason::RetryNotOffered => "retry is not offered after a correct answer",
        };
        f.write_str(text)
    }
}

/// A rejected operation. The session is unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    #[error("{operation} not allowed: {reason}")]
    InvalidTransition {
        operation: Operation,
        reason: DenialReason,
    },

    #[error("cannot submit without a selection")]
    IncompleteSelection,
}

impl Denial {
    fn new(operation: Operation, reason: DenialReason) -> Self {
        Denial::InvalidTransition { operation, reason }
    }
}

pub type Transition = Result<(SessionState, Effect), Denial>;

/// Deny unless the learner is working on the case.
fn require_in_progress(state: &SessionState, operation: Operation) -> Result<(), Denial> {
    let reason = match state.phase {
        SessionPhase::InProgress => return Ok(()),
        SessionPhase::NotStarted => DenialReason::NotStarted,
        SessionPhase::Submitted | SessionPhase::Reviewing => DenialReason::AlreadySubmitted,
        SessionPhase::Closed => DenialReason::SessionClosed,
    };
    Err(Denial::new(operation, reason))
}

/// Countdown for a mode: the full duration in quiz mode, none otherwise.
fn countdown_for(mode: SessionMode, context: &CaseContext) -> Option<u64> {
    match mode {
        SessionMode::Quiz => Some(context.config.quiz_duration_seconds),
        SessionMode::Learning => None,
    }
}

/// Apply one event to a state.
pub fn reduce(state: &SessionState, event: &SessionEvent, context: &CaseContext) -> Transition {
    let mut next = state.clone();

    let effect = match event {
        SessionEvent::Start => {
            if state.phase != SessionPhase::NotStarted {
                let reason = match state.phase {
                    SessionPhase::Closed => DenialReason::SessionClosed,
                    _ => DenialReason::AlreadyStarted,
                };
                return Err(Denial::new(Operation::Start, reason));
            }
            next.phase = SessionPhase::InProgress;
            next.quiz_remaining_seconds = countdown_for(state.mode, context);
            Effect::None
        }

        SessionEvent::SetMode(mode) => {
            require_in_progress(state, Operation::SetMode)?;
            if *mode != state.mode {
                next.mode = *mode;
                next.hints_revealed = 0;
                next.quiz_remaining_seconds = countdown_for(*mode, context);
            }
            Effect::None
        }

        SessionEvent::RevealHint(index) => {
            require_in_progress(state, Operation::RevealHint)?;
            if state.mode == SessionMode::Quiz {
                return Err(Denial::new(Operation::RevealHint, DenialReason::HintsUnavailableInQuiz));
            }
            if *index >= context.hint_limit() {
                return Err(Denial::new(Operation::RevealHint, DenialReason::HintLimitReached));
            }
            if *index < state.hints_revealed {
                return Err(Denial::new(Operation::RevealHint, DenialReason::HintAlreadyRevealed));
            }
            if *index > state.hints_revealed {
                return Err(Denial::new(Operation::RevealHint, DenialReason::HintOutOfOrder));
            }
            next.hints_revealed += 1;
            Effect::None
        }

        SessionEvent::ToggleSelection(id) => {
            require_in_progress(state, Operation::UpdateSelection)?;
            if !context.option_ids.contains(id) {
                return Err(Denial::new(Operation::UpdateSelection, DenialReason::UnknownOption));
            }

            if *id == context.no_imaging_id {
                let only_no_imaging = state.selection.len() == 1 && state.selection.contains(id);
                next.selection.clear();
                if !only_no_imaging {
                    next.selection.insert(id.clone());
                }
            } else {
                next.selection.remove(&context.no_imaging_id);
                if !next.selection.remove(id) {
                    next.selection.insert(id.clone());
                }
            }
            Effect::None
        }

        SessionEvent::Tick => {
            if state.phase != SessionPhase::InProgress {
                return Ok((next, Effect::None));
            }
            next.elapsed_seconds += 1;
            match state.quiz_remaining_seconds {
                Some(remaining) => {
                    let remaining = remaining.saturating_sub(1);
                    next.quiz_remaining_seconds = Some(remaining);
                    if remaining == 0 {
                        next.phase = SessionPhase::Submitted;
                        Effect::Evaluate { time_up: true }
                    } else {
                        Effect::None
                    }
                }
                None => Effect::None,
            }
        }

        SessionEvent::Submit => {
            require_in_progress(state, Operation::Submit)?;
            if state.selection.is_empty() {
                return Err(Denial::IncompleteSelection);
            }
            next.phase = SessionPhase::Submitted;
            Effect::Evaluate { time_up: false }
        }

        SessionEvent::Review => {
            if state.phase != SessionPhase::Submitted {
                let reason = match state.phase {
                    SessionPhase::Closed => DenialReason::SessionClosed,
                    SessionPhase::Reviewing => DenialReason::AlreadySubmitted,
                    _ => DenialReason::NotSubmitted,
                };
                return Err(Denial::new(Operation::Review, reason));
            }
            next.phase = SessionPhase::Reviewing;
            Effect::None
        }

        SessionEvent::Retry => {
            if !state.is_submitted() {
                let reason = match state.phase {
                    SessionPhase::Closed => DenialReason::SessionClosed,
                    _ => DenialReason::NotSubmitted,
                };
                return Err(Denial::new(Operation::Retry, reason));
            }
            if state.mode == SessionMode::Quiz {
                return Err(Denial::new(Operation::Retry, DenialReason::RetryUnavailableInQuiz));
            }
            if state.last_correct != Some(false) {
                return Err(Denial::new(Operation::Retry, DenialReason::RetryNotOffered));
            }
            next.phase = SessionPhase::InProgress;
            next.selection.clear();
            next.hints_revealed = 0;
            next.elapsed_seconds = 0;
            next.quiz_remaining_seconds = countdown_for(state.mode, context);
            next.attempt_number += 1;
            next.last_correct = None;
            Effect::None
        }

        SessionEvent::Close => {
            next.phase = SessionPhase::Closed;
            next.quiz_remaining_seconds = None;
            Effect::None
        }
    };

    Ok((next, effect))
}
