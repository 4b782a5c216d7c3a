//! End-to-end session scenarios.
//!
//! Cases are loaded from JSON the way the case repository delivers them.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use radcase_core::models::{SessionMode, NO_IMAGING_ID};
use radcase_core::repository::{CaseRepository, InMemoryAttemptSink, InMemoryCaseRepository};
use radcase_core::session::{
    Denial, DenialReason, FixedClock, Learner, Operation, SessionConfig, SessionMachine,
    SessionPhase, TickOutcome,
};
use radcase_core::RankingEngine;

const SPINE_CASE: &str = r#"{
    "case_id": "lbp-042",
    "clinical_input": {
        "age": 35,
        "sex": "female",
        "chief_complaint": "Low back pain with leg weakness",
        "duration": "acute",
        "severity": "mild",
        "cancer_history": true,
        "neurologic_deficit": true,
        "progressive_symptoms": true
    },
    "imaging_catalog": [
        {"id": "xray-ls", "name": "Radiographs lumbar spine", "modality": "xray", "cost_usd": 120, "radiation_msv": 1.5},
        {"id": "ct-ls", "name": "CT lumbar spine", "modality": "ct", "cost_usd": 600, "radiation_msv": 7},
        {"id": "mri-ls-c", "name": "MRI lumbar spine with contrast", "modality": "mri", "contrast": true, "cost_usd": 1500, "radiation_msv": 0}
    ],
    "optimal_imaging_ids": ["mri-ls-c"],
    "hints": [
        "Weakness is a neurologic deficit.",
        "Consider the oncologic history.",
        "Which study shows marrow and cord best?",
        "A fourth hint beyond the cap."
    ],
    "explanation": "Neurologic deficit with cancer history calls for contrast MRI."
}"#;

fn repository() -> InMemoryCaseRepository {
    let mut repo = InMemoryCaseRepository::new();
    repo.insert_json(SPINE_CASE).unwrap();
    repo
}

fn open(mode: SessionMode, streak_days: u32, sink: Arc<InMemoryAttemptSink>) -> SessionMachine {
    let case = repository().get_case("lbp-042").unwrap();
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 9, 14, 17, 45, 0).unwrap());
    SessionMachine::open(
        &case,
        &RankingEngine::default(),
        Learner::new("learner-7", streak_days),
        mode,
        SessionConfig::default(),
    )
    .unwrap()
    .with_clock(Arc::new(clock))
    .with_sink(sink)
}

#[test]
fn test_scenario_a_optimal_without_hints() {
    let sink = Arc::new(InMemoryAttemptSink::new());
    let mut session = open(SessionMode::Learning, 0, sink.clone());

    session.start().unwrap();
    session.update_selection("mri-ls-c").unwrap();
    let report = session.submit().unwrap();

    assert_eq!(report.evaluation.effective_acr_rating, 9);
    assert_eq!(report.evaluation.score, 100);
    assert!(report.evaluation.is_correct);
    assert_eq!(report.evaluation.rating_category.as_str(), "usually-appropriate");
    assert!(report.better_choice.is_none());

    let attempts = sink.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].case_id, "lbp-042");
    assert_eq!(attempts[0].user_id, "learner-7");
    assert_eq!(attempts[0].timestamp, "2024-09-14T17:45:00+00:00");
}

#[test]
fn test_scenario_b_two_hints() {
    let mut session = open(SessionMode::Learning, 0, Arc::new(InMemoryAttemptSink::new()));

    session.start().unwrap();
    session.reveal_hint(0).unwrap();
    session.reveal_hint(1).unwrap();
    session.update_selection("mri-ls-c").unwrap();
    let report = session.submit().unwrap();

    assert_eq!(report.evaluation.hints_used, 2);
    assert_eq!(report.evaluation.score, 90);
    assert_eq!(report.attempt.hints_used, 2);
}

#[test]
fn test_scenario_c_inappropriate_choice() {
    let mut session = open(SessionMode::Learning, 0, Arc::new(InMemoryAttemptSink::new()));

    session.start().unwrap();
    session.update_selection("xray-ls").unwrap();
    let report = session.submit().unwrap();

    assert!(report.evaluation.effective_acr_rating <= 3);
    assert!(!report.evaluation.is_correct);
    assert_eq!(report.evaluation.rating_category.as_str(), "usually-not-appropriate");

    let better = report.better_choice.unwrap();
    assert_eq!(better.imaging_option_id, "mri-ls-c");
    assert_eq!(better.name, "MRI lumbar spine with contrast");
    assert_eq!(better.cost_delta_usd, -1380.0);
    assert_eq!(better.radiation_delta_msv, 1.5);

    assert!(session.state().can_retry());
}

#[test]
fn test_scenario_d_points() {
    let mut session = open(SessionMode::Learning, 10, Arc::new(InMemoryAttemptSink::new()));

    session.start().unwrap();
    session.update_selection("mri-ls-c").unwrap();
    for _ in 0..90 {
        session.tick();
    }
    let report = session.submit().unwrap();

    assert_eq!(report.points.base, 90);
    assert_eq!(report.points.streak_bonus, 9);
    assert_eq!(report.points.speed_bonus, 9);
    assert_eq!(report.points.no_hints_bonus, 9);
    assert_eq!(report.points.total, 117);
    assert_eq!(report.attempt.points, report.points);
}

#[test]
fn test_scenario_e_quiz_countdown() {
    let sink = Arc::new(InMemoryAttemptSink::new());
    let mut session = open(SessionMode::Quiz, 0, sink.clone());
    session.start().unwrap();
    session.update_selection("ct-ls").unwrap();

    let mut time_up = 0;
    for tick in 1..=300u64 {
        match session.tick() {
            TickOutcome::Running { remaining, .. } => {
                assert_eq!(remaining, Some(300 - tick));
            }
            TickOutcome::TimeUp(report) => {
                time_up += 1;
                assert_eq!(tick, 300);
                assert!(report.attempt.time_up);
                assert_eq!(report.attempt.selection, vec!["ct-ls".to_string()]);
                assert_eq!(report.evaluation.mode, SessionMode::Quiz);
            }
            TickOutcome::Idle => panic!("tick {} was idle", tick),
        }
    }

    assert_eq!(time_up, 1);
    assert_eq!(session.tick(), TickOutcome::Idle);
    assert_eq!(session.state().phase, SessionPhase::Submitted);
    assert_eq!(sink.attempts().len(), 1);

    // Quiz attempts cannot be retried
    assert_eq!(
        session.retry().unwrap_err(),
        Denial::InvalidTransition {
            operation: Operation::Retry,
            reason: DenialReason::RetryUnavailableInQuiz,
        }
    );
}

#[test]
fn test_quiz_submission_with_empty_selection_at_time_up() {
    let sink = Arc::new(InMemoryAttemptSink::new());
    let mut session = open(SessionMode::Quiz, 0, sink.clone());
    session.start().unwrap();

    let outcome = (0..300).map(|_| session.tick()).last().unwrap();
    match outcome {
        TickOutcome::TimeUp(report) => {
            assert!(report.attempt.selection.is_empty());
            assert_eq!(report.evaluation.effective_acr_rating, 1);
        }
        other => panic!("expected time up, got {:?}", other),
    }
}

#[test]
fn test_retry_flow_records_two_attempts() {
    let sink = Arc::new(InMemoryAttemptSink::new());
    let mut session = open(SessionMode::Learning, 0, sink.clone());

    session.start().unwrap();
    session.update_selection(NO_IMAGING_ID).unwrap();
    assert!(!session.submit().unwrap().evaluation.is_correct);

    session.review().unwrap();
    session.retry().unwrap();
    session.update_selection("mri-ls-c").unwrap();
    assert!(session.submit().unwrap().evaluation.is_correct);

    let attempts = sink.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].attempt_number, 1);
    assert_eq!(attempts[1].attempt_number, 2);
    assert_ne!(attempts[0].attempt_id, attempts[1].attempt_id);
}

#[test]
fn test_hint_cap_is_three() {
    let mut session = open(SessionMode::Learning, 0, Arc::new(InMemoryAttemptSink::new()));
    session.start().unwrap();

    for _ in 0..3 {
        session.reveal_next_hint().unwrap();
    }
    assert_eq!(
        session.reveal_next_hint().unwrap_err(),
        Denial::InvalidTransition {
            operation: Operation::RevealHint,
            reason: DenialReason::HintLimitReached,
        }
    );
    assert_eq!(session.revealed_hints().len(), 3);
}

#[test]
fn test_switching_to_quiz_mid_case() {
    let mut session = open(SessionMode::Learning, 0, Arc::new(InMemoryAttemptSink::new()));
    session.start().unwrap();
    session.reveal_hint(0).unwrap();
    session.tick();

    session.set_mode(SessionMode::Quiz).unwrap();
    assert_eq!(session.state().hints_revealed, 0);
    assert_eq!(session.state().quiz_remaining_seconds, Some(300));
    assert!(session.reveal_hint(0).is_err());

    session.set_mode(SessionMode::Learning).unwrap();
    assert_eq!(session.state().quiz_remaining_seconds, None);
}

#[test]
fn test_attempt_serializes_to_json() {
    let mut session = open(SessionMode::Learning, 0, Arc::new(InMemoryAttemptSink::new()));
    session.start().unwrap();
    session.update_selection("ct-ls").unwrap();
    let report = session.submit().unwrap();

    let json = report.attempt.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["case_id"], "lbp-042");
    assert_eq!(value["mode"], "learning");
    assert_eq!(value["selection"][0], "ct-ls");
    assert_eq!(value["time_up"], false);
}
