//! Seams to the case repository and attempt persistence.
//!
//! Storage itself lives outside the core. [`CaseRepository`] supplies cases and
//! [`AttemptSink`] receives attempt records without reporting back; the
//! in-memory implementations serve embedders and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use crate::models::{AttemptRecord, CaseRecord};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("case not found: {0}")]
    NotFound(String),

    #[error("invalid case payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Source of teaching cases.
pub trait CaseRepository: Send + Sync {
    fn get_case(&self, case_id: &str) -> RepositoryResult<CaseRecord>;
}

/// Receiver of submitted attempts. Fire-and-forget.
pub trait AttemptSink: Send + Sync {
    fn record(&self, attempt: &AttemptRecord);
}

/// Cases held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCaseRepository {
    cases: HashMap<String, CaseRecord>,
}

impl InMemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a case.
    pub fn insert(&mut self, case: CaseRecord) {
        self.cases.insert(case.case_id.clone(), case);
    }

    /// Parse and add a case from its JSON payload. Returns the case id.
    pub fn insert_json(&mut self, json: &str) -> RepositoryResult<String> {
        let case = CaseRecord::from_json(json)?;
        let case_id = case.case_id.clone();
        self.insert(case);
        Ok(case_id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl CaseRepository for InMemoryCaseRepository {
    fn get_case(&self, case_id: &str) -> RepositoryResult<CaseRecord> {
        self.cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(case_id.to_string()))
    }
}

/// Keeps every recorded attempt in memory.
#[derive(Debug, Default)]
pub struct InMemoryAttemptSink {
    attempts: Mutex<Vec<AttemptRecord>>,
}

impl InMemoryAttemptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded attempts, oldest first.
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        match self.attempts.lock() {
            Ok(attempts) => attempts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AttemptSink for InMemoryAttemptSink {
    fn record(&self, attempt: &AttemptRecord) {
        match self.attempts.lock() {
            Ok(mut attempts) => attempts.push(attempt.clone()),
            Err(_) => warn!(attempt_id = %attempt.attempt_id, "attempt sink lock poisoned, dropping attempt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE_JSON: &str = r#"{
        "case_id": "ha-001",
        "clinical_input": {
            "age": 45,
            "sex": "male",
            "chief_complaint": "headache",
            "duration": "acute",
            "severity": "severe"
        },
        "imaging_catalog": [
            {"id": "ct-head", "modality": "ct", "cost_usd": 500, "radiation_msv": 2}
        ],
        "hints": ["Consider the onset."]
    }"#;

    #[test]
    fn test_insert_and_get() {
        let mut repo = InMemoryCaseRepository::new();
        let case_id = repo.insert_json(CASE_JSON).unwrap();
        assert_eq!(case_id, "ha-001");
        assert_eq!(repo.len(), 1);

        let case = repo.get_case("ha-001").unwrap();
        assert_eq!(case.hints.len(), 1);
        assert_eq!(case.imaging_catalog[0].id, "ct-head");
    }

    #[test]
    fn test_missing_case() {
        let repo = InMemoryCaseRepository::new();
        assert!(repo.is_empty());
        let err = repo.get_case("nope").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(ref id) if id == "nope"));
    }

    #[test]
    fn test_malformed_payload() {
        let mut repo = InMemoryCaseRepository::new();
        assert!(matches!(
            repo.insert_json("{\"case_id\": 3}"),
            Err(RepositoryError::Json(_))
        ));
    }
}
