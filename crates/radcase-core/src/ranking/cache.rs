//! Per-case ranking cache.
//!
//! Rankings are pure, so they are memoized by case id. Each entry keeps the
//! SHA-256 fingerprint of the canonical JSON of its inputs; an edited case
//! (different presentation or catalog) misses and is re-ranked.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::{ClinicalInput, ImagingOption, ScoringResult};

use super::{RankingEngine, RankingResult};

#[derive(Serialize)]
struct FingerprintPayload<'a> {
    clinical_input: &'a ClinicalInput,
    imaging_catalog: &'a [ImagingOption],
}

/// Hex SHA-256 of a ranking's inputs.
pub fn fingerprint(input: &ClinicalInput, catalog: &[ImagingOption]) -> RankingResult<String> {
    let payload = serde_json::to_vec(&FingerprintPayload {
        clinical_input: input,
        imaging_catalog: catalog,
    })?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

struct CacheEntry {
    fingerprint: String,
    ranking: Arc<Vec<ScoringResult>>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Memoized rankings keyed by case id.
#[derive(Default)]
pub struct RankingCache {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl RankingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached ranking for a case, ranking it on a miss.
    ///
    /// Errors are not cached.
    pub fn get_or_rank(
        &mut self,
        case_id: &str,
        engine: &RankingEngine,
        input: &ClinicalInput,
        catalog: &[ImagingOption],
    ) -> RankingResult<Arc<Vec<ScoringResult>>> {
        let fingerprint = fingerprint(input, catalog)?;

        if let Some(entry) = self.entries.get(case_id) {
            if entry.fingerprint == fingerprint {
                self.hits += 1;
                return Ok(Arc::clone(&entry.ranking));
            }
            debug!(case_id, "case changed since last ranking");
        }

        self.misses += 1;
        let ranking = Arc::new(engine.rank(input, catalog)?);
        self.entries.insert(
            case_id.to_string(),
            CacheEntry {
                fingerprint,
                ranking: Arc::clone(&ranking),
            },
        );

        Ok(ranking)
    }

    /// Drop one case from the cache.
    pub fn invalidate(&mut self, case_id: &str) -> bool {
        self.entries.remove(case_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Modality, Severity, Sex, SymptomDuration};

    fn make_input() -> ClinicalInput {
        ClinicalInput::new(60, Sex::Male, "headache", SymptomDuration::Acute, Severity::Severe)
    }

    fn make_catalog() -> Vec<ImagingOption> {
        vec![
            ImagingOption::new("ct-head", Modality::Ct, 500.0, 2.0),
            ImagingOption::new("mri-brain", Modality::Mri, 1400.0, 0.0),
        ]
    }

    #[test]
    fn test_fingerprint_tracks_inputs() {
        let hash = fingerprint(&make_input(), &make_catalog()).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, fingerprint(&make_input(), &make_catalog()).unwrap());

        let mut catalog = make_catalog();
        catalog[0].cost_usd = 450.0;
        assert_ne!(hash, fingerprint(&make_input(), &catalog).unwrap());
    }

    #[test]
    fn test_hit_after_miss() {
        let engine = RankingEngine::default();
        let mut cache = RankingCache::new();

        let first = cache.get_or_rank("case-1", &engine, &make_input(), &make_catalog()).unwrap();
        let second = cache.get_or_rank("case-1", &engine, &make_input(), &make_catalog()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_changed_case_is_reranked() {
        let engine = RankingEngine::default();
        let mut cache = RankingCache::new();

        let first = cache.get_or_rank("case-1", &engine, &make_input(), &make_catalog()).unwrap();

        let mut edited = make_input();
        edited.neurologic_deficit = true;
        let second = cache.get_or_rank("case-1", &engine, &edited, &make_catalog()).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_errors_not_cached() {
        let engine = RankingEngine::default();
        let mut cache = RankingCache::new();

        let mut bad = make_input();
        bad.age = -3;
        assert!(cache.get_or_rank("case-1", &engine, &bad, &make_catalog()).is_err());
        assert_eq!(cache.stats().entries, 0);

        assert!(cache.get_or_rank("case-1", &engine, &make_input(), &make_catalog()).is_ok());
        assert!(cache.invalidate("case-1"));
        assert!(!cache.invalidate("case-1"));
    }
}
