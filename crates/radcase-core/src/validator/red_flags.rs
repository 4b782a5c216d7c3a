//! Red-flag canonicalization.
//!
//! Handles:
//! - Text cleanup (case, surrounding/internal whitespace, underscores)
//! - Synonym expansion (saddle anaesthesia→saddle anesthesia, febrile→fever)
//! - Typo correction against the rule vocabulary (fuzzy match)
//!
//! Flags that match nothing are kept as written so that no finding is lost.

use std::collections::{BTreeSet, HashMap};

use strsim::{jaro_winkler, normalized_levenshtein};

/// Minimum similarity for a typo to be corrected to a vocabulary entry.
const FUZZY_THRESHOLD: f64 = 0.90;

/// How a raw flag was mapped.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagMatch {
    /// Already in the vocabulary
    Exact(String),
    /// Known synonym
    Alias(String),
    /// Corrected spelling, with similarity
    Fuzzy(String, f64),
    /// Unknown flag, kept verbatim (cleaned)
    Unrecognized(String),
}

impl FlagMatch {
    pub fn canonical(&self) -> &str {
        match self {
            FlagMatch::Exact(s)
            | FlagMatch::Alias(s)
            | FlagMatch::Fuzzy(s, _)
            | FlagMatch::Unrecognized(s) => s,
        }
    }
}

/// Canonicalizer for red-flag strings.
pub struct RedFlagNormalizer {
    /// Canonical red flags the rule table understands
    vocabulary: BTreeSet<String>,
    /// Synonym map: cleaned synonym → canonical flag
    aliases: HashMap<String, String>,
}

impl Default for RedFlagNormalizer {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl RedFlagNormalizer {
    /// Create a normalizer for the given vocabulary, with default synonyms.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = Self::default_aliases();
        let mut vocab: BTreeSet<String> = vocabulary
            .into_iter()
            .map(|s| clean_text(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        vocab.extend(aliases.values().cloned());

        Self {
            vocabulary: vocab,
            aliases,
        }
    }

    /// Map a raw flag onto the vocabulary.
    pub fn canonicalize(&self, raw: &str) -> FlagMatch {
        let cleaned = clean_text(raw);

        if self.vocabulary.contains(&cleaned) {
            return FlagMatch::Exact(cleaned);
        }

        if let Some(canonical) = self.aliases.get(&cleaned) {
            return FlagMatch::Alias(canonical.clone());
        }

        // Best fuzzy match; ties resolve to the alphabetically first entry
        let best = self
            .vocabulary
            .iter()
            .map(|v| (v, similarity(&cleaned, v)))
            .fold(None::<(&String, f64)>, |best, (v, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((v, score)),
            });

        match best {
            Some((v, score)) if score >= FUZZY_THRESHOLD => FlagMatch::Fuzzy(v.clone(), score),
            _ => FlagMatch::Unrecognized(cleaned),
        }
    }

    /// Add a custom synonym mapping.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        let canonical = clean_text(canonical);
        self.vocabulary.insert(canonical.clone());
        self.aliases.insert(clean_text(alias), canonical);
    }

    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    /// Default synonym mappings.
    fn default_aliases() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Spine
        map.insert("cauda equina syndrome".into(), "cauda equina".into());
        map.insert("saddle anaesthesia".into(), "saddle anesthesia".into());
        map.insert("saddle numbness".into(), "saddle anesthesia".into());
        map.insert("urinary retention".into(), "bowel or bladder dysfunction".into());
        map.insert("bladder dysfunction".into(), "bowel or bladder dysfunction".into());
        map.insert("bowel dysfunction".into(), "bowel or bladder dysfunction".into());
        map.insert("incontinence".into(), "bowel or bladder dysfunction".into());
        map.insert("ivdu".into(), "intravenous drug use".into());
        map.insert("iv drug use".into(), "intravenous drug use".into());

        // Systemic
        map.insert("fevers".into(), "fever".into());
        map.insert("febrile".into(), "fever".into());
        map.insert("weight loss".into(), "unexplained weight loss".into());

        // Head
        map.insert("worst headache of life".into(), "thunderclap headache".into());
        map.insert("sudden severe headache".into(), "thunderclap headache".into());
        map.insert("papilloedema".into(), "papilledema".into());

        // Masses
        map.insert("breast lump".into(), "palpable breast mass".into());
        map.insert("breast mass".into(), "palpable breast mass".into());
        map.insert("pulsatile mass".into(), "pulsatile abdominal mass".into());

        map
    }
}

/// Lowercase, trim, turn underscores into spaces and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Combined string similarity (0.0 - 1.0).
fn similarity(a: &str, b: &str) -> f64 {
    // Jaro-Winkler catches transpositions, Levenshtein keeps long strings honest
    jaro_winkler(a, b) * 0.6 + normalized_levenshtein(a, b) * 0.4
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> RedFlagNormalizer {
        RedFlagNormalizer::new(["cauda equina", "fever", "unexplained weight loss"])
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Saddle   Anesthesia "), "saddle anesthesia");
        assert_eq!(clean_text("UNEXPLAINED_WEIGHT_LOSS"), "unexplained weight loss");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            normalizer().canonicalize("Fever"),
            FlagMatch::Exact("fever".into())
        );
    }

    #[test]
    fn test_alias_match() {
        let n = normalizer();
        assert_eq!(n.canonicalize("febrile"), FlagMatch::Alias("fever".into()));
        assert_eq!(
            n.canonicalize("Saddle anaesthesia"),
            FlagMatch::Alias("saddle anesthesia".into())
        );
    }

    #[test]
    fn test_typo_corrected() {
        match normalizer().canonicalize("unexplained wieght loss") {
            FlagMatch::Fuzzy(canonical, score) => {
                assert_eq!(canonical, "unexplained weight loss");
                assert!(score >= FUZZY_THRESHOLD);
            }
            other => panic!("expected fuzzy match, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_flag_kept() {
        let result = normalizer().canonicalize("Night Sweats");
        assert_eq!(result, FlagMatch::Unrecognized("night sweats".into()));
        assert_eq!(result.canonical(), "night sweats");
    }

    #[test]
    fn test_custom_alias() {
        let mut n = normalizer();
        n.add_alias("foot drop", "motor weakness");
        assert_eq!(n.canonicalize("foot drop"), FlagMatch::Alias("motor weakness".into()));
        assert!(n.vocabulary().contains("motor weakness"));
    }
}
