//! # Activation scoring
//!
//! Ranks candidates by a weighted blend of lexical/semantic match, recency,
//! frequency, importance, and current strength — an ACT-R-flavored
//! activation score rather than a single similarity metric.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::entry::Entry;

/// A human-facing bucket over an activation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    /// Bucket an activation (or confidence) score: `>= 0.7` high, `>= 0.4`
    /// medium, otherwise low.
    ///
    /// This is the *one* confidence computation used throughout the engine —
    /// including the session-working-memory materialization path — rather
    /// than a separate approximation, so a caller never sees two different
    /// meanings for "confidence" depending on which path answered the query.
    pub fn bucket(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A scored candidate, ready to be turned into a result record by the
/// retrieval pipeline.
#[derive(Debug, Clone)]
pub struct Scored {
    pub activation: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub lexical: f64,
    pub semantic: f64,
}

/// Score a single entry against a query's lexical match and, if an embedder
/// is supplied, its semantic similarity.
///
/// `lexical_score` comes from `Store::lexical_search` (0.0 if the entry
/// wasn't a lexical candidate, e.g. it arrived purely via graph expansion).
/// `context_multiplier` lets graph-expanded neighbors borrow relevance
/// through the edge that pulled them in (§4.3 step 3); pass `1.0` for
/// directly-matched candidates.
pub fn score(
    entry: &Entry,
    query: &str,
    lexical_score: f64,
    embedder: &dyn EmbeddingProvider,
    context_multiplier: f64,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Scored {
    let semantic = embedder.similarity(query, &entry.content);
    let context = (config.context_weight * semantic
        + (1.0 - config.context_weight) * lexical_score)
        * context_multiplier.clamp(0.0, 1.0);

    let recency = (-config.recency_lambda * entry.age_days(now)).exp();
    let frequency =
        (1.0 + entry.access_count as f64).ln() / (1.0 + config.frequency_saturation).ln();
    let frequency = frequency.min(1.0);
    let importance = entry.importance;
    let strength_f = entry.effective_strength().tanh();

    let mut activation = config.weight_context * context
        + config.weight_recency * recency
        + config.weight_frequency * frequency
        + config.weight_importance * importance
        + config.weight_strength * strength_f;

    if entry.pinned {
        activation += config.pinned_bonus;
    }
    let activation = activation.clamp(0.0, 1.0);

    Scored {
        activation,
        confidence: activation,
        confidence_label: ConfidenceLabel::bucket(activation),
        lexical: lexical_score,
        semantic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::entry::EntryType;

    fn fixture(importance: f64) -> Entry {
        Entry::new(
            "a".to_string(),
            "some content".to_string(),
            EntryType::Factual,
            importance,
            Utc::now(),
        )
    }

    #[test]
    fn higher_importance_yields_higher_activation() {
        let cfg = EngineConfig::chatbot();
        let embedder = NullEmbedder;
        let low = score(&fixture(0.1), "q", 0.5, &embedder, 1.0, Utc::now(), &cfg);
        let high = score(&fixture(0.9), "q", 0.5, &embedder, 1.0, Utc::now(), &cfg);
        assert!(high.activation > low.activation);
    }

    #[test]
    fn pinned_entries_get_a_bonus() {
        let cfg = EngineConfig::chatbot();
        let embedder = NullEmbedder;
        let mut pinned = fixture(0.5);
        pinned.pinned = true;
        let unpinned = fixture(0.5);

        let now = Utc::now();
        let a = score(&pinned, "q", 0.5, &embedder, 1.0, now, &cfg);
        let b = score(&unpinned, "q", 0.5, &embedder, 1.0, now, &cfg);
        assert!(a.activation >= b.activation);
    }

    #[test]
    fn activation_is_always_clamped() {
        let cfg = EngineConfig::chatbot();
        let embedder = NullEmbedder;
        let mut e = fixture(1.0);
        e.pinned = true;
        e.working_strength = 100.0;
        let s = score(&e, "q", 1.0, &embedder, 1.0, Utc::now(), &cfg);
        assert!(s.activation <= 1.0 && s.activation >= 0.0);
    }

    #[test]
    fn confidence_bucketing_matches_thresholds() {
        assert_eq!(ConfidenceLabel::bucket(0.75), ConfidenceLabel::High);
        assert_eq!(ConfidenceLabel::bucket(0.7), ConfidenceLabel::High);
        assert_eq!(ConfidenceLabel::bucket(0.55), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::bucket(0.4), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceLabel::bucket(0.1), ConfidenceLabel::Low);
    }

    #[test]
    fn context_multiplier_scales_down_borrowed_relevance() {
        let cfg = EngineConfig::chatbot();
        let embedder = NullEmbedder;
        let full = score(&fixture(0.5), "q", 0.8, &embedder, 1.0, Utc::now(), &cfg);
        let borrowed = score(&fixture(0.5), "q", 0.8, &embedder, 0.3, Utc::now(), &cfg);
        assert!(borrowed.activation < full.activation);
    }
}
