//! # Configuration
//!
//! Every tunable used by the decay model, the activation scorer, the Hebbian
//! subsystem, and session working memory lives in a single [`EngineConfig`]
//! bundle rather than scattered constants, so a caller can persist, diff, or
//! load it from JSON/TOML.

use serde::{Deserialize, Serialize};

/// All tunables for a running engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    // -- dual-strength decay (entry.rs) --
    /// Working-strength decay rate per day (`mu_1`).
    pub mu_working: f64,
    /// Core-strength decay rate per day (`mu_2`), normally `mu_working` much smaller.
    pub mu_core: f64,
    /// Fraction of working strength transferred to core per day (`alpha`).
    pub transfer_rate: f64,
    /// Working-strength floor above which an entry is considered `Layer::Working`.
    pub layer_working_threshold: f64,
    /// Core-strength floor above which an entry is considered `Layer::Core`.
    pub layer_core_threshold: f64,

    // -- activation scorer (activation.rs) --
    /// Weight of the context term (lexical/semantic blend) in activation.
    pub weight_context: f64,
    /// Weight of the recency term.
    pub weight_recency: f64,
    /// Weight of the frequency term.
    pub weight_frequency: f64,
    /// Weight of the importance term.
    pub weight_importance: f64,
    /// Weight of the strength term.
    pub weight_strength: f64,
    /// Blend between semantic and lexical match inside the context term;
    /// 1.0 is all-semantic, 0.0 is all-lexical.
    pub context_weight: f64,
    /// Recency exponential decay rate per day.
    pub recency_lambda: f64,
    /// Saturation point for the frequency term (`access_count` at which it nears 1.0).
    pub frequency_saturation: f64,
    /// Activation bonus added to pinned entries before clamping.
    pub pinned_bonus: f64,
    /// Entries scoring below this activation are dropped from results.
    pub min_activation: f64,

    // -- forgetting --
    /// Importance at or above which an entry survives forgetting regardless of strength.
    pub pin_importance_floor: f64,
    /// Default forgetting threshold used when a caller does not supply one.
    pub forget_threshold_default: f64,

    // -- Hebbian subsystem (hebbian.rs) --
    /// Whether co-activation tracking runs at all.
    pub hebbian_enabled: bool,
    /// Co-activations required before a tracking pair becomes a formed link.
    pub hebbian_formation_threshold: u32,
    /// Multiplicative decay applied to formed link strength per consolidation.
    pub hebbian_decay_factor: f64,
    /// Formed links below this strength are pruned.
    pub hebbian_prune_floor: f64,
    /// Strength added to an already-formed link on repeat co-activation.
    pub hebbian_strengthen_boost: f64,
    /// Maximum strength a formed link may reach.
    pub hebbian_strength_cap: f64,
    /// Minimum activation a candidate needs before its neighbors are pulled
    /// into graph expansion.
    pub graph_expansion_gate: f64,

    // -- session working memory (session.rs) --
    /// Maximum number of ids held in a session's working memory (Miller's Law: 7±2).
    pub session_capacity: usize,
    /// Seconds after which an id ages out of session working memory.
    pub session_decay_seconds: i64,
    /// Fraction of a probe recall's results that must already be active (or a
    /// Hebbian neighbor of something active) for `needs_recall` to say no.
    pub session_overlap_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::chatbot()
    }
}

impl EngineConfig {
    /// Balanced defaults for a long-running conversational assistant.
    pub fn chatbot() -> Self {
        Self {
            mu_working: 0.35,
            mu_core: 0.02,
            transfer_rate: 0.08,
            layer_working_threshold: 0.5,
            layer_core_threshold: 0.3,

            weight_context: 0.4,
            weight_recency: 0.2,
            weight_frequency: 0.15,
            weight_importance: 0.15,
            weight_strength: 0.1,
            context_weight: 0.6,
            recency_lambda: 0.15,
            frequency_saturation: 20.0,
            pinned_bonus: 0.05,
            min_activation: 0.1,

            pin_importance_floor: 0.6,
            forget_threshold_default: 0.05,

            hebbian_enabled: true,
            hebbian_formation_threshold: 3,
            hebbian_decay_factor: 0.95,
            hebbian_prune_floor: 0.1,
            hebbian_strengthen_boost: 0.1,
            hebbian_strength_cap: 2.0,
            graph_expansion_gate: 0.3,

            session_capacity: 7,
            session_decay_seconds: 300,
            session_overlap_ratio: 0.6,
        }
    }

    /// Fast working-layer decay and aggressive forgetting — tuned for
    /// short-lived task execution where stale context is actively harmful.
    pub fn task_agent() -> Self {
        Self {
            mu_working: 0.8,
            mu_core: 0.05,
            transfer_rate: 0.05,
            layer_working_threshold: 0.6,
            layer_core_threshold: 0.4,
            forget_threshold_default: 0.15,
            pin_importance_floor: 0.5,
            session_decay_seconds: 120,
            session_capacity: 5,
            ..Self::chatbot()
        }
    }

    /// Favors recency and relational content, with a lower Hebbian threshold
    /// so associative links between people/preferences form quickly.
    pub fn personal_assistant() -> Self {
        Self {
            weight_recency: 0.3,
            weight_context: 0.25,
            weight_importance: 0.2,
            hebbian_formation_threshold: 2,
            mu_working: 0.3,
            mu_core: 0.015,
            ..Self::chatbot()
        }
    }

    /// Low decay, low forgetting thresholds — archive-everything bias for
    /// long-lived corpora where precision matters more than pruning.
    pub fn researcher() -> Self {
        Self {
            mu_working: 0.1,
            mu_core: 0.005,
            transfer_rate: 0.12,
            forget_threshold_default: 0.01,
            pin_importance_floor: 0.7,
            min_activation: 0.05,
            session_decay_seconds: 600,
            ..Self::chatbot()
        }
    }

    /// Basic sanity checks on a loaded/edited config. Not exhaustive — this
    /// guards against the mistakes that would silently break scoring (weights
    /// not summing close to 1, negative rates), not against bad taste.
    pub fn validate(&self) -> Result<(), String> {
        let weight_sum = self.weight_context
            + self.weight_recency
            + self.weight_frequency
            + self.weight_importance
            + self.weight_strength;
        if (weight_sum - 1.0).abs() > 0.01 {
            return Err(format!(
                "activation weights must sum to ~1.0, got {weight_sum}"
            ));
        }
        if self.mu_working < 0.0 || self.mu_core < 0.0 || self.transfer_rate < 0.0 {
            return Err("decay rates must be non-negative".to_string());
        }
        if self.session_capacity == 0 {
            return Err("session_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_presets_validate() {
        for cfg in [
            EngineConfig::chatbot(),
            EngineConfig::task_agent(),
            EngineConfig::personal_assistant(),
            EngineConfig::researcher(),
        ] {
            cfg.validate().unwrap();
        }
    }

    #[test]
    fn default_is_chatbot() {
        assert_eq!(EngineConfig::default(), EngineConfig::chatbot());
    }

    #[test]
    fn presets_differ() {
        assert_ne!(EngineConfig::task_agent().mu_working, EngineConfig::researcher().mu_working);
    }
}
