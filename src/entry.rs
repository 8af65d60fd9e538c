//! # The Entry Model
//!
//! A memory is represented as a single [`Entry`] carrying two decay traces —
//! a fast-decaying `working_strength` and a slow-decaying `core_strength` —
//! after the dual-strength account of human memory in Bjork, R. A., & Bjork,
//! E. L. (1992), *A new theory of disuse and an old theory of stimulus
//! fluctuation*. Storage strength (here, `core_strength`) grows monotonically
//! with use and decays slowly; retrieval strength (`working_strength`) is
//! volatile and decays quickly but is replenished by access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The category of a memory entry.
///
/// The type has no effect on storage mechanics by itself, but config presets
/// and scoring weights may be tuned per type by callers building on top of
/// the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// A fact: "the deploy key lives in 1Password".
    Factual,
    /// A recollection of a specific event: "we shipped v2 on a Friday and regretted it".
    Episodic,
    /// A relationship between entities: "Alice manages the payments team".
    Relational,
    /// An affect-laden memory: "the user was frustrated by the onboarding flow".
    Emotional,
    /// A how-to: "run `make fixtures` before the integration suite".
    Procedural,
    /// A stated preference or belief, as opposed to a fact: "the user prefers terse replies".
    Opinion,
}

impl EntryType {
    /// Parse from the lowercase string form used in storage and configuration.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "factual" => Some(Self::Factual),
            "episodic" => Some(Self::Episodic),
            "relational" => Some(Self::Relational),
            "emotional" => Some(Self::Emotional),
            "procedural" => Some(Self::Procedural),
            "opinion" => Some(Self::Opinion),
            _ => None,
        }
    }

    /// The lowercase string form used in storage and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Episodic => "episodic",
            Self::Relational => "relational",
            Self::Emotional => "emotional",
            Self::Procedural => "procedural",
            Self::Opinion => "opinion",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which decay layer an entry currently belongs to, derived from its strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Dominated by working strength; recently touched.
    Working,
    /// Consolidated into long-term (core) strength.
    Core,
    /// Neither threshold met; a forgetting candidate unless pinned.
    Archive,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Core => "core",
            Self::Archive => "archive",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "working" => Some(Self::Working),
            "core" => Some(Self::Core),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single memory entry and its decay state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub importance: f64,
    pub working_strength: f64,
    pub core_strength: f64,
    pub layer: Layer,
    pub access_count: u64,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub pinned: bool,
    pub tags: BTreeSet<String>,
    pub contradicts: Option<String>,
    pub contradicted_by: Option<String>,
    pub source: Option<String>,
}

impl Entry {
    /// Build a freshly-created entry. `working_strength` starts at 1.0,
    /// `core_strength` at 0.0 — the entry begins in the working layer.
    pub fn new(
        id: String,
        content: String,
        entry_type: EntryType,
        importance: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            content,
            summary: None,
            entry_type,
            importance: importance.clamp(0.0, 1.0),
            working_strength: 1.0,
            core_strength: 0.0,
            layer: Layer::Working,
            access_count: 0,
            last_access: None,
            created_at: now,
            pinned: false,
            tags: BTreeSet::new(),
            contradicts: None,
            contradicted_by: None,
            source: None,
        }
    }

    /// Sum of the two decay traces, floored so scoring never divides by or
    /// takes the log of zero.
    pub fn effective_strength(&self) -> f64 {
        (self.working_strength + self.core_strength).max(1e-6)
    }

    /// Apply one consolidation step of length `delta_days` to this entry's
    /// strengths, then recompute its layer.
    ///
    /// `mu_working` and `mu_core` are exponential decay rates (per day);
    /// `transfer_rate` is the fraction of working strength moved to core per
    /// day. Pinned entries skip core decay (but not working decay, nor the
    /// transfer itself) so a pin keeps what has already consolidated.
    pub fn decay(
        &mut self,
        delta_days: f64,
        mu_working: f64,
        mu_core: f64,
        transfer_rate: f64,
        layer_working_threshold: f64,
        layer_core_threshold: f64,
    ) {
        if delta_days <= 0.0 {
            return;
        }
        let transfer = transfer_rate * self.working_strength * delta_days;
        self.working_strength =
            (self.working_strength * (-mu_working * delta_days).exp() - transfer).max(0.0);

        if self.pinned {
            self.core_strength += transfer;
        } else {
            self.core_strength =
                (self.core_strength * (-mu_core * delta_days).exp() + transfer).max(0.0);
        }

        self.recompute_layer(layer_working_threshold, layer_core_threshold);
    }

    fn recompute_layer(&mut self, layer_working_threshold: f64, layer_core_threshold: f64) {
        self.layer = if self.core_strength >= layer_core_threshold {
            Layer::Core
        } else if self.working_strength >= layer_working_threshold || self.pinned {
            // A pin is never archived (§3): absent either threshold, a
            // pinned entry still reads as Working rather than Archive.
            Layer::Working
        } else {
            Layer::Archive
        };
    }

    /// Record an access: bump the count and timestamp. Does not touch strengths
    /// directly; decay/consolidation is a separate, explicit step.
    pub fn record_access(&mut self, at: DateTime<Utc>) {
        self.access_count += 1;
        self.last_access = Some(at);
    }

    /// Days elapsed between `last_access` (or `created_at` if never accessed)
    /// and `now`. Never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let from = self.last_access.unwrap_or(self.created_at);
        (now - from).num_milliseconds().max(0) as f64 / 86_400_000.0
    }

    /// Apply a feedback signal to importance: positive feedback boosts by 10%
    /// (capped at 1.0), negative dampens by 10% (floored at 0.05).
    pub fn apply_reward(&mut self, positive: bool) {
        if positive {
            self.importance = (self.importance * 1.1).min(1.0);
        } else {
            self.importance = (self.importance * 0.9).max(0.05);
        }
    }
}
