//! # Session working memory
//!
//! A bounded, time-decayed cache of recently-active entry ids, after
//! Baddeley's working-memory model (time-limited without rehearsal) and
//! Miller's Law (capacity around 7±2 items). Used to skip a full recall when
//! the conversation is still circling the same topic.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::activation::{score, ConfidenceLabel};
use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::entry::Layer;
use crate::error::Result;
use crate::hebbian;
use crate::retrieval::{self, RecallResult};
use crate::store::Store;

/// A single session's bounded, time-decayed set of active entry ids.
#[derive(Debug, Clone, Default)]
pub struct SessionWorkingMemory {
    active: HashMap<String, DateTime<Utc>>,
    capacity: usize,
    decay_seconds: i64,
}

impl SessionWorkingMemory {
    pub fn new(capacity: usize, decay_seconds: i64) -> Self {
        Self {
            active: HashMap::new(),
            capacity,
            decay_seconds,
        }
    }

    /// Mark `ids` as active as of `now`, then prune.
    pub fn activate(&mut self, ids: impl IntoIterator<Item = String>, now: DateTime<Utc>) {
        for id in ids {
            self.active.insert(id, now);
        }
        self.prune(now);
    }

    /// Drop ids older than `decay_seconds`; if still over capacity, keep
    /// only the most recently activated `capacity` ids.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.active
            .retain(|_, ts| (now - *ts).num_seconds() < self.decay_seconds);

        if self.active.len() > self.capacity {
            let mut by_recency: Vec<(String, DateTime<Utc>)> =
                self.active.iter().map(|(k, v)| (k.clone(), *v)).collect();
            by_recency.sort_by(|a, b| b.1.cmp(&a.1));
            by_recency.truncate(self.capacity);
            self.active = by_recency.into_iter().collect();
        }
    }

    /// Prune, then return the currently active ids.
    pub fn active_ids(&mut self, now: DateTime<Utc>) -> Vec<String> {
        self.prune(now);
        self.active.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn size(&self) -> usize {
        self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Decide whether a full recall is warranted, or whether the session's
    /// currently-active set (plus its Hebbian neighbors) already covers what
    /// a fresh query would surface.
    ///
    /// Follows the 5-step procedure in SPEC_FULL §4.6: an empty session
    /// always needs a full recall; otherwise a cheap 3-result probe is run
    /// and compared against the active set widened by one hop of formed
    /// Hebbian links.
    pub fn needs_recall(
        &mut self,
        store: &dyn Store,
        embedder: &dyn EmbeddingProvider,
        query: &str,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Result<bool> {
        if self.is_empty() {
            return Ok(true);
        }

        let current = self.active_ids(now);
        let mut neighborhood: std::collections::HashSet<String> = current.iter().cloned().collect();
        for id in &current {
            for edge in hebbian::neighbors(store, id)? {
                neighborhood.insert(edge.target_id);
            }
        }

        let probe = retrieval::recall(store, embedder, query, 3, None, false, now, config)?;
        if probe.is_empty() {
            return Ok(true);
        }

        let overlap = probe.iter().filter(|r| neighborhood.contains(&r.id)).count();
        let ratio = overlap as f64 / probe.len() as f64;
        Ok(ratio < config.session_overlap_ratio)
    }
}

/// `session_recall`: use the working-memory shortcut when the topic looks
/// continuous, otherwise fall back to a full recall and refresh the session.
pub fn session_recall(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    limit: usize,
    wm: &mut SessionWorkingMemory,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Vec<RecallResult>> {
    if wm.needs_recall(store, embedder, query, now, config)? {
        let results = retrieval::recall(store, embedder, query, limit, None, true, now, config)?;
        wm.activate(retrieval::result_ids(&results), now);
        return Ok(results);
    }

    // Materialize the active set directly, scored by current activation,
    // without re-running the pipeline (and without its side effects).
    let mut out = Vec::new();
    for id in wm.active_ids(now) {
        let Some(entry) = store.get_entry(&id)? else {
            continue;
        };
        let lex = 0.0;
        let scored = score(&entry, query, lex, embedder, 1.0, now, config);
        out.push(RecallResult {
            id: entry.id.clone(),
            content: entry.content.clone(),
            entry_type: entry.entry_type.as_str().to_string(),
            activation: scored.activation,
            confidence: scored.confidence,
            confidence_label: ConfidenceLabel::bucket(scored.confidence),
            strength: entry.effective_strength(),
            age_in_days: entry.age_days(now),
            layer: entry_layer(&entry),
            importance: entry.importance,
            pinned: entry.pinned,
            source: entry.source.clone(),
        });
    }
    out.sort_by(|a, b| b.activation.partial_cmp(&a.activation).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(limit);
    Ok(out)
}

fn entry_layer(entry: &crate::entry::Entry) -> Layer {
    entry.layer
}

/// Owned, per-engine registry of session working memories, keyed by an
/// opaque session id supplied by the caller. Explicitly *not* a global —
/// every registry belongs to exactly one engine instance, so two engines in
/// the same process never share session state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionWorkingMemory>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` with the named session's working memory, creating it (with
    /// `capacity`/`decay_seconds` from `config`) if this is the first use.
    pub fn with_session<R>(
        &self,
        session_id: &str,
        config: &EngineConfig,
        f: impl FnOnce(&mut SessionWorkingMemory) -> R,
    ) -> R {
        let mut sessions = self.sessions.lock().unwrap();
        let wm = sessions.entry(session_id.to_string()).or_insert_with(|| {
            SessionWorkingMemory::new(config.session_capacity, config.session_decay_seconds)
        });
        f(wm)
    }

    pub fn clear_session(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_session_is_empty() {
        let wm = SessionWorkingMemory::new(7, 300);
        assert!(wm.is_empty());
    }

    #[test]
    fn activate_tracks_ids() {
        let mut wm = SessionWorkingMemory::new(7, 300);
        let now = Utc::now();
        wm.activate(["a".to_string(), "b".to_string()], now);
        assert_eq!(wm.size(), 2);
    }

    #[test]
    fn capacity_keeps_most_recent() {
        let mut wm = SessionWorkingMemory::new(2, 300);
        let now = Utc::now();
        wm.activate(["a".to_string()], now);
        wm.activate(["b".to_string()], now + Duration::seconds(1));
        wm.activate(["c".to_string()], now + Duration::seconds(2));
        let ids = wm.active_ids(now + Duration::seconds(2));
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&"a".to_string()));
    }

    #[test]
    fn decay_ages_out_stale_ids() {
        let mut wm = SessionWorkingMemory::new(7, 300);
        let now = Utc::now();
        wm.activate(["a".to_string()], now);
        let ids = wm.active_ids(now + Duration::seconds(301));
        assert!(ids.is_empty());
    }

    #[test]
    fn clear_empties_the_session() {
        let mut wm = SessionWorkingMemory::new(7, 300);
        wm.activate(["a".to_string()], Utc::now());
        wm.clear();
        assert!(wm.is_empty());
    }

    #[test]
    fn registry_creates_session_on_first_use() {
        let registry = SessionRegistry::new();
        let config = EngineConfig::chatbot();
        registry.with_session("s1", &config, |wm| wm.activate(["a".to_string()], Utc::now()));
        assert_eq!(registry.list_sessions(), vec!["s1".to_string()]);
    }

    #[test]
    fn registry_clear_session_removes_it() {
        let registry = SessionRegistry::new();
        let config = EngineConfig::chatbot();
        registry.with_session("s1", &config, |wm| wm.activate(["a".to_string()], Utc::now()));
        registry.clear_session("s1");
        assert!(registry.list_sessions().is_empty());
    }
}
