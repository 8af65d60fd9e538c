//! # Facade
//!
//! [`Engine`] is the single public entry point: `add`, `recall`,
//! `session_recall`, `consolidate`, `forget`, `reward`, `stats`, plus the
//! thin `get`/`export` convenience wrappers carried over from the original
//! implementation's facade.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::consolidation::{self, ConsolidationReport};
use crate::embedding::{EmbeddingProvider, NullEmbedder};
use crate::entry::{Entry, EntryType, Layer};
use crate::error::{EngineError, Result};
use crate::retrieval::{self, RecallResult};
use crate::session::{SessionRegistry, session_recall as session_recall_impl};
use crate::store::{SqliteStore, Store};

/// Aggregate counts returned by [`Engine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_entries: u64,
    pub working_count: u64,
    pub core_count: u64,
    pub archive_count: u64,
    pub hebbian_link_count: u64,
}

/// Everything needed to call `add` without the boilerplate of constructing
/// an [`Entry`] by hand.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub summary: Option<String>,
    pub tags: std::collections::BTreeSet<String>,
    pub source: Option<String>,
    pub pinned: bool,
}

/// The memory engine. Generic over the embedding collaborator; the store is
/// always behind the `Store` trait object so callers can swap in their own
/// implementation without the engine's API changing.
pub struct Engine<E: EmbeddingProvider = NullEmbedder> {
    store: Box<dyn Store>,
    embedder: E,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    sessions: SessionRegistry,
    last_recall: Mutex<Vec<String>>,
}

impl Engine<NullEmbedder> {
    /// Open (or create) a SQLite-backed engine at `path` with the given
    /// config and no embedding collaborator.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        Ok(Self::new(Box::new(store), NullEmbedder, config))
    }

    /// An in-memory engine, useful for tests and throwaway sessions.
    pub fn open_in_memory(config: EngineConfig) -> Result<Self> {
        let store = SqliteStore::open_in_memory()?;
        Ok(Self::new(Box::new(store), NullEmbedder, config))
    }
}

impl<E: EmbeddingProvider> Engine<E> {
    pub fn new(store: Box<dyn Store>, embedder: E, config: EngineConfig) -> Self {
        Self {
            store,
            embedder,
            clock: Box::new(SystemClock),
            config,
            sessions: SessionRegistry::new(),
            last_recall: Mutex::new(Vec::new()),
        }
    }

    /// Override the clock (for deterministic tests); see `clock.rs`.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> chrono::DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a new entry. `content` must be non-empty.
    pub fn add(
        &self,
        content: impl Into<String>,
        entry_type: EntryType,
        importance: f64,
        options: AddOptions,
    ) -> Result<String> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(EngineError::InvalidInput("content must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&importance) {
            return Err(EngineError::InvalidInput(
                "importance must be in [0, 1]".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let mut entry = Entry::new(id.clone(), content, entry_type, importance, self.now());
        entry.summary = options.summary;
        entry.tags = options.tags;
        entry.source = options.source;
        entry.pinned = options.pinned;

        self.store.insert_entry(&entry)?;
        tracing::info!(id = %entry.id, entry_type = %entry.entry_type, "entry added");
        Ok(id)
    }

    /// Full activation-ranked recall.
    pub fn recall(
        &self,
        query: &str,
        limit: usize,
        min_confidence: Option<f64>,
        graph_expand: bool,
    ) -> Result<Vec<RecallResult>> {
        let results = retrieval::recall(
            self.store.as_ref(),
            &self.embedder,
            query,
            limit,
            min_confidence,
            graph_expand,
            self.now(),
            &self.config,
        )?;
        *self.last_recall.lock().unwrap() = results.iter().map(|r| r.id.clone()).collect();
        tracing::info!(query, result_count = results.len(), "recall");
        Ok(results)
    }

    /// Recall scoped to a session: reuses the session's working memory when
    /// the topic looks continuous, otherwise runs a full recall and
    /// refreshes that memory.
    pub fn session_recall(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RecallResult>> {
        let now = self.now();
        let results = self.sessions.with_session(session_id, &self.config, |wm| {
            session_recall_impl(
                self.store.as_ref(),
                &self.embedder,
                query,
                limit,
                wm,
                now,
                &self.config,
            )
        })?;
        *self.last_recall.lock().unwrap() = results.iter().map(|r| r.id.clone()).collect();
        Ok(results)
    }

    /// Run one consolidation pass of `days` length.
    pub fn consolidate(&self, days: f64) -> Result<ConsolidationReport> {
        consolidation::consolidate(self.store.as_ref(), days, &self.config)
    }

    /// Prune unpinned, low-importance entries below `threshold` strength.
    pub fn forget(&self, threshold: f64) -> Result<u64> {
        consolidation::forget(self.store.as_ref(), threshold, &self.config)
    }

    /// Nudge the importance of the most recently recalled entries. `positive`
    /// boosts by 10% (capped at 1.0); otherwise dampens by 10% (floored at 0.05).
    pub fn reward(&self, positive: bool) -> Result<()> {
        let ids = self.last_recall.lock().unwrap().clone();
        for id in ids {
            if let Some(mut entry) = self.store.get_entry(&id)? {
                entry.apply_reward(positive);
                self.store.update_entry(
                    &id,
                    &crate::store::EntryPatch {
                        importance: Some(entry.importance),
                        ..Default::default()
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Aggregate counts by layer plus the number of formed Hebbian links.
    pub fn stats(&self) -> Result<EngineStats> {
        let entries = self.store.iter_entries()?;
        let mut stats = EngineStats {
            total_entries: entries.len() as u64,
            ..Default::default()
        };
        for entry in &entries {
            match entry.layer {
                Layer::Working => stats.working_count += 1,
                Layer::Core => stats.core_count += 1,
                Layer::Archive => stats.archive_count += 1,
            }
        }
        stats.hebbian_link_count = self.store.iter_assoc_formed()?.len() as u64 / 2;
        Ok(stats)
    }

    /// Fetch a single entry by id.
    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        self.store.get_entry(id)
    }

    /// Copy the full backing state to another location for backup or inspection.
    pub fn export(&self, dest: impl AsRef<Path>) -> Result<()> {
        self.store.export(dest.as_ref())
    }

    pub fn clear_session(&self, session_id: &str) {
        self.sessions.clear_session(session_id);
    }

    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.list_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine<NullEmbedder> {
        Engine::open_in_memory(EngineConfig::chatbot()).unwrap()
    }

    #[test]
    fn add_rejects_empty_content() {
        let e = engine();
        let err = e.add("   ", EntryType::Factual, 0.5, AddOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn add_rejects_out_of_range_importance() {
        let e = engine();
        assert!(e.add("content", EntryType::Factual, 1.5, AddOptions::default()).is_err());
    }

    #[test]
    fn add_then_get_round_trips() {
        let e = engine();
        let id = e.add("the deploy key lives in 1Password", EntryType::Factual, 0.7, AddOptions::default()).unwrap();
        let entry = e.get(&id).unwrap().unwrap();
        assert_eq!(entry.content, "the deploy key lives in 1Password");
    }

    #[test]
    fn recall_returns_added_entry() {
        let e = engine();
        e.add("user's name is Alice Zhang", EntryType::Relational, 0.8, AddOptions::default()).unwrap();
        let results = e.recall("user name", 5, None, false).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn stats_reports_total_and_layer_counts() {
        let e = engine();
        e.add("a", EntryType::Factual, 0.5, AddOptions::default()).unwrap();
        e.add("b", EntryType::Factual, 0.5, AddOptions::default()).unwrap();
        let stats = e.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.working_count, 2);
    }

    #[test]
    fn reward_adjusts_importance_of_last_recall() {
        let e = engine();
        e.add("distinct phrase about widgets", EntryType::Factual, 0.5, AddOptions::default()).unwrap();
        e.recall("widgets", 5, None, false).unwrap();
        e.reward(true).unwrap();
        let entries = e.store.iter_entries().unwrap();
        assert!(entries[0].importance > 0.5);
    }

    #[test]
    fn pin_survives_forget() {
        let e = engine();
        let id = e.add("pinned fact", EntryType::Factual, 0.0, AddOptions { pinned: true, ..Default::default() }).unwrap();
        e.consolidate(365.0).unwrap();
        e.forget(0.9).unwrap();
        assert!(e.get(&id).unwrap().is_some());
    }

    #[test]
    fn session_recall_reuses_working_memory_for_continuous_topic() {
        let e = engine();
        e.add("Python variables and loops basics", EntryType::Procedural, 0.6, AddOptions::default()).unwrap();
        let first = e.session_recall("s1", "Python basics", 5).unwrap();
        assert!(!first.is_empty());
        let second = e.session_recall("s1", "Python variables", 5).unwrap();
        assert!(!second.is_empty());
    }

    #[test]
    fn export_copies_backing_state() {
        let e = engine();
        e.add("exportable content", EntryType::Factual, 0.5, AddOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.db");
        e.export(&dest).unwrap();
        assert!(dest.exists());
    }
}
