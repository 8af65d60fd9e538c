//! # Persistence
//!
//! [`Store`] is a trait, not a concrete type — [`SqliteStore`] is the one
//! production implementation shipped here, built on `rusqlite` with an FTS5
//! virtual table backing [`Store::lexical_search`]. Keeping persistence
//! behind a trait is what lets the engine (`engine.rs`) stay agnostic of
//! where entries actually live.

mod migrations;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::entry::Entry;
use crate::error::Result;

/// A directed, graded associative (Hebbian) edge between two entries.
///
/// `strength == 0.0` means the pair is still only *tracked* (co-activated
/// fewer times than the formation threshold); `strength > 0.0` means the
/// link has *formed*. Formed edges always exist in both directions with
/// equal strength — see `hebbian.rs`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssocEdge {
    pub source_id: String,
    pub target_id: String,
    pub strength: f64,
    pub coactivation_count: u32,
    pub created_at: DateTime<Utc>,
}

/// An edge into an external entity graph. The engine treats the `node_id`
/// and `relation` as opaque strings supplied by the caller; it never
/// interprets them beyond following them during graph expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub entry_id: String,
    pub node_id: String,
    pub relation: String,
}

/// A patch applied to an existing entry. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub content: Option<String>,
    pub summary: Option<Option<String>>,
    pub importance: Option<f64>,
    pub working_strength: Option<f64>,
    pub core_strength: Option<f64>,
    pub layer: Option<crate::entry::Layer>,
    pub access_count: Option<u64>,
    pub last_access: Option<Option<DateTime<Utc>>>,
    pub pinned: Option<bool>,
    pub tags: Option<std::collections::BTreeSet<String>>,
}

/// The persistence contract the rest of the engine is built against.
///
/// Implementations must uphold §8's edge-symmetry invariant: a formed
/// [`AssocEdge`] at `(a, b)` always has a mirror at `(b, a)` with equal
/// strength.
pub trait Store: Send + Sync {
    // -- entries --
    fn insert_entry(&self, entry: &Entry) -> Result<()>;
    fn get_entry(&self, id: &str) -> Result<Option<Entry>>;
    fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()>;
    fn delete_entry(&self, id: &str) -> Result<()>;
    fn iter_entries(&self) -> Result<Vec<Entry>>;

    /// Lexical candidate search. Returns up to `k` (id, score) pairs with
    /// `score` normalized to `[0, 1]`, best first.
    fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<(String, f64)>>;

    // -- access log --
    fn log_access(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    fn access_times(&self, id: &str) -> Result<Vec<DateTime<Utc>>>;

    // -- entity graph (opaque, externally populated) --
    fn add_graph_edge(&self, entry_id: &str, node_id: &str, relation: &str) -> Result<()>;
    fn graph_neighbors(&self, entry_id: &str) -> Result<Vec<(String, String)>>;
    fn entries_by_node(&self, node_id: &str) -> Result<Vec<String>>;

    // -- associative (Hebbian) edges --
    fn get_assoc(&self, a: &str, b: &str) -> Result<Option<AssocEdge>>;
    fn upsert_assoc(&self, edge: &AssocEdge) -> Result<()>;
    fn delete_assoc(&self, a: &str, b: &str) -> Result<()>;
    fn iter_assoc_formed(&self) -> Result<Vec<AssocEdge>>;
    fn assoc_neighbors(&self, id: &str) -> Result<Vec<AssocEdge>>;
    /// Multiply every formed edge's strength by `factor`, then delete any
    /// edge (both directions) whose strength falls below `prune_floor`.
    /// Returns the number of edges deleted.
    fn decay_assoc(&self, factor: f64, prune_floor: f64) -> Result<u64>;

    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Copy the full backing state to `dest`. The default implementation
    /// reports the capability as unsupported; [`SqliteStore`] overrides it
    /// with a `VACUUM INTO`.
    fn export(&self, _dest: &std::path::Path) -> Result<()> {
        Err(crate::error::EngineError::InvalidInput(
            "this store does not support export".to_string(),
        ))
    }
}
