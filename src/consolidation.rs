//! # Consolidation & forgetting
//!
//! `consolidate` is the periodic maintenance pass that moves working
//! strength into core strength and decays associative links (§4.1, §4.4).
//! `forget` prunes entries that have decayed below a usefulness floor and
//! are not protected by pinning or importance.

use crate::config::EngineConfig;
use crate::entry::Layer;
use crate::error::{EngineError, Result};
use crate::hebbian;
use crate::store::{EntryPatch, Store};

/// Result of a single `consolidate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidationReport {
    pub entries_processed: u64,
    pub hebbian_edges_pruned: u64,
}

/// Apply one consolidation step of `delta_days` to every entry, then decay
/// associative links. Order matters: entries decay first so forgetting (if
/// called afterward) evaluates post-decay strength.
pub fn consolidate(store: &dyn Store, delta_days: f64, config: &EngineConfig) -> Result<ConsolidationReport> {
    if delta_days < 0.0 {
        return Err(EngineError::InvalidInput(
            "delta_days must be non-negative".to_string(),
        ));
    }

    let entries = store.iter_entries()?;
    let mut processed = 0u64;
    for mut entry in entries {
        entry.decay(
            delta_days,
            config.mu_working,
            config.mu_core,
            config.transfer_rate,
            config.layer_working_threshold,
            config.layer_core_threshold,
        );
        store.update_entry(
            &entry.id,
            &EntryPatch {
                working_strength: Some(entry.working_strength),
                core_strength: Some(entry.core_strength),
                layer: Some(entry.layer),
                ..Default::default()
            },
        )?;
        processed += 1;
    }

    let pruned = hebbian::decay_links(store, config)?;
    let healed = hebbian::heal_consistency(store)?;
    if healed > 0 {
        tracing::warn!(healed, "consolidation healed asymmetric hebbian edges");
    }

    tracing::info!(
        entries_processed = processed,
        hebbian_edges_pruned = pruned,
        "consolidation pass complete"
    );

    Ok(ConsolidationReport {
        entries_processed: processed,
        hebbian_edges_pruned: pruned,
    })
}

/// Delete every entry that is not pinned, whose effective strength is below
/// `threshold`, and whose importance is below `config.pin_importance_floor`.
/// Deletion cascades to access-log rows, graph edges, and associative edges
/// (enforced by the store). Returns the number of entries pruned.
pub fn forget(store: &dyn Store, threshold: f64, config: &EngineConfig) -> Result<u64> {
    if threshold < 0.0 {
        return Err(EngineError::InvalidInput(
            "threshold must be non-negative".to_string(),
        ));
    }

    let mut pruned = 0u64;
    for entry in store.iter_entries()? {
        if entry.pinned {
            continue;
        }
        if entry.importance >= config.pin_importance_floor {
            continue;
        }
        if entry.effective_strength() < threshold {
            store.delete_entry(&entry.id)?;
            pruned += 1;
        }
    }

    tracing::info!(entries_pruned = pruned, threshold, "forgetting pass complete");
    Ok(pruned)
}
