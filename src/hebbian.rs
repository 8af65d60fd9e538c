//! # Hebbian co-activation
//!
//! "Neurons that fire together, wire together" (Collins & Loftus, 1975;
//! Hebb, 1949). When entries are retrieved together repeatedly, they form an
//! associative link independent of any explicit entity tagging — purely
//! emergent from usage. This captures relationships the engine discovers
//! through experience rather than ones stated at encoding time.

use chrono::Utc;
use itertools_like::combinations_pairs;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::store::{AssocEdge, Store};

mod itertools_like {
    /// All unordered pairs of a slice, without pulling in a dependency for it.
    pub fn combinations_pairs<T: Clone>(items: &[T]) -> Vec<(T, T)> {
        let mut out = Vec::new();
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                out.push((items[i].clone(), items[j].clone()));
            }
        }
        out
    }
}

/// Canonicalize a pair so the lexically smaller id is first. Every Hebbian
/// lookup and insert goes through this so `(a, b)` and `(b, a)` always land
/// on the same row.
fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Record co-activation for a set of entry ids returned together from a
/// single recall. Returns the pairs that newly *formed* a link on this call
/// (as opposed to merely incrementing a tracking count, or strengthening an
/// already-formed link).
pub fn record_coactivation(
    store: &dyn Store,
    entry_ids: &[String],
    config: &EngineConfig,
) -> Result<Vec<(String, String)>> {
    if !config.hebbian_enabled || entry_ids.len() < 2 {
        return Ok(Vec::new());
    }

    let mut formed = Vec::new();
    for (a, b) in combinations_pairs(entry_ids) {
        if maybe_form_link(store, &a, &b, config)? {
            let (x, y) = canonical_pair(&a, &b);
            formed.push((x.to_string(), y.to_string()));
        }
    }
    Ok(formed)
}

/// Increment the co-activation count for `(a, b)` and, depending on current
/// state, either: start tracking, keep tracking, form the link, or
/// strengthen an already-formed link. Returns `true` only when this call is
/// the one that newly forms the link.
fn maybe_form_link(store: &dyn Store, a: &str, b: &str, config: &EngineConfig) -> Result<bool> {
    let (a, b) = canonical_pair(a, b);
    let now = Utc::now();

    match store.get_assoc(a, b)? {
        Some(existing) if existing.strength > 0.0 => {
            // Already formed: use-it-or-lose-it strengthening, counteracting decay.
            let new_strength = (existing.strength + config.hebbian_strengthen_boost)
                .min(config.hebbian_strength_cap);
            let new_count = existing.coactivation_count + 1;
            store.upsert_assoc(&AssocEdge {
                source_id: a.to_string(),
                target_id: b.to_string(),
                strength: new_strength,
                coactivation_count: new_count,
                created_at: existing.created_at,
            })?;
            store.upsert_assoc(&AssocEdge {
                source_id: b.to_string(),
                target_id: a.to_string(),
                strength: new_strength,
                coactivation_count: new_count,
                created_at: existing.created_at,
            })?;
            Ok(false)
        }
        Some(existing) => {
            // Tracking phase: strength == 0.0.
            let new_count = existing.coactivation_count + 1;
            if new_count >= config.hebbian_formation_threshold {
                store.upsert_assoc(&AssocEdge {
                    source_id: a.to_string(),
                    target_id: b.to_string(),
                    strength: 1.0,
                    coactivation_count: new_count,
                    created_at: existing.created_at,
                })?;
                store.upsert_assoc(&AssocEdge {
                    source_id: b.to_string(),
                    target_id: a.to_string(),
                    strength: 1.0,
                    coactivation_count: new_count,
                    created_at: now,
                })?;
                Ok(true)
            } else {
                store.upsert_assoc(&AssocEdge {
                    source_id: a.to_string(),
                    target_id: b.to_string(),
                    strength: 0.0,
                    coactivation_count: new_count,
                    created_at: existing.created_at,
                })?;
                Ok(false)
            }
        }
        None => {
            // First co-activation: start a tracking record.
            store.upsert_assoc(&AssocEdge {
                source_id: a.to_string(),
                target_id: b.to_string(),
                strength: 0.0,
                coactivation_count: 1,
                created_at: now,
            })?;
            Ok(false)
        }
    }
}

/// Formed (strength > 0) neighbors of `id`, i.e. entries it has an
/// associative link with.
pub fn neighbors(store: &dyn Store, id: &str) -> Result<Vec<AssocEdge>> {
    store.assoc_neighbors(id)
}

/// All formed links in the store.
pub fn all_links(store: &dyn Store) -> Result<Vec<AssocEdge>> {
    store.iter_assoc_formed()
}

/// Scan formed links for the one-way half-edges §8.1 forbids and self-heal
/// by deleting them, per §7's `ConsistencyViolation` handling: detect, log,
/// delete rather than surface the corruption to a caller. Tracking records
/// (`strength == 0.0`) are legitimately one-sided until formation and are
/// left alone. Returns the number of half-edges removed.
pub fn heal_consistency(store: &dyn Store) -> Result<u64> {
    let mut healed = 0u64;
    let mut seen = std::collections::HashSet::new();
    for edge in store.iter_assoc_formed()? {
        let (x, y) = canonical_pair(&edge.source_id, &edge.target_id);
        if !seen.insert((x.to_string(), y.to_string())) {
            continue;
        }
        match store.get_assoc(&edge.target_id, &edge.source_id)? {
            Some(mirror) if mirror.strength == edge.strength => continue,
            other => {
                tracing::warn!(
                    source = %edge.source_id,
                    target = %edge.target_id,
                    mirror_found = other.is_some(),
                    "self-healing asymmetric hebbian edge"
                );
                store.delete_assoc(&edge.source_id, &edge.target_id)?;
                healed += 1;
            }
        }
    }
    Ok(healed)
}

/// Decay every formed link's strength by `config.hebbian_decay_factor`,
/// pruning any that fall below `config.hebbian_prune_floor`. Called once per
/// consolidation pass. Returns the number of links pruned.
pub fn decay_links(store: &dyn Store, config: &EngineConfig) -> Result<u64> {
    if !config.hebbian_enabled {
        return Ok(0);
    }
    store.decay_assoc(config.hebbian_decay_factor, config.hebbian_prune_floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, EntryType};
    use crate::store::SqliteStore;

    fn store_with(ids: &[&str]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for id in ids {
            store
                .insert_entry(&Entry::new(
                    id.to_string(),
                    format!("content {id}"),
                    EntryType::Factual,
                    0.5,
                    Utc::now(),
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn pair_forms_link_exactly_at_threshold() {
        let store = store_with(&["a", "b"]);
        let cfg = EngineConfig::chatbot();
        let ids = vec!["a".to_string(), "b".to_string()];

        let mut formed_on = None;
        for i in 1..=cfg.hebbian_formation_threshold {
            let formed = record_coactivation(&store, &ids, &cfg).unwrap();
            if !formed.is_empty() {
                formed_on = Some(i);
                break;
            }
        }
        assert_eq!(formed_on, Some(cfg.hebbian_formation_threshold));
    }

    #[test]
    fn formed_link_is_bidirectional_and_capped() {
        let store = store_with(&["a", "b"]);
        let cfg = EngineConfig::chatbot();
        let ids = vec!["a".to_string(), "b".to_string()];
        for _ in 0..(cfg.hebbian_formation_threshold + 20) {
            record_coactivation(&store, &ids, &cfg).unwrap();
        }
        let ab = store.get_assoc("a", "b").unwrap().unwrap();
        let ba = store.get_assoc("b", "a").unwrap().unwrap();
        assert_eq!(ab.strength, ba.strength);
        assert!(ab.strength <= cfg.hebbian_strength_cap);
    }

    #[test]
    fn below_threshold_link_does_not_form() {
        let store = store_with(&["a", "b"]);
        let cfg = EngineConfig::chatbot();
        let ids = vec!["a".to_string(), "b".to_string()];
        record_coactivation(&store, &ids, &cfg).unwrap();
        let edge = store.get_assoc("a", "b").unwrap().unwrap();
        assert_eq!(edge.strength, 0.0);
        assert!(neighbors(&store, "a").unwrap().is_empty());
    }

    #[test]
    fn single_id_set_is_a_noop() {
        let store = store_with(&["a"]);
        let cfg = EngineConfig::chatbot();
        let formed = record_coactivation(&store, &["a".to_string()], &cfg).unwrap();
        assert!(formed.is_empty());
    }

    #[test]
    fn decay_prunes_weak_links() {
        let store = store_with(&["a", "b"]);
        store
            .upsert_assoc(&AssocEdge {
                source_id: "a".to_string(),
                target_id: "b".to_string(),
                strength: 0.12,
                coactivation_count: 5,
                created_at: Utc::now(),
            })
            .unwrap();
        let cfg = EngineConfig::chatbot();
        let pruned = decay_links(&store, &cfg).unwrap();
        assert_eq!(pruned, 1);
    }

    #[test]
    fn heal_consistency_removes_one_sided_formed_edge() {
        let store = store_with(&["a", "b"]);
        store
            .upsert_assoc(&AssocEdge {
                source_id: "a".to_string(),
                target_id: "b".to_string(),
                strength: 1.0,
                coactivation_count: 3,
                created_at: Utc::now(),
            })
            .unwrap();
        // No mirror (b, a) inserted: this is the corruption §7 describes.
        let healed = heal_consistency(&store).unwrap();
        assert_eq!(healed, 1);
        assert!(store.get_assoc("a", "b").unwrap().is_none());
    }

    #[test]
    fn heal_consistency_leaves_symmetric_formed_edges_alone() {
        let store = store_with(&["a", "b"]);
        let cfg = EngineConfig::chatbot();
        let ids = vec!["a".to_string(), "b".to_string()];
        for _ in 0..cfg.hebbian_formation_threshold {
            record_coactivation(&store, &ids, &cfg).unwrap();
        }
        let healed = heal_consistency(&store).unwrap();
        assert_eq!(healed, 0);
        assert!(store.get_assoc("a", "b").unwrap().is_some());
    }

    #[test]
    fn disabled_hebbian_never_records() {
        let store = store_with(&["a", "b"]);
        let mut cfg = EngineConfig::chatbot();
        cfg.hebbian_enabled = false;
        let ids = vec!["a".to_string(), "b".to_string()];
        for _ in 0..10 {
            record_coactivation(&store, &ids, &cfg).unwrap();
        }
        assert!(store.get_assoc("a", "b").unwrap().is_none());
    }
}
