//! # Retrieval pipeline
//!
//! Turns a query into a ranked, side-effecting recall: gather lexical
//! candidates, score them, optionally expand along the associative and
//! entity graphs, filter, take the top-k, then log the access and record
//! co-activation for what was returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::activation::{score, ConfidenceLabel};
use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::entry::{Entry, Layer};
use crate::error::Result;
use crate::hebbian;
use crate::store::{EntryPatch, Store};

/// A single ranked recall result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub activation: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub strength: f64,
    pub age_in_days: f64,
    pub layer: Layer,
    pub importance: f64,
    pub pinned: bool,
    pub source: Option<String>,
}

impl RecallResult {
    fn from_entry(entry: &Entry, scored: &crate::activation::Scored, now: DateTime<Utc>) -> Self {
        Self {
            id: entry.id.clone(),
            content: entry.content.clone(),
            entry_type: entry.entry_type.as_str().to_string(),
            activation: scored.activation,
            confidence: scored.confidence,
            confidence_label: scored.confidence_label,
            strength: entry.effective_strength(),
            age_in_days: entry.age_days(now),
            layer: entry.layer,
            importance: entry.importance,
            pinned: entry.pinned,
            source: entry.source.clone(),
        }
    }
}

/// Run a full recall. See SPEC_FULL §4.3 for the numbered steps this follows.
#[allow(clippy::too_many_arguments)]
pub fn recall(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    limit: usize,
    min_confidence: Option<f64>,
    graph_expand: bool,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Vec<RecallResult>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    // 1. Candidate gather.
    let k_cand = (4 * limit).max(40);
    let lexical_hits = store.lexical_search(query, k_cand)?;
    let mut lexical_scores: HashMap<String, f64> = HashMap::new();
    let mut candidate_ids: Vec<String> = Vec::new();
    for (id, lex) in lexical_hits {
        lexical_scores.insert(id.clone(), lex);
        candidate_ids.push(id);
    }

    let mut entries: HashMap<String, Entry> = HashMap::new();
    for id in &candidate_ids {
        if let Some(entry) = store.get_entry(id)? {
            entries.insert(id.clone(), entry);
        }
    }

    // 2. Score.
    let mut scored: HashMap<String, (crate::activation::Scored, f64)> = HashMap::new();
    for (id, entry) in &entries {
        let lex = lexical_scores.get(id).copied().unwrap_or(0.0);
        let s = score(entry, query, lex, embedder, 1.0, now, config);
        scored.insert(id.clone(), (s, 1.0));
    }

    // 3. Graph expand.
    if graph_expand {
        let gated: Vec<String> = scored
            .iter()
            .filter(|(_, (s, _))| s.activation >= config.graph_expansion_gate)
            .map(|(id, _)| id.clone())
            .collect();

        let mut expansion: HashMap<String, f64> = HashMap::new();
        for id in &gated {
            for edge in hebbian::neighbors(store, id)? {
                let mult = (edge.strength / config.hebbian_strength_cap).clamp(0.0, 1.0);
                expansion
                    .entry(edge.target_id)
                    .and_modify(|m| *m = m.max(mult))
                    .or_insert(mult);
            }
            for (node_id, _relation) in store.graph_neighbors(id)? {
                for neighbor_id in store.entries_by_node(&node_id)? {
                    if neighbor_id == id {
                        continue;
                    }
                    expansion.entry(neighbor_id).or_insert(0.5);
                }
            }
        }

        for (id, mult) in expansion {
            if scored.contains_key(&id) {
                continue;
            }
            let Some(entry) = (match entries.get(&id) {
                Some(e) => Some(e.clone()),
                None => store.get_entry(&id)?,
            }) else {
                continue;
            };
            let s = score(&entry, query, 0.0, embedder, mult, now, config);
            entries.insert(id.clone(), entry);
            scored.insert(id, (s, mult));
        }
    }

    // 4. Filter.
    let mut candidates: Vec<(String, crate::activation::Scored)> = scored
        .into_iter()
        .filter(|(_, (s, _))| s.activation >= config.min_activation)
        .filter(|(_, (s, _))| min_confidence.is_none_or(|m| s.confidence >= m))
        .map(|(id, (s, _))| (id, s))
        .collect();

    // 5. Select top-k. Ties broken by most-recent access, then earliest creation.
    candidates.sort_by(|(id_a, a), (id_b, b)| {
        b.activation
            .partial_cmp(&a.activation)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ea = &entries[id_a];
                let eb = &entries[id_b];
                eb.last_access.cmp(&ea.last_access)
            })
            .then_with(|| entries[id_a].created_at.cmp(&entries[id_b].created_at))
    });
    candidates.truncate(limit);

    // 6. Side effects.
    let returned_ids: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
    for id in &returned_ids {
        store.log_access(id, now)?;
        if let Some(entry) = entries.get(id) {
            store.update_entry(
                id,
                &EntryPatch {
                    access_count: Some(entry.access_count + 1),
                    last_access: Some(Some(now)),
                    ..Default::default()
                },
            )?;
        }
    }
    hebbian::record_coactivation(store, &returned_ids, config)?;

    // 7. Shape results.
    let results = candidates
        .iter()
        .map(|(id, s)| RecallResult::from_entry(&entries[id], s, now))
        .collect();

    Ok(results)
}

/// The set of ids a recall touched, useful for session working memory to
/// `activate` without re-running the pipeline's scoring.
pub fn result_ids(results: &[RecallResult]) -> HashSet<String> {
    results.iter().map(|r| r.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::entry::EntryType;
    use crate::store::SqliteStore;

    fn insert(store: &SqliteStore, id: &str, content: &str, importance: f64) {
        store
            .insert_entry(&Entry::new(
                id.to_string(),
                content.to_string(),
                EntryType::Factual,
                importance,
                Utc::now(),
            ))
            .unwrap();
    }

    #[test]
    fn recall_ranks_lexically_matching_entry_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", "the user's name is Alice Zhang", 0.8);
        for i in 0..8 {
            insert(&store, &format!("noise{i}"), "unrelated episodic chatter", 0.3);
        }
        let cfg = EngineConfig::chatbot();
        let results = recall(
            &store,
            &NullEmbedder,
            "user name",
            5,
            None,
            false,
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[test]
    fn recall_increments_access_count_of_returned_entries() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", "deploy key information", 0.5);
        let cfg = EngineConfig::chatbot();
        recall(&store, &NullEmbedder, "deploy key", 5, None, false, Utc::now(), &cfg).unwrap();
        let e = store.get_entry("a").unwrap().unwrap();
        assert_eq!(e.access_count, 1);
        assert!(e.last_access.is_some());
    }

    #[test]
    fn empty_store_returns_empty_results() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cfg = EngineConfig::chatbot();
        let results = recall(&store, &NullEmbedder, "anything", 5, None, false, Utc::now(), &cfg)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn zero_limit_returns_empty_without_touching_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", "deploy key information", 0.5);
        let cfg = EngineConfig::chatbot();
        let results = recall(&store, &NullEmbedder, "deploy key", 0, None, false, Utc::now(), &cfg)
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(store.get_entry("a").unwrap().unwrap().access_count, 0);
    }

    #[test]
    fn graph_expansion_pulls_in_hebbian_neighbor() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", "neural network gradient descent", 0.6);
        insert(&store, "b", "backpropagation training loop", 0.6);
        let cfg = EngineConfig::chatbot();

        let ids = vec!["a".to_string(), "b".to_string()];
        for _ in 0..cfg.hebbian_formation_threshold {
            hebbian::record_coactivation(&store, &ids, &cfg).unwrap();
        }

        let results = recall(
            &store,
            &NullEmbedder,
            "neural network",
            5,
            None,
            true,
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert!(results.iter().any(|r| r.id == "b"));
    }

    #[test]
    fn min_confidence_filters_low_activation_results() {
        let store = SqliteStore::open_in_memory().unwrap();
        insert(&store, "a", "totally unrelated filler text", 0.05);
        let cfg = EngineConfig::chatbot();
        let results = recall(
            &store,
            &NullEmbedder,
            "deploy key",
            5,
            Some(0.9),
            false,
            Utc::now(),
            &cfg,
        )
        .unwrap();
        assert!(results.is_empty());
    }
}
