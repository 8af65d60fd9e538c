//! SQLite-backed [`Store`] implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use super::migrations::apply_migrations;
use super::{AssocEdge, EntryPatch, Store};
use crate::entry::{Entry, EntryType, Layer};
use crate::error::{EngineError, Result};

/// Main storage struct. A single writer connection behind a `Mutex` matches
/// the engine's single-writer concurrency model (§5): there is no benefit to
/// a separate reader connection when every caller already serializes through
/// one engine instance.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if necessary) a database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn).map_err(EngineError::StoreError)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private, file-less in-memory database. Used by tests and by
    /// callers that want throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn).map_err(EngineError::StoreError)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let entry_type: String = row.get("entry_type")?;
        let layer: String = row.get("layer")?;
        let tags_json: String = row.get("tags")?;
        let tags: BTreeSet<String> = serde_json::from_str(&tags_json).unwrap_or_default();

        Ok(Entry {
            id: row.get("id")?,
            content: row.get("content")?,
            summary: row.get("summary")?,
            entry_type: EntryType::parse_name(&entry_type).unwrap_or(EntryType::Factual),
            importance: row.get("importance")?,
            working_strength: row.get("working_strength")?,
            core_strength: row.get("core_strength")?,
            layer: Layer::parse_name(&layer).unwrap_or(Layer::Working),
            access_count: row.get::<_, i64>("access_count")? as u64,
            last_access: row
                .get::<_, Option<String>>("last_access")?
                .map(|s| parse_rfc3339(&s))
                .transpose()?,
            created_at: parse_rfc3339(&row.get::<_, String>("created_at")?)?,
            pinned: row.get::<_, i64>("pinned")? != 0,
            tags,
            contradicts: row.get("contradicts")?,
            contradicted_by: row.get("contradicted_by")?,
            source: row.get("source")?,
        })
    }
}

fn parse_rfc3339(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Escape a user query for safe embedding in an FTS5 MATCH expression by
/// quoting each token as a phrase and OR-ing them together. Avoids surfacing
/// FTS5 query-syntax errors (bare `-`, `"`, `*`) as store errors.
fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

impl Store for SqliteStore {
    fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entries (
                id, content, summary, entry_type, importance, working_strength,
                core_strength, layer, access_count, last_access, created_at,
                pinned, tags, contradicts, contradicted_by, source
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                entry.id,
                entry.content,
                entry.summary,
                entry.entry_type.as_str(),
                entry.importance,
                entry.working_strength,
                entry.core_strength,
                entry.layer.as_str(),
                entry.access_count as i64,
                entry.last_access.map(|t| t.to_rfc3339()),
                entry.created_at.to_rfc3339(),
                entry.pinned as i64,
                serde_json::to_string(&entry.tags).unwrap_or_else(|_| "[]".to_string()),
                entry.contradicts,
                entry.contradicted_by,
                entry.source,
            ],
        )?;
        Ok(())
    }

    fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row("SELECT * FROM entries WHERE id = ?1", [id], Self::row_to_entry)
            .optional()?;
        Ok(entry)
    }

    fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        macro_rules! set_field {
            ($sql:expr, $val:expr) => {
                if let Some(ref v) = $val {
                    conn.execute($sql, params![v, id])?;
                }
            };
        }

        set_field!("UPDATE entries SET content = ?1 WHERE id = ?2", patch.content);
        if let Some(ref summary) = patch.summary {
            conn.execute(
                "UPDATE entries SET summary = ?1 WHERE id = ?2",
                params![summary, id],
            )?;
        }
        set_field!(
            "UPDATE entries SET importance = ?1 WHERE id = ?2",
            patch.importance
        );
        set_field!(
            "UPDATE entries SET working_strength = ?1 WHERE id = ?2",
            patch.working_strength
        );
        set_field!(
            "UPDATE entries SET core_strength = ?1 WHERE id = ?2",
            patch.core_strength
        );
        if let Some(layer) = patch.layer {
            conn.execute(
                "UPDATE entries SET layer = ?1 WHERE id = ?2",
                params![layer.as_str(), id],
            )?;
        }
        if let Some(access_count) = patch.access_count {
            conn.execute(
                "UPDATE entries SET access_count = ?1 WHERE id = ?2",
                params![access_count as i64, id],
            )?;
        }
        if let Some(ref last_access) = patch.last_access {
            conn.execute(
                "UPDATE entries SET last_access = ?1 WHERE id = ?2",
                params![last_access.map(|t| t.to_rfc3339()), id],
            )?;
        }
        if let Some(pinned) = patch.pinned {
            conn.execute(
                "UPDATE entries SET pinned = ?1 WHERE id = ?2",
                params![pinned as i64, id],
            )?;
        }
        if let Some(ref tags) = patch.tags {
            conn.execute(
                "UPDATE entries SET tags = ?1 WHERE id = ?2",
                params![serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string()), id],
            )?;
        }
        Ok(())
    }

    fn delete_entry(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        conn.execute(
            "DELETE FROM hebbian_edges WHERE source_id = ?1 OR target_id = ?1",
            [id],
        )?;
        Ok(())
    }

    fn iter_entries(&self) -> Result<Vec<Entry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM entries")?;
        let rows = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn lexical_search(&self, query: &str, k: usize) -> Result<Vec<(String, f64)>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let fts_query = sanitize_fts5_query(query);
        let mut stmt = conn.prepare(
            "SELECT id, bm25(entries_fts) AS rank
             FROM entries_fts
             WHERE entries_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![fts_query, k as i64], |row| {
                let id: String = row.get(0)?;
                let raw: f64 = row.get(1)?;
                // bm25() is more negative for better matches; fold onto (0,1).
                let relevance = (-raw).max(0.0);
                let normalized = relevance / (1.0 + relevance);
                Ok((id, normalized))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn log_access(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO access_log (entry_id, ts) VALUES (?1, ?2)",
            params![id, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn access_times(&self, id: &str) -> Result<Vec<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT ts FROM access_log WHERE entry_id = ?1 ORDER BY ts")?;
        let rows = stmt
            .query_map([id], |row| {
                let ts: String = row.get(0)?;
                Ok(ts)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|s| parse_rfc3339(&s).map_err(EngineError::StoreError))
            .collect()
    }

    fn add_graph_edge(&self, entry_id: &str, node_id: &str, relation: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO graph_edges (entry_id, node_id, relation) VALUES (?1, ?2, ?3)",
            params![entry_id, node_id, relation],
        )?;
        Ok(())
    }

    fn graph_neighbors(&self, entry_id: &str) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT node_id, relation FROM graph_edges WHERE entry_id = ?1")?;
        let rows = stmt
            .query_map([entry_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn entries_by_node(&self, node_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT entry_id FROM graph_edges WHERE node_id = ?1")?;
        let rows = stmt
            .query_map([node_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_assoc(&self, a: &str, b: &str) -> Result<Option<AssocEdge>> {
        let conn = self.conn.lock().unwrap();
        let edge = conn
            .query_row(
                "SELECT source_id, target_id, strength, coactivation_count, created_at
                 FROM hebbian_edges WHERE source_id = ?1 AND target_id = ?2",
                params![a, b],
                row_to_assoc,
            )
            .optional()?;
        Ok(edge)
    }

    fn upsert_assoc(&self, edge: &AssocEdge) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO hebbian_edges (source_id, target_id, strength, coactivation_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(source_id, target_id) DO UPDATE SET
                strength = excluded.strength,
                coactivation_count = excluded.coactivation_count",
            params![
                edge.source_id,
                edge.target_id,
                edge.strength,
                edge.coactivation_count,
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_assoc(&self, a: &str, b: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM hebbian_edges WHERE (source_id = ?1 AND target_id = ?2)
                OR (source_id = ?2 AND target_id = ?1)",
            params![a, b],
        )?;
        Ok(())
    }

    fn iter_assoc_formed(&self) -> Result<Vec<AssocEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, strength, coactivation_count, created_at
             FROM hebbian_edges WHERE strength > 0",
        )?;
        let rows = stmt
            .query_map([], row_to_assoc)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn assoc_neighbors(&self, id: &str) -> Result<Vec<AssocEdge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, strength, coactivation_count, created_at
             FROM hebbian_edges WHERE source_id = ?1 AND strength > 0",
        )?;
        let rows = stmt
            .query_map([id], row_to_assoc)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn decay_assoc(&self, factor: f64, prune_floor: f64) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE hebbian_edges SET strength = strength * ?1 WHERE strength > 0",
            params![factor],
        )?;
        let pruned = conn.execute(
            "DELETE FROM hebbian_edges WHERE strength > 0 AND strength < ?1",
            params![prune_floor],
        )?;
        Ok(pruned as u64)
    }

    fn export(&self, dest: &std::path::Path) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let dest_str = dest.to_string_lossy();
        conn.execute("VACUUM INTO ?1", params![dest_str.as_ref()])?;
        Ok(())
    }
}

fn row_to_assoc(row: &rusqlite::Row) -> rusqlite::Result<AssocEdge> {
    let created_at: String = row.get(4)?;
    Ok(AssocEdge {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        strength: row.get(2)?,
        coactivation_count: row.get::<_, i64>(3)? as u32,
        created_at: parse_rfc3339(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> Entry {
        Entry::new(
            id.to_string(),
            format!("content for {id}"),
            EntryType::Factual,
            0.5,
            Utc::now(),
        )
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let e = entry("a");
        store.insert_entry(&e).unwrap();
        let got = store.get_entry("a").unwrap().unwrap();
        assert_eq!(got.content, e.content);
        assert_eq!(got.importance, e.importance);
    }

    #[test]
    fn get_missing_entry_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_entry("nope").unwrap().is_none());
    }

    #[test]
    fn lexical_search_finds_matching_content() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_entry(&{
                let mut e = entry("a");
                e.content = "the deploy key lives in 1Password".to_string();
                e
            })
            .unwrap();
        store
            .insert_entry(&{
                let mut e = entry("b");
                e.content = "unrelated content about gardening".to_string();
                e
            })
            .unwrap();

        let results = store.lexical_search("deploy key", 10).unwrap();
        assert!(results.iter().any(|(id, _)| id == "a"));
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn empty_query_returns_no_candidates() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_entry(&entry("a")).unwrap();
        assert!(store.lexical_search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn delete_entry_cascades_hebbian_edges() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_entry(&entry("a")).unwrap();
        store.insert_entry(&entry("b")).unwrap();
        store
            .upsert_assoc(&AssocEdge {
                source_id: "a".to_string(),
                target_id: "b".to_string(),
                strength: 1.0,
                coactivation_count: 3,
                created_at: Utc::now(),
            })
            .unwrap();
        store.delete_entry("a").unwrap();
        assert!(store.get_assoc("a", "b").unwrap().is_none());
    }

    #[test]
    fn hebbian_edge_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_entry(&entry("a")).unwrap();
        store.insert_entry(&entry("b")).unwrap();
        let edge = AssocEdge {
            source_id: "a".to_string(),
            target_id: "b".to_string(),
            strength: 1.0,
            coactivation_count: 3,
            created_at: Utc::now(),
        };
        store.upsert_assoc(&edge).unwrap();
        let got = store.get_assoc("a", "b").unwrap().unwrap();
        assert_eq!(got.strength, 1.0);
        assert_eq!(got.coactivation_count, 3);
    }

    #[test]
    fn decay_assoc_prunes_weak_edges() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_entry(&entry("a")).unwrap();
        store.insert_entry(&entry("b")).unwrap();
        store
            .upsert_assoc(&AssocEdge {
                source_id: "a".to_string(),
                target_id: "b".to_string(),
                strength: 0.12,
                coactivation_count: 3,
                created_at: Utc::now(),
            })
            .unwrap();
        let pruned = store.decay_assoc(0.5, 0.1).unwrap();
        assert_eq!(pruned, 1);
        assert!(store.get_assoc("a", "b").unwrap().is_none());
    }

    #[test]
    fn update_entry_patches_only_given_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let e = entry("a");
        store.insert_entry(&e).unwrap();
        store
            .update_entry(
                "a",
                &EntryPatch {
                    importance: Some(0.9),
                    ..Default::default()
                },
            )
            .unwrap();
        let got = store.get_entry("a").unwrap().unwrap();
        assert_eq!(got.importance, 0.9);
        assert_eq!(got.content, e.content);
    }
}
