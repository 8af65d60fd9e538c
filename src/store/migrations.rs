//! Database migrations for the SQLite store.

/// A single schema migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

/// All migrations, applied in order on [`crate::store::SqliteStore::open`].
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: entries, access log, graph edges, Hebbian edges",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "FTS5 index over content and summary",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    summary TEXT,
    entry_type TEXT NOT NULL DEFAULT 'factual',
    importance REAL NOT NULL DEFAULT 0.5,
    working_strength REAL NOT NULL DEFAULT 1.0,
    core_strength REAL NOT NULL DEFAULT 0.0,
    layer TEXT NOT NULL DEFAULT 'working',
    access_count INTEGER NOT NULL DEFAULT 0,
    last_access TEXT,
    created_at TEXT NOT NULL,
    pinned INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    contradicts TEXT,
    contradicted_by TEXT,
    source TEXT
);

CREATE TABLE IF NOT EXISTS access_log (
    entry_id TEXT NOT NULL,
    ts TEXT NOT NULL,
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_access_log_entry ON access_log(entry_id);

CREATE TABLE IF NOT EXISTS graph_edges (
    entry_id TEXT NOT NULL,
    node_id TEXT NOT NULL,
    relation TEXT NOT NULL,
    FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_graph_edges_entry ON graph_edges(entry_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_node ON graph_edges(node_id);

CREATE TABLE IF NOT EXISTS hebbian_edges (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    strength REAL NOT NULL DEFAULT 0.0,
    coactivation_count INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id),
    FOREIGN KEY (source_id) REFERENCES entries(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES entries(id) ON DELETE CASCADE
);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
    id UNINDEXED,
    content,
    summary,
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS entries_fts_insert AFTER INSERT ON entries BEGIN
    INSERT INTO entries_fts(rowid, id, content, summary)
    VALUES (new.rowid, new.id, new.content, COALESCE(new.summary, ''));
END;

CREATE TRIGGER IF NOT EXISTS entries_fts_delete AFTER DELETE ON entries BEGIN
    INSERT INTO entries_fts(entries_fts, rowid, id, content, summary)
    VALUES ('delete', old.rowid, old.id, old.content, COALESCE(old.summary, ''));
END;

CREATE TRIGGER IF NOT EXISTS entries_fts_update AFTER UPDATE ON entries BEGIN
    INSERT INTO entries_fts(entries_fts, rowid, id, content, summary)
    VALUES ('delete', old.rowid, old.id, old.content, COALESCE(old.summary, ''));
    INSERT INTO entries_fts(rowid, id, content, summary)
    VALUES (new.rowid, new.id, new.content, COALESCE(new.summary, ''));
END;
"#;

/// Read the currently-applied schema version, defaulting to 0 for a fresh database.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply every migration newer than the current schema version.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);",
    )?;

    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [migration.version],
            )?;
            applied += 1;
        }
    }

    Ok(applied)
}
