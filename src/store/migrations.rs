//! Relational schema migrations

/// A single forward migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial entities/relations schema with FTS5",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Agent-memory overlay columns",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    name TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    observations TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    importance INTEGER,
    parent_name TEXT REFERENCES entities(name) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relations (
    "from" TEXT NOT NULL,
    "to" TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY ("from", "to", relation_type),
    FOREIGN KEY ("from") REFERENCES entities(name) ON DELETE CASCADE,
    FOREIGN KEY ("to") REFERENCES entities(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);
CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(parent_name);
CREATE INDEX IF NOT EXISTS idx_entities_importance ON entities(importance);
CREATE INDEX IF NOT EXISTS idx_entities_last_modified ON entities(last_modified);
CREATE INDEX IF NOT EXISTS idx_entities_created_at ON entities(created_at);
CREATE INDEX IF NOT EXISTS idx_entities_type_importance ON entities(entity_type, importance);
CREATE INDEX IF NOT EXISTS idx_relations_from ON relations("from");
CREATE INDEX IF NOT EXISTS idx_relations_to ON relations("to");
CREATE INDEX IF NOT EXISTS idx_relations_type ON relations(relation_type);

CREATE VIRTUAL TABLE IF NOT EXISTS entities_fts USING fts5(
    name,
    entity_type,
    observations,
    tags,
    content='entities',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS entities_ai AFTER INSERT ON entities BEGIN
    INSERT INTO entities_fts(rowid, name, entity_type, observations, tags)
    VALUES (NEW.rowid, NEW.name, NEW.entity_type, NEW.observations, NEW.tags);
END;

CREATE TRIGGER IF NOT EXISTS entities_ad AFTER DELETE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, entity_type, observations, tags)
    VALUES ('delete', OLD.rowid, OLD.name, OLD.entity_type, OLD.observations, OLD.tags);
END;

CREATE TRIGGER IF NOT EXISTS entities_au AFTER UPDATE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, entity_type, observations, tags)
    VALUES ('delete', OLD.rowid, OLD.name, OLD.entity_type, OLD.observations, OLD.tags);
    INSERT INTO entities_fts(rowid, name, entity_type, observations, tags)
    VALUES (NEW.rowid, NEW.name, NEW.entity_type, NEW.observations, NEW.tags);
END;

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

const MIGRATION_V2_UP: &str = r#"
ALTER TABLE entities ADD COLUMN memory_type TEXT;
ALTER TABLE entities ADD COLUMN session_id TEXT;
ALTER TABLE entities ADD COLUMN task_id TEXT;
ALTER TABLE entities ADD COLUMN expires_at TEXT;
ALTER TABLE entities ADD COLUMN is_working_memory INTEGER NOT NULL DEFAULT 0;
ALTER TABLE entities ADD COLUMN access_count INTEGER NOT NULL DEFAULT 0;
ALTER TABLE entities ADD COLUMN last_accessed_at TEXT;
ALTER TABLE entities ADD COLUMN confidence REAL;
ALTER TABLE entities ADD COLUMN confirmation_count INTEGER NOT NULL DEFAULT 0;
ALTER TABLE entities ADD COLUMN marked_for_promotion INTEGER NOT NULL DEFAULT 0;
ALTER TABLE entities ADD COLUMN visibility TEXT NOT NULL DEFAULT 'private';
ALTER TABLE entities ADD COLUMN agent_id TEXT;
ALTER TABLE entities ADD COLUMN promoted_at TEXT;
ALTER TABLE entities ADD COLUMN promoted_from TEXT;

CREATE INDEX IF NOT EXISTS idx_entities_session ON entities(session_id);
CREATE INDEX IF NOT EXISTS idx_entities_memory_type ON entities(memory_type);
CREATE INDEX IF NOT EXISTS idx_entities_expires_at ON entities(expires_at);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL);",
    )?;
    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .unwrap_or(0);
    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
        }
    }
    Ok(())
}
