pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- shows table (configured reference data)
CREATE TABLE IF NOT EXISTS shows (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    url_template TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- parties table
CREATE TABLE IF NOT EXISTS parties (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

-- political_areas table
CREATE TABLE IF NOT EXISTS political_areas (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT
);

-- politicians table
CREATE TABLE IF NOT EXISTS politicians (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    party_id INTEGER REFERENCES parties(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_politicians_name ON politicians(name COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS politician_aliases (
    politician_id INTEGER NOT NULL REFERENCES politicians(id) ON DELETE CASCADE,
    alias TEXT NOT NULL,
    UNIQUE(politician_id, alias)
);

CREATE TABLE IF NOT EXISTS politician_areas (
    politician_id INTEGER NOT NULL REFERENCES politicians(id) ON DELETE CASCADE,
    area_id INTEGER NOT NULL REFERENCES political_areas(id) ON DELETE CASCADE,
    UNIQUE(politician_id, area_id)
);

-- episodes table; (show_id, air_date, slug) is the natural key
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    show_id TEXT NOT NULL REFERENCES shows(id),
    air_date TEXT NOT NULL,
    slug TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(show_id, air_date, slug)
);

CREATE INDEX IF NOT EXISTS idx_episodes_air_date ON episodes(air_date DESC);

-- guest_appearances table; guest_key is "p:<politician id>" or "u:<canonical name>"
CREATE TABLE IF NOT EXISTS guest_appearances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    episode_id INTEGER NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    guest_key TEXT NOT NULL,
    politician_id INTEGER REFERENCES politicians(id),
    party_id INTEGER REFERENCES parties(id),
    political_area_ids TEXT NOT NULL DEFAULT '[]',
    raw_name TEXT NOT NULL,
    pending_review INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(episode_id, guest_key)
);

CREATE INDEX IF NOT EXISTS idx_guest_appearances_episode ON guest_appearances(episode_id);
CREATE INDEX IF NOT EXISTS idx_guest_appearances_politician ON guest_appearances(politician_id);
CREATE INDEX IF NOT EXISTS idx_guest_appearances_pending ON guest_appearances(pending_review);
"#;
