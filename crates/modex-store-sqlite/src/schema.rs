//! SQL schema for the modex SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per module version. Rewritten in full by every replace.
CREATE TABLE IF NOT EXISTS modules (
    module_path        TEXT NOT NULL,
    version            TEXT NOT NULL,   -- semver, no leading 'v'
    commit_time        TEXT NOT NULL,   -- RFC 3339 UTC
    source_json        TEXT,            -- JSON-encoded SourceInfo or NULL
    is_redistributable INTEGER NOT NULL,
    has_manifest       INTEGER NOT NULL,
    licenses_json      TEXT NOT NULL DEFAULT '[]',
    deprecated         INTEGER NOT NULL DEFAULT 0,
    deprecation_reason TEXT NOT NULL DEFAULT '',
    retracted          INTEGER NOT NULL DEFAULT 0,
    retraction_reason  TEXT NOT NULL DEFAULT '',
    digest             TEXT NOT NULL,   -- sha256 over module + units
    updated_at         TEXT NOT NULL,
    PRIMARY KEY (module_path, version)
);

-- Units are deleted and reinserted as a set inside the replace transaction.
CREATE TABLE IF NOT EXISTS units (
    module_path        TEXT NOT NULL,
    version            TEXT NOT NULL,
    path               TEXT NOT NULL,
    name               TEXT NOT NULL,
    is_redistributable INTEGER NOT NULL,
    licenses_json      TEXT NOT NULL DEFAULT '[]',
    readme_path        TEXT,
    readme_contents    TEXT,
    synopsis           TEXT,            -- documentation columns are all NULL
    doc_html           TEXT,            -- or all set
    doc_os             TEXT,
    doc_arch           TEXT,
    PRIMARY KEY (module_path, version, path),
    FOREIGN KEY (module_path, version)
        REFERENCES modules(module_path, version) ON DELETE CASCADE
);

-- Outcome of the latest ingestion attempt per key; independent of units.
CREATE TABLE IF NOT EXISTS version_states (
    module_path  TEXT NOT NULL,
    version      TEXT NOT NULL,
    status       TEXT NOT NULL,   -- 'stored' | 'unchanged' | ErrorKind
    error        TEXT,
    unit_count   INTEGER NOT NULL,
    attempted_at TEXT NOT NULL,
    PRIMARY KEY (module_path, version)
);

CREATE INDEX IF NOT EXISTS units_path_idx ON units(path, version);

PRAGMA user_version = 1;
";
