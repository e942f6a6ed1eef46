//! Catalog schema.
//!
//! `airports` holds one row per catalog record. Codes are stored upper-cased
//! (see [`crate::model::airport::normalize_code`]); absent codes are `NULL`.
//! Embeddings are JSON arrays of 384 floats; `NULL` until `runway index`
//! has run for the row.

/// v1: base airport table and metadata singleton.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS catalog_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    embedder_id TEXT
);

INSERT OR IGNORE INTO catalog_meta (id, schema_version, embedder_id) VALUES (1, 0, NULL);

CREATE TABLE IF NOT EXISTS airports (
    airport_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT NOT NULL,
    country TEXT NOT NULL,
    iata TEXT,
    icao TEXT,
    timezone TEXT NOT NULL,
    airport_type TEXT,
    source TEXT
);

CREATE INDEX IF NOT EXISTS idx_airports_iata ON airports(iata);
CREATE INDEX IF NOT EXISTS idx_airports_icao ON airports(icao);
";

/// v2: name/city embedding columns and the staleness hash.
pub const MIGRATION_V2_SQL: &str = r"
ALTER TABLE airports ADD COLUMN name_embedding TEXT;
ALTER TABLE airports ADD COLUMN city_embedding TEXT;
ALTER TABLE airports ADD COLUMN embedding_hash TEXT;
";

/// Indexes the latest schema must contain.
pub const REQUIRED_INDEXES: &[&str] = &["idx_airports_iata", "idx_airports_icao"];
