//! SQLite catalog database utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so search readers never block an import
//! - `busy_timeout = 5s` to absorb transient lock contention
//! - `synchronous = NORMAL`

pub mod catalog;
pub mod keyword;
pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::{path::Path, time::Duration};
use tracing::{debug, warn};

/// Busy timeout used for catalog connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Register sqlite-vec for connections opened after this call.
///
/// Failure is not fatal: vector strategies fall back to an in-process scan.
pub fn enable_vector_extension() -> bool {
    match runway_sqlite_vec::register_auto_extension() {
        Ok(()) => true,
        Err(err) => {
            warn!("sqlite-vec unavailable, vector KNN will scan in-process: {err}");
            false
        }
    }
}

/// Open (or create) the catalog database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_catalog(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create catalog directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("open catalog database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply catalog migrations")?;
    debug!(path = %path.display(), "catalog opened");

    Ok(conn)
}

/// Open an existing catalog without creating or migrating it, or `None` when
/// the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or is not at
/// the latest schema version.
pub fn try_open_catalog(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open catalog database {}", path.display()))?;
    configure_connection(&conn).context("configure sqlite pragmas")?;

    let version = migrations::current_schema_version(&conn).context("read schema version")?;
    if version != migrations::LATEST_SCHEMA_VERSION {
        anyhow::bail!(
            "catalog {} is at schema v{version}, expected v{}; run `runway import` to migrate",
            path.display(),
            migrations::LATEST_SCHEMA_VERSION
        );
    }

    Ok(Some(conn))
}

/// In-memory catalog at the latest schema; used by tests and ephemeral runs.
///
/// # Errors
///
/// Returns an error if migration fails.
pub fn open_catalog_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory catalog")?;
    migrations::migrate(&mut conn).context("apply catalog migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
