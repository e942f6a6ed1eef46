use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use runway_core::db::catalog::load_airports;
use runway_core::db::keyword::{KeywordHit, keyword_lookup};
use runway_core::db::{enable_vector_extension, try_open_catalog};
use runway_core::{Airport, AirportId};
use tracing::debug;

use super::{CorpusStore, VectorField};
use crate::semantic::{VectorHit, knn_search};

/// One connection per concurrent strategy.
pub const DEFAULT_POOL_SIZE: usize = 3;

/// [`CorpusStore`] over a SQLite catalog file.
///
/// Holds a small pool of connections so the keyword and both vector
/// strategies can query at the same time.
pub struct SqliteCatalog {
    pool: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    sqlite_vec: bool,
}

impl SqliteCatalog {
    /// Open an existing, migrated catalog with `pool_size` connections.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, not at the latest schema, or cannot
    /// be opened.
    pub fn open(path: &Path, pool_size: usize, use_vector_extension: bool) -> Result<Self> {
        if use_vector_extension {
            enable_vector_extension();
        }

        let mut pool = Vec::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let conn = try_open_catalog(path)?
                .ok_or_else(|| anyhow!("catalog not found at {}", path.display()))?;
            pool.push(conn);
        }

        let sqlite_vec = use_vector_extension && pool.first().is_some_and(vec_available);
        debug!(
            path = %path.display(),
            connections = pool.len(),
            sqlite_vec,
            "catalog store opened"
        );
        Ok(Self::from_pool(pool, sqlite_vec))
    }

    /// Wrap a single already-migrated connection (e.g. in-memory).
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        let sqlite_vec = vec_available(&conn);
        Self::from_pool(vec![conn], sqlite_vec)
    }

    fn from_pool(pool: Vec<Connection>, sqlite_vec: bool) -> Self {
        Self {
            pool: pool.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
            sqlite_vec,
        }
    }

    /// Whether KNN runs through sqlite-vec rather than the in-process scan.
    #[must_use]
    pub const fn uses_sqlite_vec(&self) -> bool {
        self.sqlite_vec
    }

    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let len = self.pool.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            if let Ok(guard) = self.pool[(start + offset) % len].try_lock() {
                return f(&guard);
            }
        }

        // All busy (or poisoned): wait for our round-robin slot.
        let guard: MutexGuard<'_, Connection> = self.pool[start]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl CorpusStore for SqliteCatalog {
    fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        self.with_conn(|conn| keyword_lookup(conn, query, limit))
    }

    fn nearest(
        &self,
        field: VectorField,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        self.with_conn(|conn| knn_search(conn, field, embedding, limit, self.sqlite_vec))
            .with_context(|| format!("{field} vector search"))
    }

    fn fetch(&self, ids: &[AirportId]) -> Result<Vec<Airport>> {
        self.with_conn(|conn| load_airports(conn, ids))
    }
}

fn vec_available(conn: &Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}
