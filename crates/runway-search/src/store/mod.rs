//! Read access to the airport corpus.
//!
//! The search path only needs the four queries on [`CorpusStore`]. Two
//! implementations ship: [`SqliteCatalog`] over the on-disk catalog and
//! [`MemoryCatalog`] for tests and small embedded corpora.

mod memory;
mod sqlite;

use std::fmt;

use anyhow::Result;
use runway_core::db::keyword::KeywordHit;
use runway_core::{Airport, AirportId};

use crate::semantic::VectorHit;

pub use memory::MemoryCatalog;
pub use sqlite::{DEFAULT_POOL_SIZE, SqliteCatalog};

/// Which stored vector a KNN query compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorField {
    Name,
    City,
}

impl fmt::Display for VectorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::City => "city",
        })
    }
}

/// Corpus queries used by the candidate strategies and hydration.
///
/// Implementations are called concurrently from strategy workers.
pub trait CorpusStore: Send + Sync {
    /// Airports matching the keyword predicates, at most one hit per airport
    /// labelled with its best predicate, best priority first then by id.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be queried.
    fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>>;

    /// Nearest stored vectors on `field`, ascending distance then id.
    /// Airports lacking that vector are excluded.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be queried or a stored vector is corrupt.
    fn nearest(&self, field: VectorField, embedding: &[f32], limit: usize)
    -> Result<Vec<VectorHit>>;

    /// Full records for `ids`, in request order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be queried or a record is invalid.
    fn fetch(&self, ids: &[AirportId]) -> Result<Vec<Airport>>;
}
