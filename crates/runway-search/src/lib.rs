#![forbid(unsafe_code)]
//! runway-search library.
//!
//! Answers a free-text airport query by running three candidate strategies
//! (keyword, name-vector, city-vector), fusing their per-airport scores and
//! ranking the union.
//!
//! # Conventions
//!
//! - **Errors**: store and provisioning code returns `anyhow::Result`; the
//!   query path surfaces [`SearchError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod candidates;
pub mod error;
pub mod fusion;
pub mod normalize;
pub mod semantic;
pub mod store;

pub use candidates::{CandidateGenerator, CandidateMatch, CandidateSets};
pub use error::{ErrorKind, ErrorReport, SearchError};
pub use fusion::{
    AirportMatch, FusedResult, HybridSearcher, Limit, SearchOptions, SearchResponse, SearchTiming,
    fuse, rank_and_limit,
};
pub use normalize::normalize_query;
pub use semantic::{EmbedError, Embedder, HashEmbedder};
pub use store::{CorpusStore, MemoryCatalog, SqliteCatalog, VectorField};
