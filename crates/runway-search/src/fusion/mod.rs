//! Fusion of the keyword, name-vector and city-vector candidate sets into a
//! single ranked result list.

pub mod hybrid;
pub mod rank;
pub mod scoring;

pub use hybrid::{AirportMatch, HybridSearcher, SearchOptions, SearchResponse, SearchTiming};
pub use rank::{Limit, rank_and_limit, round_score};
pub use scoring::{FusedResult, fuse};
