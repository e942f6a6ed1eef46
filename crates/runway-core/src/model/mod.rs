//! Catalog data model.

pub mod airport;
pub mod embedding;
pub mod match_kind;
