#![forbid(unsafe_code)]
//! runway-core library.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types; typed `thiserror`
//!   enums where callers need to branch on the failure.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod timing;

pub use model::airport::{Airport, AirportId, EMBEDDING_DIM};
pub use model::match_kind::{MatchFamily, MatchKind};
