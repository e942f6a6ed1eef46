//! `runway stats`: catalog record and embedding counts.

use std::path::Path;

use clap::Args;
use runway_core::config::EmbedderChoice;
use runway_core::db::catalog::catalog_stats;
use runway_search::SqliteCatalog;
use runway_search::semantic::is_semantic_available;
use serde::Serialize;

use super::CommandContext;
use crate::output::{pretty_kv, pretty_section, render_mode};

/// Arguments for `runway stats`.
#[derive(Args, Debug, Default)]
#[command(about = "Show catalog record and embedding counts")]
pub struct StatsArgs {}

/// Report payload for `runway stats`.
#[derive(Debug, Serialize)]
pub struct CatalogReport {
    pub catalog: String,
    pub airports: u64,
    pub with_name_embedding: u64,
    pub with_city_embedding: u64,
    pub indexed_with: Option<String>,
    pub configured_embedder: EmbedderChoice,
    /// ONNX model files present and the runtime compiled in.
    pub semantic_model: bool,
    pub sqlite_vec: bool,
}

/// Execute `runway stats`.
///
/// # Errors
///
/// Fails when the catalog is missing or cannot be queried.
pub fn run_stats(_args: &StatsArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    let stats = catalog_stats(&ctx.open_existing_catalog()?)?;
    let sqlite_vec = ctx.config.catalog.vector_extension && vector_extension_loads(&ctx.db_path);
    let semantic_model = ctx
        .config
        .search
        .resolved_model_dir()
        .is_ok_and(|dir| is_semantic_available(&dir));

    let report = CatalogReport {
        catalog: ctx.db_path.display().to_string(),
        airports: stats.airports,
        with_name_embedding: stats.with_name_embedding,
        with_city_embedding: stats.with_city_embedding,
        indexed_with: stats.embedder_id,
        configured_embedder: ctx.config.search.embedder,
        semantic_model,
        sqlite_vec,
    };

    render_mode(
        ctx.output,
        &report,
        |r, w| {
            writeln!(
                w,
                "airports={} name_embeddings={} city_embeddings={} indexed_with={} sqlite_vec={}",
                r.airports,
                r.with_name_embedding,
                r.with_city_embedding,
                r.indexed_with.as_deref().unwrap_or("-"),
                r.sqlite_vec
            )
        },
        |r, w| {
            pretty_section(w, "Catalog")?;
            pretty_kv(w, "path", &r.catalog)?;
            pretty_kv(w, "airports", r.airports.to_string())?;
            pretty_kv(w, "name embeddings", r.with_name_embedding.to_string())?;
            pretty_kv(w, "city embeddings", r.with_city_embedding.to_string())?;
            pretty_kv(w, "indexed with", r.indexed_with.as_deref().unwrap_or("(not indexed)"))?;
            pretty_kv(w, "embedder", format!("{:?}", r.configured_embedder).to_lowercase())?;
            pretty_kv(
                w,
                "semantic model",
                if r.semantic_model { "available" } else { "unavailable" },
            )?;
            pretty_kv(w, "sqlite-vec", if r.sqlite_vec { "yes" } else { "no (in-process scan)" })
        },
    )
}

fn vector_extension_loads(path: &Path) -> bool {
    SqliteCatalog::open(path, 1, true).is_ok_and(|store| store.uses_sqlite_vec())
}
