//! `runway index`: compute name and city embeddings for the catalog.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use runway_search::semantic::sync_catalog_embeddings;
use serde::Serialize;
use tracing::info;

use super::CommandContext;
use crate::output::render;

#[derive(Args, Debug)]
#[command(
    about = "Compute name and city embeddings for catalog airports",
    long_about = "Embed every airport whose vectors are missing or were computed from \
                  different text or by a different embedder. Already-current rows are skipped.",
    after_help = "EXAMPLES:\n    # Embed new and changed airports\n    runway index\n\n\
                  # Re-embed everything (e.g. after switching embedder)\n    runway index --force"
)]
pub struct IndexArgs {
    /// Re-embed every airport, including rows that look current.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct IndexReport {
    embedder: String,
    scanned: usize,
    embedded: usize,
    skipped: usize,
}

/// Execute `runway index`.
///
/// # Errors
///
/// Fails when the catalog is missing, the embedder cannot be built, or an
/// embedding or write fails.
pub fn run_index(args: &IndexArgs, ctx: &CommandContext) -> Result<()> {
    let mut conn = ctx.open_existing_catalog()?;
    let embedder = ctx.embedder()?;

    let stats = sync_catalog_embeddings(&mut conn, embedder.as_ref(), args.force)?;
    info!(
        embedder = embedder.id(),
        scanned = stats.scanned,
        embedded = stats.embedded,
        skipped = stats.skipped,
        "index complete"
    );

    let report = IndexReport {
        embedder: embedder.id().to_string(),
        scanned: stats.scanned,
        embedded: stats.embedded,
        skipped: stats.skipped,
    };
    render(ctx.output, &report, |r, w: &mut dyn Write| {
        writeln!(
            w,
            "embedded {} of {} airports with {} ({} already current)",
            r.embedded, r.scanned, r.embedder, r.skipped
        )
    })
}
