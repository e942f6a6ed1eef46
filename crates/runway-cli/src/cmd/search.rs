//! `runway search`: resolve a free-text query to ranked airports.
//!
//! Runs the keyword, name-vector and city-vector strategies concurrently
//! under one deadline and fuses them by airport.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use runway_core::db::catalog::{CatalogStats, catalog_stats};
use runway_search::store::DEFAULT_POOL_SIZE;
use runway_search::{HybridSearcher, Limit, SearchOptions, SearchResponse, SqliteCatalog};
use tracing::warn;

use super::CommandContext;
use crate::output::{CliError, pretty_rule, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
#[command(
    about = "Search airports by code, name, or city",
    long_about = "Resolve a free-text query to catalog airports.\n\n\
                  Exact IATA/ICAO codes rank first, then name and city substring matches, \
                  then semantic matches on the airport name and city embeddings. \
                  A trailing \" Airport\" in the query is ignored.",
    after_help = "EXAMPLES:\n    # Look up by IATA code\n    runway search JFK\n\n\
                  # Free text\n    runway search \"Heathrow Airport\"\n\n\
                  # Limit results\n    runway search york -n 3\n\n\
                  # Machine-readable output\n    runway search \"new york\" --json"
)]
pub struct SearchArgs {
    /// Free-text query: an airport code, a name, or a city.
    pub query: String,

    /// Maximum number of results. Non-positive or non-integer values fall
    /// back to `[search].default_limit`.
    #[arg(short = 'n', long, allow_hyphen_values = true)]
    pub limit: Option<String>,
}

/// Execute `runway search <query>`.
///
/// # Errors
///
/// Fails when the catalog is missing, the embedder cannot be built, or the
/// search itself fails; the classified error is rendered before returning.
pub fn run_search(args: &SearchArgs, ctx: &CommandContext) -> anyhow::Result<()> {
    let fallback = Limit::new(ctx.config.search.default_limit);
    let limit = args
        .limit
        .as_deref()
        .map_or(fallback, |raw| Limit::parse_or(raw, fallback));

    let stats = catalog_stats(&ctx.open_existing_catalog()?)?;
    let embedder = ctx.embedder()?;
    warn_on_index_mismatch(&stats, embedder.id());

    let store = SqliteCatalog::open(
        &ctx.db_path,
        DEFAULT_POOL_SIZE,
        ctx.config.catalog.vector_extension,
    )?;
    let options = SearchOptions::from_config(&ctx.config.search);
    let searcher = HybridSearcher::with_options(Arc::new(store), embedder, options)
        .or_else(|err| {
            render_error(ctx.output, &CliError::from(&err))?;
            Err(anyhow::Error::new(err))
        })?;

    match searcher.search(&args.query, limit) {
        Ok(response) => render_mode(ctx.output, &response, render_text, render_pretty),
        Err(err) => {
            render_error(ctx.output, &CliError::from(&err))?;
            Err(err.into())
        }
    }
}

fn warn_on_index_mismatch(stats: &CatalogStats, embedder_id: &str) {
    if stats.airports > 0 && stats.with_name_embedding == 0 && stats.with_city_embedding == 0 {
        warn!("catalog has no embeddings; only keyword matches are possible. Run `runway index`");
        return;
    }
    if let Some(indexed) = stats.embedder_id.as_deref()
        && indexed != embedder_id
    {
        warn!(
            indexed,
            configured = embedder_id,
            "catalog was indexed with a different embedder; run `runway index --force`"
        );
    }
}

fn render_text(response: &SearchResponse, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "id\tiata\ticao\tscore\tmatched_by\tname\tcity\tcountry\ttimezone")?;
    for airport in &response.airports {
        writeln!(
            w,
            "{}\t{}\t{}\t{:.4}\t{}\t{}\t{}\t{}\t{}",
            airport.airport_id,
            airport.iata.as_deref().unwrap_or("-"),
            airport.icao.as_deref().unwrap_or("-"),
            airport.similarity_score,
            airport.matched_by,
            airport.name,
            airport.city,
            airport.country,
            airport.timezone,
        )?;
    }
    Ok(())
}

fn render_pretty(response: &SearchResponse, w: &mut dyn Write) -> std::io::Result<()> {
    if response.airports.is_empty() {
        return writeln!(w, "No airports match '{}'.", response.query.trim());
    }

    let noun = if response.result_count == 1 { "result" } else { "results" };
    pretty_section(
        w,
        &format!("{} {noun} for '{}'", response.result_count, response.query.trim()),
    )?;
    for airport in &response.airports {
        let codes = match (&airport.iata, &airport.icao) {
            (Some(iata), Some(icao)) => format!("{iata}/{icao}"),
            (Some(code), None) | (None, Some(code)) => code.clone(),
            (None, None) => "-".to_string(),
        };
        writeln!(
            w,
            "{:.4}  {codes:<9} {} ({}, {})",
            airport.similarity_score, airport.name, airport.city, airport.country
        )?;
        writeln!(
            w,
            "        #{}  {}  matched by {}",
            airport.airport_id, airport.timezone, airport.matched_by
        )?;
    }
    pretty_rule(w)?;
    let total = Duration::from_micros(response.timing.total_us);
    writeln!(w, "{:.1} ms", total.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runway_core::MatchKind;
    use runway_search::{AirportMatch, SearchTiming};

    fn response() -> SearchResponse {
        SearchResponse {
            query: "JFK Airport".to_string(),
            result_count: 1,
            airports: vec![AirportMatch {
                airport_id: 3797,
                name: "John F Kennedy International Airport".to_string(),
                city: "New York".to_string(),
                country: "United States".to_string(),
                iata: Some("JFK".to_string()),
                icao: Some("KJFK".to_string()),
                timezone: "America/New_York".to_string(),
                similarity_score: 1.0,
                matched_by: MatchKind::Iata,
            }],
            timing: SearchTiming::default(),
        }
    }

    #[test]
    fn text_rows_are_tab_separated() {
        let mut buf = Vec::new();
        render_text(&response(), &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        let row = out.lines().nth(1).expect("one row");
        assert_eq!(
            row,
            "3797\tJFK\tKJFK\t1.0000\tiata\tJohn F Kennedy International Airport\tNew York\tUnited States\tAmerica/New_York"
        );
    }

    #[test]
    fn pretty_output_names_match_kind() {
        let mut buf = Vec::new();
        render_pretty(&response(), &mut buf).expect("render");
        let out = String::from_utf8(buf).expect("utf8");
        assert!(out.starts_with("1 result for 'JFK Airport'"));
        assert!(out.contains("JFK/KJFK"));
        assert!(out.contains("matched by iata"));
    }

    #[test]
    fn pretty_output_for_no_results() {
        let mut empty = response();
        empty.airports.clear();
        empty.result_count = 0;
        let mut buf = Vec::new();
        render_pretty(&empty, &mut buf).expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "No airports match 'JFK Airport'.\n"
        );
    }

    #[test]
    fn limit_flag_accepts_negative_values() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(flatten)]
            args: SearchArgs,
        }

        let parsed = Harness::parse_from(["runway", "jfk", "-n", "-3"]);
        assert_eq!(parsed.args.limit.as_deref(), Some("-3"));
    }
}
