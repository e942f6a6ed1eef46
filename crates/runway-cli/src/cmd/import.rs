//! `runway import`: load airport records from JSON Lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use runway_core::db::catalog::upsert_airports;
use runway_core::db::open_catalog;
use runway_core::error::ErrorCode;
use runway_core::{Airport, AirportId};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::CommandContext;
use crate::output::{CliError, render, render_error};

#[derive(Args, Debug)]
#[command(
    about = "Import airport records from JSON Lines",
    long_about = "Upsert airport records into the catalog, creating it if needed.\n\n\
                  Each line is one object with airport_id, name, city, country, timezone and \
                  optional iata, icao, type, source, name_embedding and city_embedding. \
                  Codes of \"\\N\" or \"\" are stored as absent. The whole file is applied in \
                  one transaction: any invalid line rejects the import.",
    after_help = "EXAMPLES:\n    # Import a file\n    runway import --file airports.jsonl\n\n\
                  # Import from stdin\n    cat airports.jsonl | runway import"
)]
pub struct ImportArgs {
    /// JSONL file to read; omit to read from stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// One input line.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    airport_id: AirportId,
    name: String,
    city: String,
    country: String,
    #[serde(default)]
    iata: Option<String>,
    #[serde(default)]
    icao: Option<String>,
    timezone: String,
    #[serde(default, rename = "type")]
    airport_type: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    name_embedding: Option<Vec<f32>>,
    #[serde(default)]
    city_embedding: Option<Vec<f32>>,
}

impl ImportRecord {
    fn into_airport(self) -> Airport {
        let mut airport = Airport::new(
            self.airport_id,
            self.name,
            self.city,
            self.country,
            self.timezone,
        )
        .with_codes(self.iata.as_deref(), self.icao.as_deref());
        airport.airport_type = present(self.airport_type);
        airport.source = present(self.source);
        airport.name_embedding = self.name_embedding;
        airport.city_embedding = self.city_embedding;
        airport
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && v != "\\N"
    })
}

#[derive(Debug, Serialize)]
struct ImportReport {
    source: String,
    lines: usize,
    imported: usize,
}

/// A line that could not be turned into a valid record.
#[derive(Debug)]
struct BadLine {
    line: usize,
    reason: String,
}

fn parse_records(reader: impl BufRead) -> Result<Result<(Vec<Airport>, usize), BadLine>> {
    let mut airports = Vec::new();
    let mut lines = 0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("read import input")?;
        lines = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<ImportRecord>(&line) {
            Ok(record) => record,
            Err(err) => {
                return Ok(Err(BadLine {
                    line: idx + 1,
                    reason: err.to_string(),
                }));
            }
        };
        let airport = record.into_airport();
        if let Err(err) = airport.validate() {
            return Ok(Err(BadLine {
                line: idx + 1,
                reason: err.to_string(),
            }));
        }
        airports.push(airport);
    }
    Ok(Ok((airports, lines)))
}

/// Execute `runway import`.
///
/// # Errors
///
/// Fails when the input cannot be read, a line is not a valid record, or the
/// catalog write fails.
pub fn run_import(args: &ImportArgs, ctx: &CommandContext) -> Result<()> {
    let (parsed, source) = match &args.file {
        Some(path) => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(err) => {
                    render_error(
                        ctx.output,
                        &CliError::new(format!("cannot open {}: {err}", path.display())),
                    )?;
                    return Err(err).with_context(|| format!("open {}", path.display()));
                }
            };
            (
                parse_records(BufReader::new(file))?,
                path.display().to_string(),
            )
        }
        None => (parse_records(io::stdin().lock())?, "<stdin>".to_string()),
    };

    let (airports, lines) = match parsed {
        Ok(parsed) => parsed,
        Err(bad) => {
            render_error(
                ctx.output,
                &CliError::from_code(
                    ErrorCode::InvalidRecord,
                    format!("{source} line {}: {}", bad.line, bad.reason),
                ),
            )?;
            anyhow::bail!("invalid record on line {}", bad.line);
        }
    };

    let mut conn = open_catalog(&ctx.db_path)?;
    let imported = upsert_airports(&mut conn, &airports)?;
    info!(source = %source, imported, catalog = %ctx.db_path.display(), "import complete");

    let report = ImportReport {
        source,
        lines,
        imported,
    };
    render(ctx.output, &report, |r, w: &mut dyn Write| {
        writeln!(w, "imported {} airports from {}", r.imported, r.source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JFK: &str = r#"{"airport_id":3797,"name":"John F Kennedy International Airport","city":"New York","country":"United States","iata":"JFK","icao":"KJFK","timezone":"America/New_York","type":"airport","source":"OurAirports"}"#;

    fn parse(input: &str) -> Result<(Vec<Airport>, usize), BadLine> {
        parse_records(input.as_bytes()).expect("readable")
    }

    #[test]
    fn parses_records_and_skips_blank_lines() {
        let input = format!("{JFK}\n\n");
        let (airports, lines) = parse(&input).expect("valid");
        assert_eq!(airports.len(), 1);
        assert_eq!(lines, 2);
        assert_eq!(airports[0].iata.as_deref(), Some("JFK"));
        assert_eq!(airports[0].airport_type.as_deref(), Some("airport"));
    }

    #[test]
    fn null_markers_become_absent() {
        let line = r#"{"airport_id":1,"name":"Goroka Airport","city":"Goroka","country":"Papua New Guinea","iata":"\\N","icao":"AYGA","timezone":"Pacific/Port_Moresby","source":"\\N"}"#;
        let (airports, _) = parse(line).expect("valid");
        assert_eq!(airports[0].iata, None);
        assert_eq!(airports[0].icao.as_deref(), Some("AYGA"));
        assert_eq!(airports[0].source, None);
    }

    #[test]
    fn malformed_json_reports_its_line() {
        let input = format!("{JFK}\n{{not json\n");
        let bad = parse(&input).expect_err("second line is broken");
        assert_eq!(bad.line, 2);
    }

    #[test]
    fn invariant_violation_reports_its_line() {
        let line = r#"{"airport_id":9,"name":"X","city":"Y","country":"Z","iata":"TOOLONG","timezone":"UTC"}"#;
        let bad = parse(line).expect_err("code too long");
        assert_eq!(bad.line, 1);
        assert!(bad.reason.contains("iata") || bad.reason.contains("IATA"), "{}", bad.reason);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let line = r#"{"airport_id":9,"name":"X","city":"Y","country":"Z"}"#;
        let bad = parse(line).expect_err("timezone missing");
        assert!(bad.reason.contains("timezone"));
    }
}
