//! Airport record access: upsert, hydration by id, embedding storage, stats.
//!
//! Records read back are validated with [`Airport::validate`]; a violation
//! surfaces as an [`InvalidAirport`] inside the returned `anyhow::Error` so
//! callers can tell corrupt rows from query failures via `downcast_ref`.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

use crate::model::airport::{Airport, AirportId, InvalidAirport};
use crate::model::embedding::{check_embedding, decode_embedding_json, encode_embedding_json};

const UPSERT_SQL: &str = "
INSERT INTO airports (
    airport_id, name, city, country, iata, icao, timezone, airport_type, source,
    name_embedding, city_embedding, embedding_hash
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL)
ON CONFLICT(airport_id) DO UPDATE SET
    name_embedding = CASE
        WHEN excluded.name_embedding IS NOT NULL THEN excluded.name_embedding
        WHEN airports.name = excluded.name AND airports.city = excluded.city THEN airports.name_embedding
        ELSE NULL END,
    city_embedding = CASE
        WHEN excluded.city_embedding IS NOT NULL THEN excluded.city_embedding
        WHEN airports.name = excluded.name AND airports.city = excluded.city THEN airports.city_embedding
        ELSE NULL END,
    embedding_hash = CASE
        WHEN excluded.name_embedding IS NOT NULL OR excluded.city_embedding IS NOT NULL THEN NULL
        WHEN airports.name = excluded.name AND airports.city = excluded.city THEN airports.embedding_hash
        ELSE NULL END,
    name = excluded.name,
    city = excluded.city,
    country = excluded.country,
    iata = excluded.iata,
    icao = excluded.icao,
    timezone = excluded.timezone,
    airport_type = excluded.airport_type,
    source = excluded.source
";

const SELECT_COLUMNS: &str =
    "airport_id, name, city, country, iata, icao, timezone, airport_type, source";

/// Counts reported by `runway stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub airports: u64,
    pub with_name_embedding: u64,
    pub with_city_embedding: u64,
    pub embedder_id: Option<String>,
}

/// A row as seen by the embedding pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingState {
    pub airport_id: AirportId,
    pub name: String,
    pub city: String,
    pub embedding_hash: Option<String>,
    pub has_name_embedding: bool,
    pub has_city_embedding: bool,
}

/// Insert or update one record.
///
/// Stored vectors survive an update unless the name or city changed; vectors
/// carried on `airport` replace them.
///
/// # Errors
///
/// Fails on invariant violations or SQL errors.
pub fn upsert_airport(conn: &Connection, airport: &Airport) -> Result<()> {
    airport.validate()?;

    let name_embedding = airport.name_embedding.as_deref().map(encode_embedding_json);
    let city_embedding = airport.city_embedding.as_deref().map(encode_embedding_json);

    conn.execute(
        UPSERT_SQL,
        params![
            airport.airport_id,
            airport.name,
            airport.city,
            airport.country,
            airport.iata,
            airport.icao,
            airport.timezone,
            airport.airport_type,
            airport.source,
            name_embedding,
            city_embedding,
        ],
    )
    .with_context(|| format!("upsert airport {}", airport.airport_id))?;
    Ok(())
}

/// Upsert a batch inside one transaction. Returns the number written.
///
/// # Errors
///
/// The whole batch rolls back on the first failure.
pub fn upsert_airports(conn: &mut Connection, airports: &[Airport]) -> Result<usize> {
    let tx = conn.transaction().context("begin import transaction")?;
    for airport in airports {
        upsert_airport(&tx, airport)?;
    }
    tx.commit().context("commit import transaction")?;
    Ok(airports.len())
}

/// Load records (without vectors) for `ids`, in the order given.
/// Unknown ids are skipped.
///
/// # Errors
///
/// Fails on SQL errors or when a stored row violates invariants.
pub fn load_airports(conn: &Connection, ids: &[AirportId]) -> Result<Vec<Airport>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT {SELECT_COLUMNS} FROM airports WHERE airport_id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql).context("prepare airport hydration")?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), read_airport)
        .context("execute airport hydration")?;

    let mut by_id = std::collections::HashMap::with_capacity(ids.len());
    for row in rows {
        let airport = row.context("read airport row")?;
        airport.validate()?;
        by_id.insert(airport.airport_id, airport);
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Load one record including its stored vectors.
///
/// # Errors
///
/// Fails on SQL errors, malformed vectors, or invariant violations.
pub fn load_airport_with_embeddings(conn: &Connection, id: AirportId) -> Result<Option<Airport>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS}, name_embedding, city_embedding FROM airports WHERE airport_id = ?1"
    );
    let row = conn
        .query_row(&sql, params![id], |row| {
            Ok((
                read_airport(row)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, Option<String>>(10)?,
            ))
        })
        .optional()
        .with_context(|| format!("load airport {id}"))?;

    let Some((mut airport, name_json, city_json)) = row else {
        return Ok(None);
    };

    for (field, raw, slot) in [
        ("name_embedding", name_json, &mut airport.name_embedding),
        ("city_embedding", city_json, &mut airport.city_embedding),
    ] {
        if let Some(raw) = raw {
            let embedding = decode_embedding_json(&raw).map_err(|source| {
                InvalidAirport::Embedding {
                    airport_id: id,
                    field,
                    source,
                }
            })?;
            *slot = Some(embedding);
        }
    }

    airport.validate()?;
    Ok(Some(airport))
}

/// Every row with what the embedding pipeline needs to decide staleness.
///
/// # Errors
///
/// Fails on SQL errors.
pub fn embedding_states(conn: &Connection) -> Result<Vec<EmbeddingState>> {
    let mut stmt = conn
        .prepare(
            "SELECT airport_id, name, city, embedding_hash,
                    name_embedding IS NOT NULL, city_embedding IS NOT NULL
             FROM airports ORDER BY airport_id",
        )
        .context("prepare embedding state query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(EmbeddingState {
                airport_id: row.get(0)?,
                name: row.get(1)?,
                city: row.get(2)?,
                embedding_hash: row.get(3)?,
                has_name_embedding: row.get(4)?,
                has_city_embedding: row.get(5)?,
            })
        })
        .context("execute embedding state query")?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("read embedding state row")
}

/// Write both vectors and the content hash for one airport.
///
/// # Errors
///
/// Fails on a wrong dimension, non-finite values, a missing row, or SQL errors.
pub fn store_embeddings(
    conn: &Connection,
    airport_id: AirportId,
    name_embedding: &[f32],
    city_embedding: &[f32],
    content_hash: &str,
) -> Result<()> {
    check_embedding(name_embedding)
        .with_context(|| format!("name embedding for airport {airport_id}"))?;
    check_embedding(city_embedding)
        .with_context(|| format!("city embedding for airport {airport_id}"))?;

    let updated = conn
        .execute(
            "UPDATE airports
             SET name_embedding = ?1, city_embedding = ?2, embedding_hash = ?3
             WHERE airport_id = ?4",
            params![
                encode_embedding_json(name_embedding),
                encode_embedding_json(city_embedding),
                content_hash,
                airport_id
            ],
        )
        .with_context(|| format!("store embeddings for airport {airport_id}"))?;

    if updated == 0 {
        anyhow::bail!("cannot store embeddings: airport {airport_id} not found");
    }
    Ok(())
}

/// Record which embedder produced the stored vectors.
///
/// # Errors
///
/// Fails on SQL errors.
pub fn set_embedder_id(conn: &Connection, embedder_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE catalog_meta SET embedder_id = ?1 WHERE id = 1",
        params![embedder_id],
    )
    .context("record embedder id")?;
    Ok(())
}

/// Embedder recorded by the last indexing run, if any.
///
/// # Errors
///
/// Fails on SQL errors.
pub fn embedder_id(conn: &Connection) -> Result<Option<String>> {
    conn.query_row("SELECT embedder_id FROM catalog_meta WHERE id = 1", [], |row| {
        row.get(0)
    })
    .optional()
    .map(Option::flatten)
    .context("read embedder id")
}

/// Record and embedding counts.
///
/// # Errors
///
/// Fails on SQL errors.
pub fn catalog_stats(conn: &Connection) -> Result<CatalogStats> {
    let (airports, with_name, with_city): (i64, i64, i64) = conn
        .query_row(
            "SELECT COUNT(*),
                    COUNT(name_embedding),
                    COUNT(city_embedding)
             FROM airports",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .context("count airports")?;

    Ok(CatalogStats {
        airports: u64::try_from(airports).unwrap_or(0),
        with_name_embedding: u64::try_from(with_name).unwrap_or(0),
        with_city_embedding: u64::try_from(with_city).unwrap_or(0),
        embedder_id: embedder_id(conn)?,
    })
}

/// Map a row selected with `SELECT_COLUMNS` (columns 0..=8).
pub(crate) fn read_airport(row: &Row<'_>) -> rusqlite::Result<Airport> {
    Ok(Airport {
        airport_id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        country: row.get(3)?,
        iata: row.get(4)?,
        icao: row.get(5)?,
        timezone: row.get(6)?,
        airport_type: row.get(7)?,
        source: row.get(8)?,
        name_embedding: None,
        city_embedding: None,
    })
}
