//! Cosine KNN over the catalog's stored name/city vectors.
//!
//! With sqlite-vec registered the distance is computed in SQL; otherwise each
//! stored vector is decoded and compared in Rust. Both paths return the same
//! ordering: ascending distance, then ascending airport id.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use runway_core::AirportId;
use runway_core::model::embedding::{cosine_distance, decode_embedding_json, encode_embedding_json};
use tracing::debug;

use crate::store::VectorField;

/// A stored vector near the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub airport_id: AirportId,
    /// Cosine distance in `[0, 2]`.
    pub distance: f32,
}

impl VectorHit {
    /// Cosine similarity `1 - distance`.
    #[must_use]
    pub fn similarity(self) -> f32 {
        1.0 - self.distance
    }
}

const NAME_VEC_SQL: &str = "
SELECT airport_id, distance
FROM (
    SELECT airport_id,
           vec_distance_cosine(vec_f32(name_embedding), vec_f32(?1)) AS distance
    FROM airports
    WHERE name_embedding IS NOT NULL
)
WHERE distance IS NOT NULL
ORDER BY distance ASC, airport_id ASC
LIMIT ?2";

const CITY_VEC_SQL: &str = "
SELECT airport_id, distance
FROM (
    SELECT airport_id,
           vec_distance_cosine(vec_f32(city_embedding), vec_f32(?1)) AS distance
    FROM airports
    WHERE city_embedding IS NOT NULL
)
WHERE distance IS NOT NULL
ORDER BY distance ASC, airport_id ASC
LIMIT ?2";

const NAME_SCAN_SQL: &str =
    "SELECT airport_id, name_embedding FROM airports WHERE name_embedding IS NOT NULL";
const CITY_SCAN_SQL: &str =
    "SELECT airport_id, city_embedding FROM airports WHERE city_embedding IS NOT NULL";

/// Nearest `limit` airports to `query_embedding` on `field`.
///
/// Airports without a vector for `field` never appear. A stored vector that
/// fails to decode is an error, not a skip.
///
/// # Errors
///
/// Fails on SQL errors or corrupt stored vectors.
pub fn knn_search(
    db: &Connection,
    field: VectorField,
    query_embedding: &[f32],
    limit: usize,
    use_sqlite_vec: bool,
) -> Result<Vec<VectorHit>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    if use_sqlite_vec {
        return knn_sqlite_vec(db, field, query_embedding, limit);
    }
    knn_scan(db, field, query_embedding, limit)
}

fn knn_sqlite_vec(
    db: &Connection,
    field: VectorField,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<VectorHit>> {
    let sql = match field {
        VectorField::Name => NAME_VEC_SQL,
        VectorField::City => CITY_VEC_SQL,
    };
    let query_json = encode_embedding_json(query_embedding);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = db
        .prepare_cached(sql)
        .with_context(|| format!("prepare sqlite-vec {field} KNN"))?;
    let rows = stmt
        .query_map(params![query_json, limit], |row| {
            Ok((row.get::<_, AirportId>(0)?, row.get::<_, f64>(1)?))
        })
        .with_context(|| format!("execute sqlite-vec {field} KNN"))?;

    let mut hits = Vec::new();
    for row in rows {
        let (airport_id, distance) = row.context("read sqlite-vec KNN row")?;
        #[allow(clippy::cast_possible_truncation)]
        let distance = distance as f32;
        hits.push(VectorHit {
            airport_id,
            distance,
        });
    }
    Ok(hits)
}

fn knn_scan(
    db: &Connection,
    field: VectorField,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<VectorHit>> {
    let sql = match field {
        VectorField::Name => NAME_SCAN_SQL,
        VectorField::City => CITY_SCAN_SQL,
    };
    let mut stmt = db
        .prepare_cached(sql)
        .with_context(|| format!("prepare {field} vector scan"))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, AirportId>(0)?, row.get::<_, String>(1)?))
        })
        .with_context(|| format!("execute {field} vector scan"))?;

    let mut hits = Vec::new();
    for row in rows {
        let (airport_id, raw) = row.context("read vector scan row")?;
        let stored = decode_embedding_json(&raw)
            .with_context(|| format!("airport {airport_id}: stored {field} vector"))?;
        if stored.len() != query_embedding.len() {
            bail!(
                "query embedding has {} values, stored vectors have {}",
                query_embedding.len(),
                stored.len()
            );
        }
        let Some(distance) = cosine_distance(query_embedding, &stored) else {
            debug!(airport_id, %field, "zero-norm stored vector skipped");
            continue;
        };
        hits.push(VectorHit {
            airport_id,
            distance,
        });
    }

    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.airport_id.cmp(&b.airport_id))
    });
    hits.truncate(limit);
    Ok(hits)
}
