//! Exact-code and substring lookup for the keyword strategy.
//!
//! One statement evaluates the four predicates in priority order and labels
//! each row with the first one it satisfies:
//!
//! | Priority | Predicate                                  | Kind           |
//! |----------|--------------------------------------------|----------------|
//! | 1        | `upper(iata) = upper(query)`               | `iata`         |
//! | 2        | `upper(icao) = upper(query)`               | `icao`         |
//! | 3        | `lower(name)` contains `lower(query)`      | `name_keyword` |
//! | 4        | `lower(city)` contains `lower(query)`      | `city_keyword` |
//!
//! Rows are returned best priority first, then by id, so truncation to
//! `limit` keeps code matches ahead of substring matches.
//!
//! SQLite's `lower()`/`upper()` fold ASCII only; non-ASCII letters compare
//! as-is.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::model::airport::AirportId;
use crate::model::match_kind::MatchKind;

const KEYWORD_SQL: &str = "
SELECT airport_id, priority FROM (
    SELECT airport_id,
           CASE
               WHEN iata IS NOT NULL AND upper(iata) = ?1 THEN 1
               WHEN icao IS NOT NULL AND upper(icao) = ?1 THEN 2
               WHEN instr(lower(name), ?2) > 0 THEN 3
               WHEN instr(lower(city), ?2) > 0 THEN 4
           END AS priority
    FROM airports
)
WHERE priority IS NOT NULL
ORDER BY priority, airport_id
LIMIT ?3";

/// One keyword-strategy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordHit {
    pub airport_id: AirportId,
    pub kind: MatchKind,
}

/// Run the keyword predicates for an already-normalized query.
///
/// An empty query matches nothing.
///
/// # Errors
///
/// Fails when the statement cannot be prepared or executed.
pub fn keyword_lookup(conn: &Connection, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
    if query.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let code = query.to_ascii_uppercase();
    let needle = query.to_ascii_lowercase();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut stmt = conn
        .prepare_cached(KEYWORD_SQL)
        .context("prepare keyword lookup")?;
    let rows = stmt
        .query_map(params![code, needle, limit], |row| {
            Ok((row.get::<_, AirportId>(0)?, row.get::<_, u8>(1)?))
        })
        .with_context(|| format!("execute keyword lookup for '{query}'"))?;

    let mut hits = Vec::new();
    for row in rows {
        let (airport_id, priority) = row.context("read keyword hit")?;
        let kind = MatchKind::from_priority(priority)
            .with_context(|| format!("keyword lookup returned unknown priority {priority}"))?;
        hits.push(KeywordHit { airport_id, kind });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::catalog::upsert_airport;
    use crate::db::open_catalog_in_memory;
    use crate::model::airport::Airport;

    fn seeded() -> Connection {
        let conn = open_catalog_in_memory().expect("catalog");
        let rows = [
            Airport::new(
                3797,
                "John F Kennedy International Airport",
                "New York",
                "United States",
                "America/New_York",
            )
            .with_codes(Some("JFK"), Some("KJFK")),
            Airport::new(
                3697,
                "La Guardia Airport",
                "New York",
                "United States",
                "America/New_York",
            )
            .with_codes(Some("LGA"), Some("KLGA")),
            Airport::new(
                193,
                "Lester B. Pearson International Airport",
                "Toronto",
                "Canada",
                "America/Toronto",
            )
            .with_codes(Some("YYZ"), Some("CYYZ")),
            Airport::new(9999, "Yorkton Municipal Airport", "Yorkton", "Canada", "America/Regina")
                .with_codes(None, Some("CYQV")),
        ];
        for airport in &rows {
            upsert_airport(&conn, airport).expect("seed airport");
        }
        conn
    }

    #[test]
    fn iata_match_is_case_insensitive() {
        let conn = seeded();
        let hits = keyword_lookup(&conn, "jfk", 10).expect("lookup");
        assert_eq!(
            hits,
            vec![KeywordHit {
                airport_id: 3797,
                kind: MatchKind::Iata
            }]
        );
    }

    #[test]
    fn icao_match_beats_substring() {
        let conn = seeded();
        let hits = keyword_lookup(&conn, "cyyz", 10).expect("lookup");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, MatchKind::Icao);
    }

    #[test]
    fn name_substring_outranks_city_substring() {
        let conn = seeded();
        // "york" is in the city of JFK/LGA and in Yorkton's name and city.
        let hits = keyword_lookup(&conn, "York", 10).expect("lookup");
        assert_eq!(
            hits,
            vec![
                KeywordHit {
                    airport_id: 9999,
                    kind: MatchKind::NameKeyword
                },
                KeywordHit {
                    airport_id: 3697,
                    kind: MatchKind::CityKeyword
                },
                KeywordHit {
                    airport_id: 3797,
                    kind: MatchKind::CityKeyword
                },
            ]
        );
    }

    #[test]
    fn one_hit_per_row_even_when_several_predicates_hold() {
        let conn = seeded();
        let hits = keyword_lookup(&conn, "Yorkton", 10).expect("lookup");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, MatchKind::NameKeyword);
    }

    #[test]
    fn limit_truncates_after_priority_ordering() {
        let conn = seeded();
        let hits = keyword_lookup(&conn, "york", 1).expect("lookup");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].airport_id, 9999);
    }

    #[test]
    fn empty_query_and_zero_limit_match_nothing() {
        let conn = seeded();
        assert!(keyword_lookup(&conn, "", 10).expect("lookup").is_empty());
        assert!(keyword_lookup(&conn, "JFK", 0).expect("lookup").is_empty());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let conn = seeded();
        assert!(keyword_lookup(&conn, "Pearsonville", 10).expect("lookup").is_empty());
    }
}
