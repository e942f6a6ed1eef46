use std::collections::HashMap;

use anyhow::{Result, bail};
use runway_core::db::keyword::KeywordHit;
use runway_core::model::embedding::cosine_distance;
use runway_core::{Airport, AirportId, MatchKind};

use super::{CorpusStore, VectorField};
use crate::semantic::VectorHit;

/// [`CorpusStore`] over records held in memory.
///
/// Case folding uses full Unicode lower/upper-casing, so it matches a few
/// non-ASCII queries the SQLite store does not.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    airports: Vec<Airport>,
    by_id: HashMap<AirportId, usize>,
}

impl MemoryCatalog {
    /// Build from validated records, sorted by id.
    ///
    /// # Errors
    ///
    /// Fails on an invalid record or a duplicate id.
    pub fn new(airports: impl IntoIterator<Item = Airport>) -> Result<Self> {
        let mut airports: Vec<Airport> = airports.into_iter().collect();
        airports.sort_by_key(|a| a.airport_id);

        let mut by_id = HashMap::with_capacity(airports.len());
        for (idx, airport) in airports.iter().enumerate() {
            airport.validate()?;
            if by_id.insert(airport.airport_id, idx).is_some() {
                bail!("duplicate airport id {}", airport.airport_id);
            }
        }
        Ok(Self { airports, by_id })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.airports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    fn keyword_kind(airport: &Airport, code: &str, needle: &str) -> Option<MatchKind> {
        let code_eq = |value: Option<&String>| value.is_some_and(|v| v.to_uppercase() == code);
        if code_eq(airport.iata.as_ref()) {
            Some(MatchKind::Iata)
        } else if code_eq(airport.icao.as_ref()) {
            Some(MatchKind::Icao)
        } else if airport.name.to_lowercase().contains(needle) {
            Some(MatchKind::NameKeyword)
        } else if airport.city.to_lowercase().contains(needle) {
            Some(MatchKind::CityKeyword)
        } else {
            None
        }
    }
}

impl CorpusStore for MemoryCatalog {
    fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let code = query.to_uppercase();
        let needle = query.to_lowercase();

        let mut hits: Vec<KeywordHit> = self
            .airports
            .iter()
            .filter_map(|airport| {
                Self::keyword_kind(airport, &code, &needle).map(|kind| KeywordHit {
                    airport_id: airport.airport_id,
                    kind,
                })
            })
            .collect();
        hits.sort_by_key(|hit| (hit.kind.priority(), hit.airport_id));
        hits.truncate(limit);
        Ok(hits)
    }

    fn nearest(
        &self,
        field: VectorField,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>> {
        let mut hits: Vec<VectorHit> = self
            .airports
            .iter()
            .filter_map(|airport| {
                let stored = match field {
                    VectorField::Name => airport.name_embedding.as_deref(),
                    VectorField::City => airport.city_embedding.as_deref(),
                }?;
                cosine_distance(embedding, stored).map(|distance| VectorHit {
                    airport_id: airport.airport_id,
                    distance,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.airport_id.cmp(&b.airport_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn fetch(&self, ids: &[AirportId]) -> Result<Vec<Airport>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|&idx| self.airports[idx].clone()))
            .collect())
    }
}
