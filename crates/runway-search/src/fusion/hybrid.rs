//! Hybrid search orchestration.
//!
//! normalize → generate candidates (concurrent, deadline-bound) → fuse →
//! rank/limit → hydrate. The whole call shares one deadline; any stage error
//! or a missed deadline fails the call with no partial result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use runway_core::config::SearchConfig;
use runway_core::timing;
use runway_core::{Airport, AirportId, MatchKind};
use serde::Serialize;
use tracing::debug;

use super::rank::{Limit, rank_and_limit, round_score};
use super::scoring::fuse;
use crate::candidates::CandidateGenerator;
use crate::error::SearchError;
use crate::normalize::normalize_query;
use crate::semantic::Embedder;
use crate::store::CorpusStore;

/// Upper bound on a configurable deadline.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(600);

/// Tunables for [`HybridSearcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Budget for one whole search call.
    pub timeout: Duration,
    /// Each strategy fetches `limit * overfetch_factor` rows.
    pub overfetch_factor: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            overfetch_factor: 2,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub const fn from_config(config: &SearchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            overfetch_factor: config.overfetch_factor,
        }
    }

    /// # Errors
    ///
    /// [`SearchError::InvalidInput`] for a zero or oversized timeout or a
    /// zero overfetch factor.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(SearchError::InvalidInput(format!(
                "timeout must be between 1 ms and {} s, got {} ms",
                MAX_TIMEOUT.as_secs(),
                self.timeout.as_millis()
            )));
        }
        if self.overfetch_factor == 0 {
            return Err(SearchError::InvalidInput(
                "overfetch_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportMatch {
    pub airport_id: AirportId,
    pub name: String,
    pub city: String,
    pub country: String,
    pub iata: Option<String>,
    pub icao: Option<String>,
    pub timezone: String,
    /// Fused best score, rounded to 4 decimal places.
    pub similarity_score: f64,
    pub matched_by: MatchKind,
}

impl AirportMatch {
    fn new(airport: Airport, score: f32, matched_by: MatchKind) -> Self {
        Self {
            airport_id: airport.airport_id,
            name: airport.name,
            city: airport.city,
            country: airport.country,
            iata: airport.iata,
            icao: airport.icao,
            timezone: airport.timezone,
            similarity_score: round_score(score),
            matched_by,
        }
    }
}

/// Per-stage wall time in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchTiming {
    pub embed_us: u64,
    pub keyword_us: u64,
    pub name_vector_us: u64,
    pub city_vector_us: u64,
    pub fusion_us: u64,
    pub hydrate_us: u64,
    pub total_us: u64,
}

/// Ranked results for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// The query as supplied, before normalization.
    pub query: String,
    pub result_count: usize,
    pub airports: Vec<AirportMatch>,
    pub timing: SearchTiming,
}

/// Answers free-text airport queries against a corpus store.
#[derive(Clone)]
pub struct HybridSearcher {
    generator: CandidateGenerator,
    options: SearchOptions,
}

impl HybridSearcher {
    /// Searcher with default options.
    pub fn new(store: Arc<dyn CorpusStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            generator: CandidateGenerator::new(store, embedder),
            options: SearchOptions::default(),
        }
    }

    /// # Errors
    ///
    /// Rejects invalid options; see [`SearchOptions::validate`].
    pub fn with_options(
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn Embedder>,
        options: SearchOptions,
    ) -> Result<Self, SearchError> {
        options.validate()?;
        Ok(Self {
            generator: CandidateGenerator::new(store, embedder),
            options,
        })
    }

    #[must_use]
    pub const fn options(&self) -> SearchOptions {
        self.options
    }

    /// Run one search.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Embedding`] when the query cannot be embedded
    /// - [`SearchError::Store`] when a store query fails or returns a
    ///   record that violates catalog invariants
    /// - [`SearchError::Timeout`] when the call outlives its budget
    pub fn search(&self, raw_query: &str, limit: Limit) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let budget = self.options.timeout;
        let deadline = started.checked_add(budget).ok_or_else(|| {
            SearchError::InvalidInput(format!("timeout {} ms overflows", budget.as_millis()))
        })?;

        let query = normalize_query(raw_query);
        let overfetch = limit.overfetch(self.options.overfetch_factor);
        debug!(raw = raw_query, normalized = %query, limit = limit.get(), overfetch, "search");

        let sets = self.generator.generate(&query, overfetch, deadline, budget)?;

        let fusion_started = Instant::now();
        let ranked = rank_and_limit(fuse(&sets), limit);
        let fusion = fusion_started.elapsed();

        let hydrate_started = Instant::now();
        let ids: Vec<AirportId> = ranked.iter().map(|r| r.airport_id).collect();
        let records = self
            .generator
            .store()
            .fetch(&ids)
            .map_err(|err| SearchError::store(&err))?;
        let hydrate = hydrate_started.elapsed();

        if Instant::now() > deadline {
            return Err(SearchError::Timeout { budget });
        }

        let mut records: HashMap<AirportId, Airport> =
            records.into_iter().map(|a| (a.airport_id, a)).collect();
        let airports: Vec<AirportMatch> = ranked
            .iter()
            .filter_map(|result| {
                let airport = records.remove(&result.airport_id);
                if airport.is_none() {
                    debug!(airport_id = result.airport_id, "ranked airport vanished before hydration");
                }
                airport.map(|a| AirportMatch::new(a, result.best_score, result.matched_by))
            })
            .collect();

        let stages = sets.timings;
        for (name, elapsed) in [
            ("search.embed", stages.embed),
            ("search.keyword", stages.keyword),
            ("search.name_vector", stages.name_vector),
            ("search.city_vector", stages.city_vector),
            ("search.fusion", fusion),
            ("search.hydrate", hydrate),
        ] {
            timing::record(name, elapsed);
        }

        let total = started.elapsed();
        timing::record("search.total", total);
        let timing = SearchTiming {
            embed_us: micros(stages.embed),
            keyword_us: micros(stages.keyword),
            name_vector_us: micros(stages.name_vector),
            city_vector_us: micros(stages.city_vector),
            fusion_us: micros(fusion),
            hydrate_us: micros(hydrate),
            total_us: micros(total),
        };

        debug!(results = airports.len(), total_us = timing.total_us, "search complete");
        Ok(SearchResponse {
            query: raw_query.to_string(),
            result_count: airports.len(),
            airports,
            timing,
        })
    }
}

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
