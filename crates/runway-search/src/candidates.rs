//! Candidate generation: the keyword, name-vector and city-vector strategies.
//!
//! ```text
//!   keyword worker ─────────────────────────────┐
//!                                               ├─▶ coordinator (deadline)
//!   vector worker: embed ─┬─ name KNN ──────────┤
//!                         └─ city KNN (scoped) ─┘
//! ```
//!
//! The keyword lookup overlaps with embedding; both KNN queries start once
//! the query vector exists. The coordinator waits on a channel until all
//! three strategy results arrive, any worker reports an error, or the
//! deadline passes. Workers that outlive a failed or timed-out call finish
//! in the background and their results are dropped.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use runway_core::db::keyword::KeywordHit;
use runway_core::model::embedding::is_zero_vector;
use runway_core::{AirportId, MatchKind};
use tracing::{debug, trace};

use crate::error::SearchError;
use crate::semantic::{Embedder, VectorHit, embed_checked};
use crate::store::{CorpusStore, VectorField};

/// One airport proposed by one strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateMatch {
    pub airport_id: AirportId,
    pub kind: MatchKind,
    /// `1.0` for keyword hits, cosine similarity for vector hits.
    pub score: f32,
}

impl From<KeywordHit> for CandidateMatch {
    fn from(hit: KeywordHit) -> Self {
        Self {
            airport_id: hit.airport_id,
            kind: hit.kind,
            score: 1.0,
        }
    }
}

impl CandidateMatch {
    fn from_vector(hit: VectorHit, field: VectorField) -> Self {
        Self {
            airport_id: hit.airport_id,
            kind: match field {
                VectorField::Name => MatchKind::NameVector,
                VectorField::City => MatchKind::CityVector,
            },
            score: hit.similarity(),
        }
    }
}

/// Wall time spent in each strategy stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub embed: Duration,
    pub keyword: Duration,
    pub name_vector: Duration,
    pub city_vector: Duration,
}

/// The three strategy outputs, each in the order its store query returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSets {
    pub keyword: Vec<CandidateMatch>,
    pub name_vector: Vec<CandidateMatch>,
    pub city_vector: Vec<CandidateMatch>,
    pub timings: StageTimings,
}

impl CandidateSets {
    /// Every candidate across the three strategies.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateMatch> {
        self.keyword
            .iter()
            .chain(&self.name_vector)
            .chain(&self.city_vector)
    }
}

enum Report {
    Keyword(Duration, Result<Vec<KeywordHit>, SearchError>),
    Embedded(Duration, Result<(), SearchError>),
    Vector(VectorField, Duration, Result<Vec<VectorHit>, SearchError>),
}

/// Runs the three strategies concurrently against a shared store/embedder.
#[derive(Clone)]
pub struct CandidateGenerator {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn Embedder>,
}

impl CandidateGenerator {
    pub fn new(store: Arc<dyn CorpusStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    #[must_use]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &dyn CorpusStore {
        self.store.as_ref()
    }

    /// Run all three strategies for an already-normalized query, each asking
    /// the store for at most `overfetch` rows.
    ///
    /// # Errors
    ///
    /// The first strategy error aborts the call; passing `deadline` yields
    /// [`SearchError::Timeout`] reporting `budget`.
    pub fn generate(
        &self,
        query: &str,
        overfetch: usize,
        deadline: Instant,
        budget: Duration,
    ) -> Result<CandidateSets, SearchError> {
        let (tx, rx) = mpsc::channel();
        self.spawn_keyword(query, overfetch, tx.clone())?;
        self.spawn_vectors(query, overfetch, tx)?;

        let mut sets = CandidateSets::default();
        let mut keyword_done = false;
        let mut embedded = false;
        let mut name_done = false;
        let mut city_done = false;

        while !(keyword_done && name_done && city_done) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let report = match rx.recv_timeout(remaining) {
                Ok(report) => report,
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        keyword_done,
                        embedded, name_done, city_done, "candidate generation timed out"
                    );
                    return Err(SearchError::Timeout { budget });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let stage = if embedded { "vector search" } else { "embedding" };
                    let stage = if keyword_done { stage } else { "keyword search" };
                    return Err(SearchError::Internal(format!(
                        "{stage} worker exited without reporting"
                    )));
                }
            };

            match report {
                Report::Keyword(elapsed, outcome) => {
                    sets.timings.keyword = elapsed;
                    sets.keyword = outcome?.into_iter().map(CandidateMatch::from).collect();
                    keyword_done = true;
                }
                Report::Embedded(elapsed, outcome) => {
                    sets.timings.embed = elapsed;
                    outcome?;
                    embedded = true;
                }
                Report::Vector(field, elapsed, outcome) => {
                    let matches = outcome?
                        .into_iter()
                        .map(|hit| CandidateMatch::from_vector(hit, field))
                        .collect();
                    match field {
                        VectorField::Name => {
                            sets.timings.name_vector = elapsed;
                            sets.name_vector = matches;
                            name_done = true;
                        }
                        VectorField::City => {
                            sets.timings.city_vector = elapsed;
                            sets.city_vector = matches;
                            city_done = true;
                        }
                    }
                }
            }
        }

        trace!(
            keyword = sets.keyword.len(),
            name_vector = sets.name_vector.len(),
            city_vector = sets.city_vector.len(),
            "candidates generated"
        );
        Ok(sets)
    }

    fn spawn_keyword(
        &self,
        query: &str,
        limit: usize,
        tx: Sender<Report>,
    ) -> Result<(), SearchError> {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        thread::Builder::new()
            .name("runway-keyword".into())
            .spawn(move || {
                let started = Instant::now();
                let outcome = store
                    .keyword_search(&query, limit)
                    .map_err(|err| SearchError::store(&err));
                let _ = tx.send(Report::Keyword(started.elapsed(), outcome));
            })
            .map(drop)
            .map_err(|err| SearchError::Internal(format!("spawn keyword worker: {err}")))
    }

    fn spawn_vectors(
        &self,
        query: &str,
        limit: usize,
        tx: Sender<Report>,
    ) -> Result<(), SearchError> {
        let store = Arc::clone(&self.store);
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();
        thread::Builder::new()
            .name("runway-vector".into())
            .spawn(move || {
                let started = Instant::now();
                let embedding = match embed_checked(embedder.as_ref(), &query) {
                    Ok(embedding) => {
                        let _ = tx.send(Report::Embedded(started.elapsed(), Ok(())));
                        embedding
                    }
                    Err(err) => {
                        let _ = tx.send(Report::Embedded(started.elapsed(), Err(err.into())));
                        return;
                    }
                };

                // Cosine is undefined against a zero query vector.
                if is_zero_vector(&embedding) {
                    for field in [VectorField::Name, VectorField::City] {
                        let _ = tx.send(Report::Vector(field, Duration::ZERO, Ok(Vec::new())));
                    }
                    return;
                }

                let store: &dyn CorpusStore = store.as_ref();
                let embedding: &[f32] = &embedding;
                thread::scope(|scope| {
                    let city_tx = tx.clone();
                    let spawned = thread::Builder::new()
                        .name("runway-city-vector".into())
                        .spawn_scoped(scope, move || {
                            run_vector(store, VectorField::City, embedding, limit, &city_tx);
                        });
                    if let Err(err) = spawned {
                        let _ = tx.send(Report::Vector(
                            VectorField::City,
                            Duration::ZERO,
                            Err(SearchError::Internal(format!("spawn city worker: {err}"))),
                        ));
                    }
                    run_vector(store, VectorField::Name, embedding, limit, &tx);
                });
            })
            .map(drop)
            .map_err(|err| SearchError::Internal(format!("spawn vector worker: {err}")))
    }
}

fn run_vector(
    store: &dyn CorpusStore,
    field: VectorField,
    embedding: &[f32],
    limit: usize,
    tx: &Sender<Report>,
) {
    let started = Instant::now();
    let outcome = store
        .nearest(field, embedding, limit)
        .map_err(|err| SearchError::store(&err));
    let _ = tx.send(Report::Vector(field, started.elapsed(), outcome));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{EmbedError, HashEmbedder};
    use crate::store::MemoryCatalog;
    use runway_core::Airport;

    fn generator(embedder: Arc<dyn Embedder>) -> CandidateGenerator {
        let hash = HashEmbedder::default();
        let corpus = MemoryCatalog::new([
            Airport::new(
                3797,
                "John F Kennedy International Airport",
                "New York",
                "United States",
                "America/New_York",
            )
            .with_codes(Some("JFK"), Some("KJFK"))
            .with_embeddings(
                hash.embed_text("John F Kennedy International"),
                hash.embed_text("New York"),
            ),
            Airport::new(
                3697,
                "La Guardia Airport",
                "New York",
                "United States",
                "America/New_York",
            )
            .with_codes(Some("LGA"), Some("KLGA"))
            .with_embeddings(hash.embed_text("La Guardia"), hash.embed_text("New York")),
        ])
        .expect("corpus");
        CandidateGenerator::new(Arc::new(corpus), embedder)
    }

    fn far_deadline() -> (Instant, Duration) {
        let budget = Duration::from_secs(30);
        (Instant::now() + budget, budget)
    }

    struct Failing;

    impl Embedder for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Inference("model crashed".into()))
        }
    }

    #[test]
    fn all_three_strategies_report() {
        let generator = generator(Arc::new(HashEmbedder::default()));
        let (deadline, budget) = far_deadline();
        let sets = generator
            .generate("JFK", 10, deadline, budget)
            .expect("generate");

        assert_eq!(sets.keyword.len(), 1);
        assert_eq!(sets.keyword[0].kind, MatchKind::Iata);
        assert!((sets.keyword[0].score - 1.0).abs() < f32::EPSILON);
        assert_eq!(sets.name_vector.len(), 2);
        assert!(sets.name_vector.iter().all(|c| c.kind == MatchKind::NameVector));
        assert!(sets.city_vector.iter().all(|c| c.kind == MatchKind::CityVector));
    }

    #[test]
    fn overfetch_bounds_each_strategy() {
        let generator = generator(Arc::new(HashEmbedder::default()));
        let (deadline, budget) = far_deadline();
        let sets = generator
            .generate("York", 1, deadline, budget)
            .expect("generate");
        assert!(sets.keyword.len() <= 1);
        assert!(sets.name_vector.len() <= 1);
        assert!(sets.city_vector.len() <= 1);
    }

    #[test]
    fn empty_query_with_hash_embedder_yields_nothing() {
        let generator = generator(Arc::new(HashEmbedder::default()));
        let (deadline, budget) = far_deadline();
        let sets = generator.generate("", 10, deadline, budget).expect("generate");
        assert_eq!(sets.iter().count(), 0);
    }

    #[test]
    fn embedding_failure_aborts() {
        let generator = generator(Arc::new(Failing));
        let (deadline, budget) = far_deadline();
        let err = generator
            .generate("JFK", 10, deadline, budget)
            .expect_err("embedder fails");
        assert!(matches!(err, SearchError::Embedding(ref msg) if msg.contains("model crashed")));
    }
}
