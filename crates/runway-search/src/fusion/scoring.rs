//! Per-airport score fusion.
//!
//! Candidates are grouped by airport. Each strategy family (keyword,
//! name-vector, city-vector) contributes the best score it produced for that
//! airport, or `0` when it did not propose it:
//!
//! ```text
//! best_score = max(keyword, name_vector, city_vector)
//! ```
//!
//! The reported match kind is the one with the lowest priority number among
//! every candidate seen for the airport, regardless of which family produced
//! `best_score`:
//!
//! | Priority | Kind           | Family      |
//! |----------|----------------|-------------|
//! | 1        | `iata`         | keyword     |
//! | 2        | `icao`         | keyword     |
//! | 3        | `name_keyword` | keyword     |
//! | 4        | `city_keyword` | keyword     |
//! | 5        | `name_vector`  | name-vector |
//! | 6        | `city_vector`  | city-vector |
//!
//! # Example
//!
//! ```
//! use runway_core::MatchKind;
//! use runway_search::candidates::{CandidateMatch, CandidateSets};
//! use runway_search::fusion::fuse;
//!
//! let sets = CandidateSets {
//!     keyword: vec![CandidateMatch { airport_id: 7, kind: MatchKind::CityKeyword, score: 1.0 }],
//!     name_vector: vec![CandidateMatch { airport_id: 7, kind: MatchKind::NameVector, score: 0.4 }],
//!     ..CandidateSets::default()
//! };
//! let fused = fuse(&sets);
//! assert_eq!(fused[0].matched_by, MatchKind::CityKeyword);
//! assert!((fused[0].best_score - 1.0).abs() < f32::EPSILON);
//! ```

use std::collections::BTreeMap;

use runway_core::{AirportId, MatchFamily, MatchKind};

use crate::candidates::{CandidateMatch, CandidateSets};

/// One airport after fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedResult {
    pub airport_id: AirportId,
    pub keyword_score: f32,
    pub name_vector_score: f32,
    pub city_vector_score: f32,
    pub best_score: f32,
    pub matched_by: MatchKind,
}

#[derive(Default)]
struct Accumulator {
    keyword: Option<f32>,
    name_vector: Option<f32>,
    city_vector: Option<f32>,
    kind: Option<MatchKind>,
}

impl Accumulator {
    fn add(&mut self, candidate: &CandidateMatch) {
        let slot = match candidate.kind.family() {
            MatchFamily::Keyword => &mut self.keyword,
            MatchFamily::NameVector => &mut self.name_vector,
            MatchFamily::CityVector => &mut self.city_vector,
        };
        *slot = Some(slot.map_or(candidate.score, |seen| seen.max(candidate.score)));

        self.kind = Some(match self.kind {
            Some(seen) if seen.priority() <= candidate.kind.priority() => seen,
            _ => candidate.kind,
        });
    }
}

/// Fuse all candidates into one entry per airport, ordered by airport id.
#[must_use]
pub fn fuse(sets: &CandidateSets) -> Vec<FusedResult> {
    let mut by_airport: BTreeMap<AirportId, Accumulator> = BTreeMap::new();
    for candidate in sets.iter() {
        by_airport
            .entry(candidate.airport_id)
            .or_default()
            .add(candidate);
    }

    by_airport
        .into_iter()
        .filter_map(|(airport_id, acc)| {
            let matched_by = acc.kind?;
            let keyword_score = acc.keyword.unwrap_or(0.0);
            let name_vector_score = acc.name_vector.unwrap_or(0.0);
            let city_vector_score = acc.city_vector.unwrap_or(0.0);
            Some(FusedResult {
                airport_id,
                keyword_score,
                name_vector_score,
                city_vector_score,
                best_score: keyword_score.max(name_vector_score).max(city_vector_score),
                matched_by,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cand(airport_id: AirportId, kind: MatchKind, score: f32) -> CandidateMatch {
        CandidateMatch {
            airport_id,
            kind,
            score,
        }
    }

    #[test]
    fn keyword_and_vector_hits_merge_into_one_entry() {
        let sets = CandidateSets {
            keyword: vec![cand(3797, MatchKind::Iata, 1.0)],
            name_vector: vec![cand(3797, MatchKind::NameVector, 0.62)],
            city_vector: vec![cand(3797, MatchKind::CityVector, 0.55)],
            ..CandidateSets::default()
        };
        let fused = fuse(&sets);
        assert_eq!(fused.len(), 1);
        let jfk = fused[0];
        assert_eq!(jfk.matched_by, MatchKind::Iata);
        assert!((jfk.best_score - 1.0).abs() < f32::EPSILON);
        assert!((jfk.name_vector_score - 0.62).abs() < f32::EPSILON);
    }

    #[test]
    fn label_follows_priority_not_score() {
        let sets = CandidateSets {
            name_vector: vec![cand(1, MatchKind::NameVector, 0.3)],
            city_vector: vec![cand(1, MatchKind::CityVector, 0.9)],
            ..CandidateSets::default()
        };
        let fused = fuse(&sets);
        assert_eq!(fused[0].matched_by, MatchKind::NameVector);
        assert!((fused[0].best_score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn absent_families_contribute_zero() {
        let sets = CandidateSets {
            city_vector: vec![cand(5, MatchKind::CityVector, -0.2)],
            ..CandidateSets::default()
        };
        let fused = fuse(&sets);
        assert_eq!(fused[0].keyword_score, 0.0);
        assert_eq!(fused[0].name_vector_score, 0.0);
        assert_eq!(fused[0].best_score, 0.0);
        assert_eq!(fused[0].matched_by, MatchKind::CityVector);
    }

    #[test]
    fn repeated_family_hits_keep_the_max() {
        let sets = CandidateSets {
            name_vector: vec![
                cand(9, MatchKind::NameVector, 0.4),
                cand(9, MatchKind::NameVector, 0.7),
            ],
            ..CandidateSets::default()
        };
        assert!((fuse(&sets)[0].name_vector_score - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_sets_fuse_to_nothing() {
        assert!(fuse(&CandidateSets::default()).is_empty());
    }

    fn kind_strategy() -> impl Strategy<Value = MatchKind> {
        proptest::sample::select(MatchKind::ALL.to_vec())
    }

    fn candidate_strategy() -> impl Strategy<Value = CandidateMatch> {
        (0_i64..20, kind_strategy(), -1.0_f32..=1.0).prop_map(|(id, kind, score)| {
            let score = if kind.is_keyword() { 1.0 } else { score };
            cand(id, kind, score)
        })
    }

    fn split(candidates: Vec<CandidateMatch>) -> CandidateSets {
        let mut sets = CandidateSets::default();
        for candidate in candidates {
            match candidate.kind.family() {
                MatchFamily::Keyword => sets.keyword.push(candidate),
                MatchFamily::NameVector => sets.name_vector.push(candidate),
                MatchFamily::CityVector => sets.city_vector.push(candidate),
            }
        }
        sets
    }

    proptest! {
        #[test]
        fn one_entry_per_airport_with_min_priority_kind(
            candidates in proptest::collection::vec(candidate_strategy(), 0..60)
        ) {
            let fused = fuse(&split(candidates.clone()));

            let mut ids: Vec<_> = candidates.iter().map(|c| c.airport_id).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(fused.iter().map(|f| f.airport_id).collect::<Vec<_>>(), ids);

            for entry in &fused {
                let best_kind = candidates
                    .iter()
                    .filter(|c| c.airport_id == entry.airport_id)
                    .map(|c| c.kind)
                    .min_by_key(|k| k.priority())
                    .expect("candidate exists");
                prop_assert_eq!(entry.matched_by, best_kind);
                prop_assert!(entry.best_score >= entry.keyword_score);
                prop_assert!(entry.best_score >= entry.name_vector_score);
                prop_assert!(entry.best_score >= entry.city_vector_score);
                prop_assert!(entry.best_score >= 0.0);
            }
        }

        #[test]
        fn fusion_ignores_candidate_order(
            mut candidates in proptest::collection::vec(candidate_strategy(), 0..40)
        ) {
            let forward = fuse(&split(candidates.clone()));
            candidates.reverse();
            prop_assert_eq!(fuse(&split(candidates)), forward);
        }
    }
}
