//! Result ranking and the result-count limit.

use std::fmt;

use tracing::warn;

use super::scoring::FusedResult;

/// Number of results a search returns.
///
/// Always positive. Zero, negative and unparseable requests fall back to the
/// default instead of failing the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limit(usize);

impl Limit {
    pub const DEFAULT: Self = Self(5);

    /// `n`, or [`Limit::DEFAULT`] when `n` is zero.
    #[must_use]
    pub const fn new(n: usize) -> Self {
        if n == 0 { Self::DEFAULT } else { Self(n) }
    }

    /// Interpret a signed request; non-positive values fall back to `fallback`.
    #[must_use]
    pub fn from_signed(raw: i64, fallback: Self) -> Self {
        match usize::try_from(raw) {
            Ok(n) if n > 0 => Self(n),
            _ => {
                warn!(requested = raw, fallback = fallback.0, "non-positive limit, using default");
                fallback
            }
        }
    }

    /// Interpret a textual request such as a CLI flag or query parameter.
    /// Anything that is not an integer falls back to `fallback`.
    #[must_use]
    pub fn parse_or(raw: &str, fallback: Self) -> Self {
        raw.trim().parse::<i64>().map_or_else(
            |_| {
                warn!(requested = raw, fallback = fallback.0, "non-integer limit, using default");
                fallback
            },
            |n| Self::from_signed(n, fallback),
        )
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Rows each strategy should fetch: `limit * factor`, at least `limit`.
    #[must_use]
    pub const fn overfetch(self, factor: usize) -> usize {
        let factor = if factor == 0 { 1 } else { factor };
        self.0.saturating_mul(factor)
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sort by `best_score` descending, then match-kind priority, then airport id
/// ascending, and keep the first `limit`.
///
/// Keyword hits all score 1.0; priority orders exact codes ahead of substring
/// matches.
#[must_use]
pub fn rank_and_limit(mut fused: Vec<FusedResult>, limit: Limit) -> Vec<FusedResult> {
    fused.sort_by(|a, b| {
        b.best_score
            .total_cmp(&a.best_score)
            .then_with(|| a.matched_by.priority().cmp(&b.matched_by.priority()))
            .then_with(|| a.airport_id.cmp(&b.airport_id))
    });
    fused.truncate(limit.get());
    fused
}

/// Round a score to 4 decimal places for output.
#[must_use]
pub fn round_score(score: f32) -> f64 {
    (f64::from(score) * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use runway_core::{AirportId, MatchKind};

    fn fused(airport_id: AirportId, best_score: f32) -> FusedResult {
        FusedResult {
            airport_id,
            keyword_score: 0.0,
            name_vector_score: best_score,
            city_vector_score: 0.0,
            best_score,
            matched_by: MatchKind::NameVector,
        }
    }

    fn keyword(airport_id: AirportId, matched_by: MatchKind) -> FusedResult {
        FusedResult {
            airport_id,
            keyword_score: 1.0,
            name_vector_score: 0.0,
            city_vector_score: 0.0,
            best_score: 1.0,
            matched_by,
        }
    }

    #[test]
    fn limit_falls_back_to_default() {
        assert_eq!(Limit::new(0), Limit::DEFAULT);
        assert_eq!(Limit::from_signed(-3, Limit::DEFAULT).get(), 5);
        assert_eq!(Limit::from_signed(0, Limit::DEFAULT).get(), 5);
        assert_eq!(Limit::parse_or("abc", Limit::DEFAULT).get(), 5);
        assert_eq!(Limit::parse_or("2.5", Limit::DEFAULT).get(), 5);
        assert_eq!(Limit::parse_or(" 7 ", Limit::DEFAULT).get(), 7);
        assert_eq!(Limit::parse_or("-1", Limit::new(9)).get(), 9);
    }

    #[test]
    fn overfetch_doubles_by_default_factor() {
        assert_eq!(Limit::new(5).overfetch(2), 10);
        assert_eq!(Limit::new(5).overfetch(0), 5);
        assert_eq!(Limit::new(usize::MAX).overfetch(2), usize::MAX);
    }

    #[test]
    fn ties_break_on_ascending_id() {
        let ranked = rank_and_limit(
            vec![fused(30, 0.5), fused(10, 0.5), fused(20, 0.9)],
            Limit::new(5),
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.airport_id).collect();
        assert_eq!(ids, vec![20, 10, 30]);
    }

    #[test]
    fn equal_scores_rank_by_match_kind_before_id() {
        let ranked = rank_and_limit(
            vec![
                keyword(1, MatchKind::NameKeyword),
                keyword(3484, MatchKind::Iata),
                keyword(2, MatchKind::CityKeyword),
                keyword(900, MatchKind::Icao),
            ],
            Limit::new(3),
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.airport_id).collect();
        assert_eq!(ids, vec![3484, 900, 1]);
    }

    #[test]
    fn higher_score_still_beats_better_kind() {
        let ranked = rank_and_limit(
            vec![fused(1, 0.4), {
                let mut city = fused(2, 0.9);
                city.matched_by = MatchKind::CityVector;
                city
            }],
            Limit::new(2),
        );
        assert_eq!(ranked[0].airport_id, 2);
    }

    #[test]
    fn truncates_to_limit() {
        let ranked = rank_and_limit(
            (0..10).map(|i| fused(i, 0.1)).collect(),
            Limit::new(3),
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[2].airport_id, 2);
    }

    #[test]
    fn rounding_keeps_four_places() {
        assert!((round_score(0.812_345) - 0.8123).abs() < 1e-12);
        assert!((round_score(1.0) - 1.0).abs() < f64::EPSILON);
        assert!((round_score(0.666_66) - 0.6667).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn ranking_is_sorted_bounded_and_input_order_independent(
            scores in proptest::collection::vec((0_i64..50, 0.0_f32..1.0, 0_usize..6), 0..40),
            limit in 1_usize..12,
        ) {
            let mut seen = std::collections::HashSet::new();
            let input: Vec<FusedResult> = scores
                .into_iter()
                .filter(|(id, _, _)| seen.insert(*id))
                .map(|(id, score, kind)| {
                    let mut result = fused(id, score);
                    result.matched_by = MatchKind::ALL[kind];
                    result
                })
                .collect();

            let ranked = rank_and_limit(input.clone(), Limit::new(limit));
            prop_assert!(ranked.len() <= limit);
            prop_assert_eq!(ranked.len(), input.len().min(limit));
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let (pa, pb) = (a.matched_by.priority(), b.matched_by.priority());
                prop_assert!(
                    a.best_score > b.best_score
                        || (a.best_score == b.best_score
                            && (pa < pb || (pa == pb && a.airport_id < b.airport_id)))
                );
            }

            let mut reversed = input;
            reversed.reverse();
            prop_assert_eq!(rank_and_limit(reversed, Limit::new(limit)), ranked);
        }
    }
}
