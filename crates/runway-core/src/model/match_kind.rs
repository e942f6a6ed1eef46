use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// How a candidate airport was matched.
///
/// Variants are declared in priority order: when one airport is matched by
/// several strategies, the variant with the lowest [`MatchKind::priority`]
/// labels the fused result, regardless of which strategy scored highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Iata,
    Icao,
    NameKeyword,
    CityKeyword,
    NameVector,
    CityVector,
}

/// Score family a match kind contributes to during fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchFamily {
    Keyword,
    NameVector,
    CityVector,
}

impl MatchKind {
    /// Every kind, best priority first.
    pub const ALL: [Self; 6] = [
        Self::Iata,
        Self::Icao,
        Self::NameKeyword,
        Self::CityKeyword,
        Self::NameVector,
        Self::CityVector,
    ];

    /// Fixed tie-break priority, 1 (best) through 6.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Iata => 1,
            Self::Icao => 2,
            Self::NameKeyword => 3,
            Self::CityKeyword => 4,
            Self::NameVector => 5,
            Self::CityVector => 6,
        }
    }

    /// Inverse of [`MatchKind::priority`].
    #[must_use]
    pub const fn from_priority(priority: u8) -> Option<Self> {
        match priority {
            1 => Some(Self::Iata),
            2 => Some(Self::Icao),
            3 => Some(Self::NameKeyword),
            4 => Some(Self::CityKeyword),
            5 => Some(Self::NameVector),
            6 => Some(Self::CityVector),
            _ => None,
        }
    }

    #[must_use]
    pub const fn family(self) -> MatchFamily {
        match self {
            Self::Iata | Self::Icao | Self::NameKeyword | Self::CityKeyword => MatchFamily::Keyword,
            Self::NameVector => MatchFamily::NameVector,
            Self::CityVector => MatchFamily::CityVector,
        }
    }

    #[must_use]
    pub const fn is_keyword(self) -> bool {
        matches!(self.family(), MatchFamily::Keyword)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iata => "iata",
            Self::Icao => "icao",
            Self::NameKeyword => "name_keyword",
            Self::CityKeyword => "city_keyword",
            Self::NameVector => "name_vector",
            Self::CityVector => "city_vector",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid match kind '{got}'")]
pub struct ParseMatchKindError {
    pub got: String,
}

impl FromStr for MatchKind {
    type Err = ParseMatchKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseMatchKindError { got: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_matches_declaration_order() {
        for pair in MatchKind::ALL.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn priority_roundtrips() {
        for kind in MatchKind::ALL {
            assert_eq!(MatchKind::from_priority(kind.priority()), Some(kind));
        }
        assert_eq!(MatchKind::from_priority(0), None);
        assert_eq!(MatchKind::from_priority(7), None);
    }

    #[test]
    fn families() {
        assert_eq!(MatchKind::Icao.family(), MatchFamily::Keyword);
        assert_eq!(MatchKind::CityKeyword.family(), MatchFamily::Keyword);
        assert_eq!(MatchKind::NameVector.family(), MatchFamily::NameVector);
        assert_eq!(MatchKind::CityVector.family(), MatchFamily::CityVector);
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&MatchKind::NameKeyword).expect("serialize");
        assert_eq!(json, "\"name_keyword\"");
        let back: MatchKind = serde_json::from_str("\"city_vector\"").expect("deserialize");
        assert_eq!(back, MatchKind::CityVector);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("IATA".parse::<MatchKind>(), Ok(MatchKind::Iata));
        assert!("nearby".parse::<MatchKind>().is_err());
    }
}
